//! Entity descriptors and incremental MySQL migrations.
//!
//! Entities are declared in TOML files, loaded into [`EntityDescriptor`]s and
//! compared with the live database to produce the `CREATE TABLE` or
//! `ALTER TABLE` statement that brings each table up to date.
//!
//! ```no_run
//! use entidesc::{DdlOptions, DescriptorLoader, MySqlAdapter, incremental_changes};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let loader = DescriptorLoader::new("entities");
//! let adapter = MySqlAdapter::connect("mysql://root@localhost/app").await?;
//! let user = loader.load("user")?;
//! if let Some(sql) = incremental_changes(&user, &adapter, &DdlOptions::default()).await? {
//!     println!("{sql}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod cache;
pub mod ddl;
pub mod declaration;
pub mod diff;
pub mod errors;
pub mod loader;
pub mod mapper;
pub mod schema;
pub mod types;

pub use adapter::{EscapeIdentifier, LiveColumn, LiveIndexRow, MemoryAdapter, MySqlAdapter, MySqlQuoting, SqlAdapter};
pub use cache::{CacheKey, DescriptorCache, Freshness, FsDescriptorCache, MemoryDescriptorCache};
pub use ddl::{DdlOptions, DdlRenderer};
pub use declaration::{EntityDeclaration, FieldDeclaration};
pub use diff::{AlterTable, Change, CreateTable, TablePlan, create_table_sql, incremental_changes, plan_table};
pub use errors::{AdapterError, CacheError, ConfigError, SchemaError, SchemaResult};
pub use loader::{DescriptorLoader, EntityBinding};
pub use mapper::column_spec;
pub use schema::{ColumnAttribute, ColumnSpec, IndexSpec};
pub use types::{
    DefaultValue, EntityDescriptor, FieldArgs, FieldDescriptor, FieldType, IndexDescriptor, IndexKind, TypeFamily,
};
