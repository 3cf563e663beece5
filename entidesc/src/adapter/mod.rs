//! Database adapter seam.
//!
//! The diff engine only needs three things from a database: the columns of a
//! table, its index rows, and a way to run a batch of statements. Both
//! [`MySqlAdapter`] and [`MemoryAdapter`] provide them.

mod memory;
mod mysql;

use std::future::Future;

use serde::{Deserialize, Serialize};

pub use memory::MemoryAdapter;
pub use mysql::MySqlAdapter;

use crate::errors::AdapterError;
use crate::types::IndexKind;

/// Identifier quoting of the target database.
pub trait EscapeIdentifier {
    /// Quote a table, column or index name. The default is MySQL quoting:
    /// backticks, with embedded backticks doubled.
    fn escape_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }
}

/// MySQL quoting without a connection, for rendering SQL offline.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlQuoting;

impl EscapeIdentifier for MySqlQuoting {}

/// One row of `SHOW COLUMNS FROM <table>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveColumn {
    pub field: String,
    pub column_type: String,
    /// `YES` or `NO`.
    pub null: String,
    /// `PRI`, `UNI`, `MUL` or empty.
    pub key: String,
    pub extra: String,
}

/// One row of `SHOW INDEX FROM <table>`: one column of one index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveIndexRow {
    pub key_name: String,
    pub non_unique: i64,
    pub column_name: String,
    /// Storage method, e.g. `BTREE` or `FULLTEXT`.
    pub index_type: String,
}

impl LiveIndexRow {
    pub fn kind(&self) -> IndexKind {
        if self.non_unique == 0 {
            IndexKind::Unique
        } else if self.index_type.eq_ignore_ascii_case("FULLTEXT") {
            IndexKind::Fulltext
        } else {
            IndexKind::Index
        }
    }
}

/// Live database access used by the diff engine.
///
/// Probing a table that does not exist must fail with
/// [`AdapterError::ObjectNotFound`]; every other failure is reported as another
/// variant. Calls are issued one at a time.
pub trait SqlAdapter: EscapeIdentifier + Send + Sync {
    fn show_columns(&self, table: &str) -> impl Future<Output = Result<Vec<LiveColumn>, AdapterError>> + Send;

    fn show_indexes(&self, table: &str) -> impl Future<Output = Result<Vec<LiveIndexRow>, AdapterError>> + Send;

    /// Run one or more `;`-terminated statements.
    fn execute(&self, sql: &str) -> impl Future<Output = Result<(), AdapterError>> + Send;
}
