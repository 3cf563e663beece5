//! Incremental schema diff between an entity descriptor and a live table.
//!
//! [`plan_table`] inspects the table through a [`SqlAdapter`] and returns a
//! typed [`TablePlan`]; [`incremental_changes`] renders that plan to the SQL
//! an operator would run.

use std::fmt;

use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::adapter::{EscapeIdentifier, SqlAdapter};
use crate::ddl::{DdlOptions, DdlRenderer};
use crate::errors::{SchemaError, SchemaResult};
use crate::mapper::column_spec;
use crate::schema::{ColumnSpec, IndexSpec};
use crate::types::EntityDescriptor;

/// One structural change inside an `ALTER TABLE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "target", rename_all = "snake_case")]
pub enum Change {
    /// Redefine the live column `name`. `current` is what the database holds.
    ChangeColumn {
        name: String,
        column: ColumnSpec,
        current: ColumnSpec,
    },
    AddColumn(ColumnSpec),
    DropColumn(String),
    AddIndex(IndexSpec),
    DropIndex(String),
}

impl Change {
    pub fn is_column_change(&self) -> bool {
        matches!(
            self,
            Change::ChangeColumn { .. } | Change::AddColumn(_) | Change::DropColumn(_)
        )
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::ChangeColumn { name, column, current } => {
                let differences: Vec<String> = column
                    .differences(current)
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                write!(
                    f,
                    "~ column {name}: {} -> {} ({})",
                    current.column_type,
                    column.column_type,
                    differences.join(", ")
                )
            }
            Change::AddColumn(column) => write!(f, "+ column {} {}", column.name, column.column_type),
            Change::DropColumn(name) => write!(f, "- column {name}"),
            Change::AddIndex(index) => write!(f, "+ {} ({})", index.kind, index.fields.join(", ")),
            Change::DropIndex(name) => write!(f, "- index {name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTable {
    pub table: String,
    pub columns: Vec<ColumnSpec>,
    pub indexes: Vec<IndexSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlterTable {
    pub table: String,
    pub changes: Vec<Change>,
}

/// What it takes to bring one table in line with its entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TablePlan {
    Create(CreateTable),
    Alter(AlterTable),
    Unchanged { table: String },
}

impl TablePlan {
    pub fn table(&self) -> &str {
        match self {
            TablePlan::Create(create) => &create.table,
            TablePlan::Alter(alter) => &alter.table,
            TablePlan::Unchanged { table } => table,
        }
    }

    pub fn is_unchanged(&self) -> bool {
        matches!(self, TablePlan::Unchanged { .. })
    }
}

/// Columns of every declared field, in declaration order.
pub fn declared_columns(descriptor: &EntityDescriptor) -> SchemaResult<Vec<ColumnSpec>> {
    descriptor
        .fields
        .values()
        .map(|field| column_spec(field, &descriptor.id_field).map_err(SchemaError::from))
        .collect()
}

/// Full table definition of an entity, without looking at the database.
pub fn create_plan(descriptor: &EntityDescriptor) -> SchemaResult<CreateTable> {
    let columns = declared_columns(descriptor)?;
    if columns.is_empty() {
        return Err(SchemaError::NoColumns {
            table: descriptor.table().to_string(),
        });
    }
    Ok(CreateTable {
        table: descriptor.table().to_string(),
        columns,
        indexes: descriptor.indexes.iter().map(IndexSpec::from).collect(),
    })
}

/// Compare an entity with its live table.
///
/// A missing table yields a [`TablePlan::Create`]. Otherwise live columns are
/// walked in their order: a matching field that differs is changed, a column
/// without field is dropped. Fields left over are added in declaration order,
/// then live indexes without a declared counterpart are dropped and declared
/// indexes left over are added. Abstract entities never have a table.
pub async fn plan_table<A: SqlAdapter>(descriptor: &EntityDescriptor, adapter: &A) -> SchemaResult<TablePlan> {
    let table = descriptor.table();
    if descriptor.is_abstract {
        debug!("{} is abstract, no table to plan", descriptor.name);
        return Ok(TablePlan::Unchanged { table: table.to_string() });
    }

    let live_columns = match adapter.show_columns(table).await {
        Ok(columns) => columns,
        Err(e) if e.is_not_found() => {
            info!("Table {table} does not exist, planning creation");
            return Ok(TablePlan::Create(create_plan(descriptor)?));
        }
        Err(e) => return Err(e.into()),
    };
    debug!("Table {table} has {} live columns", live_columns.len());

    let mut pending: IndexMap<String, ColumnSpec> = declared_columns(descriptor)?
        .into_iter()
        .map(|column| (column.name.clone(), column))
        .collect();
    let mut changes = Vec::new();

    for live in &live_columns {
        let current = ColumnSpec::from(live);
        match pending.shift_remove(&current.name) {
            Some(column) => {
                if !column.matches(&current) {
                    changes.push(Change::ChangeColumn {
                        name: current.name.clone(),
                        column,
                        current,
                    });
                }
            }
            None => changes.push(Change::DropColumn(current.name)),
        }
    }
    changes.extend(pending.into_values().map(Change::AddColumn));

    match adapter.show_indexes(table).await {
        Ok(rows) => {
            let mut declared: Vec<IndexSpec> = descriptor.indexes.iter().map(IndexSpec::from).collect();
            for live in IndexSpec::from_live_rows(&rows) {
                match declared.iter().position(|index| index.matches(&live)) {
                    Some(position) => {
                        declared.remove(position);
                    }
                    None => {
                        if let Some(name) = live.name {
                            changes.push(Change::DropIndex(name));
                        }
                    }
                }
            }
            changes.extend(declared.into_iter().map(Change::AddIndex));
        }
        Err(e) => {
            // Any listing failure is taken as "no index support"; only the
            // column changes are kept.
            warn!("Skipping index reconciliation of {table}: {e}");
        }
    }

    for change in &changes {
        debug!("{table}: {change}");
    }
    if changes.is_empty() {
        return Ok(TablePlan::Unchanged { table: table.to_string() });
    }
    Ok(TablePlan::Alter(AlterTable {
        table: table.to_string(),
        changes,
    }))
}

/// SQL needed to bring the live table in line with `descriptor`, or `None`
/// when nothing differs.
pub async fn incremental_changes<A: SqlAdapter>(
    descriptor: &EntityDescriptor,
    adapter: &A,
    options: &DdlOptions,
) -> SchemaResult<Option<String>> {
    let plan = plan_table(descriptor, adapter).await?;
    Ok(DdlRenderer::new(adapter, options).render(&plan))
}

/// `CREATE TABLE` statement of an entity.
pub fn create_table_sql<E: EscapeIdentifier + ?Sized>(
    descriptor: &EntityDescriptor,
    escaper: &E,
    options: &DdlOptions,
) -> SchemaResult<String> {
    let create = create_plan(descriptor)?;
    Ok(DdlRenderer::new(escaper, options).create_table(&create))
}
