use std::sync::{Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;

use super::{EscapeIdentifier, LiveColumn, LiveIndexRow, SqlAdapter};
use crate::diff::{AlterTable, Change, CreateTable, TablePlan};
use crate::errors::AdapterError;
use crate::schema::{ColumnSpec, IndexSpec};
use crate::types::IndexKind;

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    columns: Vec<LiveColumn>,
    indexes: Vec<LiveIndexRow>,
}

#[derive(Debug, Default)]
struct Catalog {
    tables: IndexMap<String, MemoryTable>,
    executed: Vec<String>,
    fail_show_index: bool,
    fail_show_columns: bool,
}

/// In-memory catalog answering `SHOW COLUMNS` / `SHOW INDEX` like MySQL does.
///
/// SQL passed to [`SqlAdapter::execute`] is recorded but not interpreted;
/// structural changes go through [`MemoryAdapter::apply`] with a typed plan.
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    catalog: Mutex<Catalog>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn catalog(&self) -> MutexGuard<'_, Catalog> {
        self.catalog.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a table as the database would report it.
    pub fn insert_table(&self, table: &str, columns: Vec<LiveColumn>, indexes: Vec<LiveIndexRow>) {
        self.catalog()
            .tables
            .insert(table.to_string(), MemoryTable { columns, indexes });
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.catalog().tables.contains_key(table)
    }

    /// Make every index listing fail, as a server without index support would.
    pub fn fail_show_index(&self, fail: bool) {
        self.catalog().fail_show_index = fail;
    }

    /// Make every column listing fail with an error other than "not found".
    pub fn fail_show_columns(&self, fail: bool) {
        self.catalog().fail_show_columns = fail;
    }

    /// Statements received through [`SqlAdapter::execute`], oldest first.
    pub fn executed(&self) -> Vec<String> {
        self.catalog().executed.clone()
    }

    /// Apply a table plan to the catalog the way MySQL would apply the
    /// rendered statement.
    pub fn apply(&self, plan: &TablePlan) -> Result<(), AdapterError> {
        let mut catalog = self.catalog();
        match plan {
            TablePlan::Create(create) => {
                if !catalog.tables.contains_key(&create.table) {
                    catalog.tables.insert(create.table.clone(), create_table(create));
                }
                Ok(())
            }
            TablePlan::Alter(alter) => {
                let table = catalog
                    .tables
                    .get_mut(&alter.table)
                    .ok_or_else(|| AdapterError::ObjectNotFound {
                        object: alter.table.clone(),
                    })?;
                alter_table(table, alter)
            }
            TablePlan::Unchanged { .. } => Ok(()),
        }
    }
}

impl EscapeIdentifier for MemoryAdapter {}

impl SqlAdapter for MemoryAdapter {
    async fn show_columns(&self, table: &str) -> Result<Vec<LiveColumn>, AdapterError> {
        let catalog = self.catalog();
        if catalog.fail_show_columns {
            return Err(AdapterError::sql("lost connection to MySQL server during query"));
        }
        catalog
            .tables
            .get(table)
            .map(|t| t.columns.clone())
            .ok_or_else(|| AdapterError::ObjectNotFound {
                object: table.to_string(),
            })
    }

    async fn show_indexes(&self, table: &str) -> Result<Vec<LiveIndexRow>, AdapterError> {
        let catalog = self.catalog();
        if catalog.fail_show_index {
            return Err(AdapterError::sql("index information is not available"));
        }
        catalog
            .tables
            .get(table)
            .map(|t| t.indexes.clone())
            .ok_or_else(|| AdapterError::ObjectNotFound {
                object: table.to_string(),
            })
    }

    async fn execute(&self, sql: &str) -> Result<(), AdapterError> {
        self.catalog().executed.push(sql.to_string());
        Ok(())
    }
}

fn live_column(spec: &ColumnSpec, keep_primary: bool) -> LiveColumn {
    LiveColumn {
        field: spec.name.clone(),
        column_type: spec.column_type.to_lowercase(),
        null: if spec.nullable { "YES" } else { "NO" }.to_string(),
        key: if spec.primary_key || keep_primary { "PRI" } else { "" }.to_string(),
        extra: if spec.auto_increment { "auto_increment" } else { "" }.to_string(),
    }
}

fn create_table(create: &CreateTable) -> MemoryTable {
    let mut table = MemoryTable {
        columns: create.columns.iter().map(|c| live_column(c, false)).collect(),
        indexes: Vec::new(),
    };
    if let Some(primary) = create.columns.iter().find(|c| c.primary_key) {
        table.indexes.push(LiveIndexRow {
            key_name: crate::schema::PRIMARY_INDEX.to_string(),
            non_unique: 0,
            column_name: primary.name.clone(),
            index_type: "BTREE".to_string(),
        });
    }
    for index in &create.indexes {
        add_index(&mut table, index);
    }
    table
}

fn alter_table(table: &mut MemoryTable, alter: &AlterTable) -> Result<(), AdapterError> {
    // Indexes that lost their rows to a dropped column in this statement.
    let mut dropped_with_column: Vec<String> = Vec::new();
    for change in &alter.changes {
        match change {
            Change::ChangeColumn { name, column, .. } => {
                let position = column_position(table, name)?;
                let keep_primary = table.columns[position].key == "PRI";
                table.columns[position] = live_column(column, keep_primary);
                for row in table.indexes.iter_mut().filter(|row| &row.column_name == name) {
                    row.column_name = column.name.clone();
                }
            }
            Change::AddColumn(column) => {
                if column_position(table, &column.name).is_ok() {
                    return Err(duplicate("column", &column.name));
                }
                table.columns.push(live_column(column, false));
            }
            Change::DropColumn(name) => {
                let position = column_position(table, name)?;
                table.columns.remove(position);
                for row in table.indexes.iter().filter(|row| &row.column_name == name) {
                    if !dropped_with_column.contains(&row.key_name) {
                        dropped_with_column.push(row.key_name.clone());
                    }
                }
                table.indexes.retain(|row| &row.column_name != name);
            }
            Change::DropIndex(name) => {
                if !table.indexes.iter().any(|row| &row.key_name == name) {
                    if dropped_with_column.contains(name) {
                        continue;
                    }
                    return Err(AdapterError::sql(format!("can't DROP '{name}'; check that column/key exists")));
                }
                table.indexes.retain(|row| &row.key_name != name);
            }
            Change::AddIndex(index) => {
                if let Some(name) = &index.name
                    && table.indexes.iter().any(|row| &row.key_name == name)
                {
                    return Err(duplicate("key name", name));
                }
                add_index(table, index);
            }
        }
    }
    Ok(())
}

fn column_position(table: &MemoryTable, name: &str) -> Result<usize, AdapterError> {
    table
        .columns
        .iter()
        .position(|column| column.field == name)
        .ok_or_else(|| AdapterError::sql(format!("unknown column '{name}'")))
}

fn duplicate(what: &str, name: &str) -> AdapterError {
    AdapterError::sql(format!("duplicate {what} '{name}'"))
}

/// Unnamed indexes are named after their first column, suffixed `_2`, `_3`...
/// on clashes.
fn add_index(table: &mut MemoryTable, index: &IndexSpec) {
    let name = index.name.clone().unwrap_or_else(|| {
        let base = index.fields.first().cloned().unwrap_or_default();
        let taken = |candidate: &str| table.indexes.iter().any(|row| row.key_name == candidate);
        if !taken(&base) {
            return base;
        }
        let mut suffix = 2;
        loop {
            let candidate = format!("{base}_{suffix}");
            if !taken(&candidate) {
                break candidate;
            }
            suffix += 1;
        }
    });
    let index_type = if index.kind == IndexKind::Fulltext { "FULLTEXT" } else { "BTREE" };
    for field in &index.fields {
        table.indexes.push(LiveIndexRow {
            key_name: name.clone(),
            non_unique: i64::from(index.kind != IndexKind::Unique),
            column_name: field.clone(),
            index_type: index_type.to_string(),
        });
    }
}
