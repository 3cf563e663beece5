//! SQL rendering of table plans.

use serde::{Deserialize, Serialize};

use crate::adapter::EscapeIdentifier;
use crate::diff::{AlterTable, Change, CreateTable, TablePlan};
use crate::schema::{ColumnSpec, IndexSpec};

/// Table options appended to `CREATE TABLE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DdlOptions {
    pub engine: String,
    pub charset: String,
}

impl Default for DdlOptions {
    fn default() -> Self {
        Self {
            engine: "MyISAM".to_string(),
            charset: "utf8".to_string(),
        }
    }
}

/// Renders plans to MySQL statements, quoting identifiers through `E`.
pub struct DdlRenderer<'a, E: EscapeIdentifier + ?Sized> {
    escaper: &'a E,
    options: &'a DdlOptions,
}

impl<'a, E: EscapeIdentifier + ?Sized> DdlRenderer<'a, E> {
    pub fn new(escaper: &'a E, options: &'a DdlOptions) -> Self {
        Self { escaper, options }
    }

    fn quote(&self, name: &str) -> String {
        self.escaper.escape_identifier(name)
    }

    /// `name TYPE NULL|NOT NULL [AUTO_INCREMENT] [PRIMARY KEY]`.
    ///
    /// `with_primary_key` is false when the key already exists on the live
    /// column, redeclaring it would fail.
    pub fn column_definition(&self, column: &ColumnSpec, with_primary_key: bool) -> String {
        let mut definition = format!(
            "{} {} {}",
            self.quote(&column.name),
            column.column_type,
            if column.nullable { "NULL" } else { "NOT NULL" }
        );
        if column.auto_increment {
            definition.push_str(" AUTO_INCREMENT");
        }
        if with_primary_key && column.primary_key {
            definition.push_str(" PRIMARY KEY");
        }
        definition
    }

    /// `KIND [name] (field, ...)`.
    pub fn index_definition(&self, index: &IndexSpec) -> String {
        let fields = index
            .fields
            .iter()
            .map(|field| self.quote(field))
            .collect::<Vec<_>>()
            .join(", ");
        match &index.name {
            Some(name) => format!("{} {} ({fields})", index.kind, self.quote(name)),
            None => format!("{} ({fields})", index.kind),
        }
    }

    pub fn change(&self, change: &Change) -> String {
        match change {
            Change::ChangeColumn { name, column, current } => format!(
                "CHANGE COLUMN {} {}",
                self.quote(name),
                self.column_definition(column, !current.primary_key)
            ),
            Change::AddColumn(column) => format!("ADD COLUMN {}", self.column_definition(column, true)),
            Change::DropColumn(name) => format!("DROP COLUMN {}", self.quote(name)),
            Change::AddIndex(index) => format!("ADD {}", self.index_definition(index)),
            Change::DropIndex(name) => format!("DROP INDEX {}", self.quote(name)),
        }
    }

    pub fn create_table(&self, create: &CreateTable) -> String {
        let definitions = create
            .columns
            .iter()
            .map(|column| self.column_definition(column, true))
            .chain(create.indexes.iter().map(|index| self.index_definition(index)))
            .map(|definition| format!("\t{definition}"))
            .collect::<Vec<_>>()
            .join(",\n");
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{definitions}\n) ENGINE={} CHARACTER SET {};",
            self.quote(&create.table),
            self.options.engine,
            self.options.charset
        )
    }

    /// One batched statement holding every change, in plan order.
    pub fn alter_table(&self, alter: &AlterTable) -> String {
        let operations = alter
            .changes
            .iter()
            .map(|change| format!("\t{}", self.change(change)))
            .collect::<Vec<_>>()
            .join(",\n");
        format!("ALTER TABLE {}\n{operations};", self.quote(&alter.table))
    }

    /// SQL for a plan, or `None` when the table is already up to date.
    pub fn render(&self, plan: &TablePlan) -> Option<String> {
        match plan {
            TablePlan::Create(create) => Some(self.create_table(create)),
            TablePlan::Alter(alter) => Some(self.alter_table(alter)),
            TablePlan::Unchanged { .. } => None,
        }
    }
}
