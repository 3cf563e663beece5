use std::fmt;

use serde::{Deserialize, Serialize};

use crate::adapter::{LiveColumn, LiveIndexRow};
use crate::types::{IndexDescriptor, IndexKind};

/// Name of the index MySQL reserves for the primary key.
pub const PRIMARY_INDEX: &str = "PRIMARY";

/// Column definition as the database should hold it. This is the unit of
/// comparison between a declared field and a live column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    /// Upper-cased SQL type, e.g. `INT(10) UNSIGNED`.
    pub column_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
}

/// Attribute of a [`ColumnSpec`] that may differ between two columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnAttribute {
    Name,
    Type,
    Nullable,
    PrimaryKey,
    AutoIncrement,
}

impl fmt::Display for ColumnAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ColumnAttribute::Name => "name",
            ColumnAttribute::Type => "type",
            ColumnAttribute::Nullable => "nullable",
            ColumnAttribute::PrimaryKey => "primary key",
            ColumnAttribute::AutoIncrement => "auto increment",
        };
        f.write_str(label)
    }
}

impl ColumnSpec {
    /// Attributes on which `self` and `other` disagree, in declaration order.
    /// Types are compared as exact strings, so a display width change counts.
    pub fn differences(&self, other: &ColumnSpec) -> Vec<ColumnAttribute> {
        let mut differences = Vec::new();
        if self.name != other.name {
            differences.push(ColumnAttribute::Name);
        }
        if self.column_type != other.column_type {
            differences.push(ColumnAttribute::Type);
        }
        if self.nullable != other.nullable {
            differences.push(ColumnAttribute::Nullable);
        }
        if self.primary_key != other.primary_key {
            differences.push(ColumnAttribute::PrimaryKey);
        }
        if self.auto_increment != other.auto_increment {
            differences.push(ColumnAttribute::AutoIncrement);
        }
        differences
    }

    pub fn matches(&self, other: &ColumnSpec) -> bool {
        self.differences(other).is_empty()
    }
}

impl From<&LiveColumn> for ColumnSpec {
    fn from(live: &LiveColumn) -> Self {
        Self {
            name: live.field.clone(),
            column_type: live.column_type.to_uppercase(),
            nullable: live.null.eq_ignore_ascii_case("YES"),
            primary_key: live.key.eq_ignore_ascii_case("PRI"),
            auto_increment: live.extra.to_ascii_lowercase().contains("auto_increment"),
        }
    }
}

/// Secondary index as held by the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: Option<String>,
    pub kind: IndexKind,
    pub fields: Vec<String>,
}

impl IndexSpec {
    /// Same kind over the same ordered fields. Names are not compared.
    pub fn matches(&self, other: &IndexSpec) -> bool {
        self.kind == other.kind && self.fields == other.fields
    }

    /// Group `SHOW INDEX` rows by index name, keeping the first-seen order of
    /// indexes and the row order of their columns. The primary key is skipped.
    pub fn from_live_rows(rows: &[LiveIndexRow]) -> Vec<IndexSpec> {
        let mut indexes: Vec<IndexSpec> = Vec::new();
        for row in rows.iter().filter(|row| row.key_name != PRIMARY_INDEX) {
            match indexes
                .iter_mut()
                .find(|index| index.name.as_deref() == Some(row.key_name.as_str()))
            {
                Some(index) => index.fields.push(row.column_name.clone()),
                None => indexes.push(IndexSpec {
                    name: Some(row.key_name.clone()),
                    kind: row.kind(),
                    fields: vec![row.column_name.clone()],
                }),
            }
        }
        indexes
    }
}

impl From<&IndexDescriptor> for IndexSpec {
    fn from(index: &IndexDescriptor) -> Self {
        Self {
            name: index.name.clone(),
            kind: index.kind,
            fields: index.fields.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, column_type: &str) -> ColumnSpec {
        ColumnSpec {
            name: name.to_string(),
            column_type: column_type.to_string(),
            nullable: false,
            primary_key: false,
            auto_increment: false,
        }
    }

    fn row(key_name: &str, non_unique: i64, column_name: &str, index_type: &str) -> LiveIndexRow {
        LiveIndexRow {
            key_name: key_name.to_string(),
            non_unique,
            column_name: column_name.to_string(),
            index_type: index_type.to_string(),
        }
    }

    #[test]
    fn test_differences_lists_each_attribute() {
        let declared = column("age", "TINYINT(3) UNSIGNED");
        let mut live = column("age", "TINYINT(4)");
        live.nullable = true;
        assert_eq!(
            declared.differences(&live),
            vec![ColumnAttribute::Type, ColumnAttribute::Nullable]
        );
        assert!(declared.matches(&declared.clone()));
    }

    #[test]
    fn test_from_live_column() {
        let live = LiveColumn {
            field: "id".to_string(),
            column_type: "int(10) unsigned".to_string(),
            null: "NO".to_string(),
            key: "PRI".to_string(),
            extra: "auto_increment".to_string(),
        };
        let spec = ColumnSpec::from(&live);
        assert_eq!(spec.column_type, "INT(10) UNSIGNED");
        assert!(!spec.nullable);
        assert!(spec.primary_key);
        assert!(spec.auto_increment);
    }

    #[test]
    fn test_integer_without_display_width_differs() {
        // MySQL 8.0.19 and later report `int unsigned`, with no width.
        let live = LiveColumn {
            field: "id".to_string(),
            column_type: "int unsigned".to_string(),
            null: "NO".to_string(),
            key: "PRI".to_string(),
            extra: "auto_increment".to_string(),
        };
        let mut declared = column("id", "INT(10) UNSIGNED");
        declared.primary_key = true;
        declared.auto_increment = true;
        assert_eq!(declared.differences(&ColumnSpec::from(&live)), vec![ColumnAttribute::Type]);
    }

    #[test]
    fn test_group_live_index_rows() {
        let rows = vec![
            row("PRIMARY", 0, "id", "BTREE"),
            row("email", 0, "email", "BTREE"),
            row("names", 1, "last_name", "BTREE"),
            row("names", 1, "first_name", "BTREE"),
            row("bio", 1, "bio", "FULLTEXT"),
        ];
        let indexes = IndexSpec::from_live_rows(&rows);
        assert_eq!(indexes.len(), 3);
        assert_eq!(indexes[0].kind, IndexKind::Unique);
        assert_eq!(indexes[1].kind, IndexKind::Index);
        assert_eq!(indexes[1].fields, vec!["last_name", "first_name"]);
        assert_eq!(indexes[2].kind, IndexKind::Fulltext);
    }

    #[test]
    fn test_index_match_ignores_name_but_not_order() {
        let declared = IndexSpec {
            name: None,
            kind: IndexKind::Index,
            fields: vec!["a".to_string(), "b".to_string()],
        };
        let renamed = IndexSpec {
            name: Some("whatever".to_string()),
            ..declared.clone()
        };
        let reordered = IndexSpec {
            fields: vec!["b".to_string(), "a".to_string()],
            ..declared.clone()
        };
        assert!(declared.matches(&renamed));
        assert!(!declared.matches(&reordered));
    }
}
