//! Field to column mapping for MySQL.

use crate::errors::ConfigError;
use crate::schema::ColumnSpec;
use crate::types::{FieldDescriptor, TypeFamily};

/// Width of password columns, whatever the declared max.
pub const PASSWORD_COLUMN_WIDTH: i64 = 128;

/// Compute the column a field should be stored in.
///
/// The result only depends on the field and the id field name, so it can be
/// compared attribute by attribute against what the database reports.
pub fn column_spec(field: &FieldDescriptor, id_field: &str) -> Result<ColumnSpec, ConfigError> {
    let column_type = match field.field_type.family() {
        TypeFamily::String => string_affinity(field)?,
        TypeFamily::Numeric => numeric_affinity(field)?,
        TypeFamily::Date => "DATE".to_string(),
        TypeFamily::Datetime => "DATETIME".to_string(),
    };
    let is_id = field.name == id_field;
    Ok(ColumnSpec {
        name: field.name.clone(),
        column_type,
        nullable: field.nullable,
        primary_key: is_id,
        auto_increment: is_id,
    })
}

fn required_max(field: &FieldDescriptor) -> Result<i64, ConfigError> {
    field.args.max.ok_or_else(|| ConfigError::MissingMax {
        field: field.name.clone(),
    })
}

fn string_affinity(field: &FieldDescriptor) -> Result<String, ConfigError> {
    let width = if field.field_type.is_password() {
        PASSWORD_COLUMN_WIDTH
    } else {
        required_max(field)?
    };
    Ok(match width {
        w if w < 256 => format!("VARCHAR({w})"),
        w if w < 65_536 => "TEXT".to_string(),
        w if w < 16_777_216 => "MEDIUMTEXT".to_string(),
        _ => "LONGTEXT".to_string(),
    })
}

fn numeric_affinity(field: &FieldDescriptor) -> Result<String, ConfigError> {
    let max = required_max(field)?;
    let unsigned = field.args.min.unwrap_or(0) >= 0;
    let digits = max.to_string().len();
    let decimals = field.args.decimals;

    let mut column_type = if decimals == 0 {
        let factor: i64 = if unsigned { 2 } else { 1 };
        let affinity = if max < 128 * factor {
            "TINYINT"
        } else if max < 32_768 * factor {
            "SMALLINT"
        } else if max < 8_388_608 * factor {
            "MEDIUMINT"
        } else if max < 2_147_483_648 * factor {
            "INT"
        } else {
            "BIGINT"
        };
        format!("{affinity}({digits})")
    } else {
        let total = digits + decimals as usize + 1;
        let affinity = if total < 23 && decimals < 8 { "FLOAT" } else { "DOUBLE" };
        format!("{affinity}({total},{decimals})")
    };
    if unsigned {
        column_type.push_str(" UNSIGNED");
    }
    Ok(column_type)
}
