use std::time::Duration;

use log::{debug, info};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::Row;

use super::{EscapeIdentifier, LiveColumn, LiveIndexRow, SqlAdapter};
use crate::errors::AdapterError;

const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLSTATE reported by MySQL for an unknown table.
const SQLSTATE_NO_SUCH_TABLE: &str = "42S02";

/// MySQL adapter backed by a sqlx pool.
#[derive(Debug, Clone)]
pub struct MySqlAdapter {
    pool: MySqlPool,
}

impl MySqlAdapter {
    pub async fn connect(url: &str) -> Result<Self, AdapterError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect(url)
            .await
            .map_err(|e| AdapterError::Connection { message: e.to_string() })?;
        info!("Connected to MySQL");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, sql: &str) -> Result<Vec<MySqlRow>, AdapterError> {
        debug!("{sql}");
        sqlx::raw_sql(sql).fetch_all(&self.pool).await.map_err(map_sqlx_error)
    }
}

impl EscapeIdentifier for MySqlAdapter {}

impl SqlAdapter for MySqlAdapter {
    async fn show_columns(&self, table: &str) -> Result<Vec<LiveColumn>, AdapterError> {
        let rows = self
            .fetch(&format!("SHOW COLUMNS FROM {}", self.escape_identifier(table)))
            .await?;
        rows.iter()
            .map(|row| {
                Ok(LiveColumn {
                    field: text(row, "Field")?,
                    column_type: text(row, "Type")?,
                    null: text(row, "Null")?,
                    key: text(row, "Key")?,
                    extra: text(row, "Extra")?,
                })
            })
            .collect()
    }

    async fn show_indexes(&self, table: &str) -> Result<Vec<LiveIndexRow>, AdapterError> {
        let rows = self
            .fetch(&format!("SHOW INDEX FROM {}", self.escape_identifier(table)))
            .await?;
        rows.iter()
            .map(|row| {
                Ok(LiveIndexRow {
                    key_name: text(row, "Key_name")?,
                    non_unique: integer(row, "Non_unique")?,
                    column_name: text(row, "Column_name")?,
                    index_type: text(row, "Index_type")?,
                })
            })
            .collect()
    }

    async fn execute(&self, sql: &str) -> Result<(), AdapterError> {
        debug!("{sql}");
        sqlx::raw_sql(sql).execute(&self.pool).await.map_err(map_sqlx_error)?;
        Ok(())
    }
}

/// SHOW statements answer with text or binary strings depending on the
/// server version; both are accepted. NULL reads as an empty string.
fn text(row: &MySqlRow, column: &str) -> Result<String, AdapterError> {
    if let Ok(value) = row.try_get_unchecked::<Option<String>, _>(column) {
        return Ok(value.unwrap_or_default());
    }
    row.try_get_unchecked::<Option<Vec<u8>>, _>(column)
        .map(|bytes| String::from_utf8_lossy(&bytes.unwrap_or_default()).into_owned())
        .map_err(map_sqlx_error)
}

fn integer(row: &MySqlRow, column: &str) -> Result<i64, AdapterError> {
    if let Ok(value) = row.try_get_unchecked::<i64, _>(column) {
        return Ok(value);
    }
    let raw = text(row, column)?;
    raw.trim()
        .parse()
        .map_err(|_| AdapterError::sql(format!("unexpected value '{raw}' in column {column}")))
}

fn map_sqlx_error(error: sqlx::Error) -> AdapterError {
    match error {
        sqlx::Error::Database(db) => {
            let code = db.code().map(|code| code.into_owned());
            if code.as_deref() == Some(SQLSTATE_NO_SUCH_TABLE) {
                AdapterError::ObjectNotFound {
                    object: db.message().to_string(),
                }
            } else {
                AdapterError::Sql {
                    code,
                    message: db.message().to_string(),
                }
            }
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => AdapterError::Connection {
            message: error.to_string(),
        },
        other => AdapterError::sql(other.to_string()),
    }
}
