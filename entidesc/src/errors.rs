use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type returned by descriptor loading, planning and rendering.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The entity declaration is invalid; the entity cannot be migrated.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The database adapter failed while probing or executing.
    #[error("database error: {0}")]
    Adapter(#[from] AdapterError),

    /// A full table definition was requested for a descriptor without columns.
    #[error("no columns declared for table '{table}'")]
    NoColumns { table: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fatal problems in an entity declaration.
///
/// These abort migration generation for the entity concerned and are
/// surfaced to the operator as-is.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("descriptor source for '{entity}' not found at {}", .path.display())]
    SourceNotFound { entity: String, path: PathBuf },

    #[error("descriptor source {} is malformed: {message}", .path.display())]
    Malformed { path: PathBuf, message: String },

    /// The declaration exists but declares no field at all.
    #[error("descriptor for '{entity}' is corrupted or empty, there is no field")]
    EmptyDeclaration { entity: String },

    #[error("unable to parse type declaration '{declaration}'")]
    InvalidTypeSyntax { declaration: String },

    #[error("type of field '{field}' ({type_name}) not found")]
    UnknownType { field: String, type_name: String },

    #[error("invalid value '{value}' for argument '{argument}' of field '{field}'")]
    InvalidArgument {
        field: String,
        argument: &'static str,
        value: String,
    },

    #[error("issue with field '{field}', missing max argument")]
    MissingMax { field: String },

    #[error("unknown index type '{kind}' in entity '{entity}'")]
    UnknownIndexType { entity: String, kind: String },

    #[error("index on entity '{entity}' references undeclared field '{field}'")]
    UnknownIndexField { entity: String, field: String },

    #[error("index on entity '{entity}' declares no field")]
    EmptyIndex { entity: String },

    #[error("parent cycle detected while loading '{entity}': {}", .chain.join(" -> "))]
    ParentCycle { entity: String, chain: Vec<String> },
}

/// Errors raised by a [`SqlAdapter`](crate::adapter::SqlAdapter).
///
/// The distinction between [`AdapterError::ObjectNotFound`] and the other
/// variants drives the CREATE fallback of the diff engine.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The inspected table (or other object) does not exist.
    #[error("object '{object}' does not exist")]
    ObjectNotFound { object: String },

    /// Any other SQL failure reported by the server.
    #[error("sql error{}: {message}", .code.as_deref().map(|c| format!(" [{c}]")).unwrap_or_default())]
    Sql { code: Option<String>, message: String },

    /// The connection could not be established or was lost.
    #[error("connection error: {message}")]
    Connection { message: String },
}

impl AdapterError {
    pub fn sql(message: impl Into<String>) -> Self {
        Self::Sql {
            code: None,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AdapterError::ObjectNotFound { .. })
    }
}

/// Failures of a descriptor cache backend. Never fatal for a load.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type SchemaResult<T> = Result<T, SchemaError>;
