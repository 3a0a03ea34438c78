//! Error types for baserepo

use thiserror::Error;

/// Errors surfaced by repository operations
///
/// Persistence adapters produce these; the repository layer forwards them
/// to the caller untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// No row matched the lookup
    #[error("{entity} not found: {key}")]
    NotFound { entity: String, key: String },

    /// Condition or sort input rejected by the store
    #[error("Query error: {message}")]
    QueryError { message: String },

    /// Connection, constraint or backend failure
    #[error("Persistence error: {message}")]
    PersistenceError { message: String },

    /// Caller passed an invalid or absent entity/identity
    #[error("Invalid argument: {message}")]
    ArgumentError { message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Deadline exceeded")]
    DeadlineExceeded,
}

/// Discriminant of [`RepositoryError`], used as a span attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Query,
    Persistence,
    Argument,
    Cancelled,
    DeadlineExceeded,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Query => "query",
            ErrorKind::Persistence => "persistence",
            ErrorKind::Argument => "argument",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::DeadlineExceeded => "deadline_exceeded",
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RepositoryError {
    pub fn not_found(entity: impl Into<String>, key: impl ToString) -> Self {
        RepositoryError::NotFound {
            entity: entity.into(),
            key: key.to_string(),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        RepositoryError::QueryError {
            message: message.into(),
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        RepositoryError::PersistenceError {
            message: message.into(),
        }
    }

    pub fn argument(message: impl Into<String>) -> Self {
        RepositoryError::ArgumentError {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RepositoryError::NotFound { .. } => ErrorKind::NotFound,
            RepositoryError::QueryError { .. } => ErrorKind::Query,
            RepositoryError::PersistenceError { .. } => ErrorKind::Persistence,
            RepositoryError::ArgumentError { .. } => ErrorKind::Argument,
            RepositoryError::Cancelled => ErrorKind::Cancelled,
            RepositoryError::DeadlineExceeded => ErrorKind::DeadlineExceeded,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),
}
