//! Error types for the keyvify-store crate.
//!
//! All store operations return [`StoreError`] via [`StoreResult`].
//! Every variant maps to a stable [`ErrorKind`] so callers can branch on
//! the kind without matching on message text.

use std::fmt;

use thiserror::Error;

/// Alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No key was supplied, or the key was empty.
    #[error("no key was passed")]
    NoKey,

    /// The key is not a literal made of letters, digits and underscores.
    #[error("invalid key: {key:?}")]
    InvalidKey { key: String },

    /// A value was required but none was supplied.
    #[error("no value was passed for key {key:?}")]
    NoValue { key: String },

    /// A dot-path was used against a value that is not an object.
    #[error("value stored under {key:?} is not an object")]
    ValueNotObject { key: String },

    /// The parameters of an operation are malformed.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// The math operator is not one of the accepted aliases.
    #[error("invalid math operator: {0:?}")]
    InvalidOperator(String),

    /// An operand of a math operation is not a number.
    #[error("invalid number: {0}")]
    InvalidNumber(String),

    /// No configuration could be found.
    #[error("no configuration was passed: {0}")]
    NoConfig(String),

    /// The configured dialect is unknown or not supported.
    #[error("invalid dialect: {0:?}")]
    InvalidDialect(String),

    /// The collection name cannot be used as a table identifier.
    #[error("invalid database name: {0:?}")]
    InvalidDbName(String),

    /// A configuration field has the wrong shape.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The backend could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// An operation was attempted before `connect()`.
    #[error("store {name:?} is not connected")]
    NotConnected { name: String },

    /// The codec failed to encode or decode a value.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// SQLite operation failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A relational backend operation failed.
    #[cfg(feature = "sql")]
    #[error("sql error: {0}")]
    Sql(#[from] sqlx::Error),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading or writing a file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking task was cancelled or panicked.
    #[error("background task failed: {0}")]
    TaskJoin(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(err.to_string())
    }
}

/// Machine-readable classification of a [`StoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NoKey,
    InvalidKey,
    NoValue,
    ValueNotObject,
    InvalidParameters,
    InvalidOperator,
    InvalidNumber,
    NoConfig,
    InvalidDialect,
    InvalidDbName,
    InvalidConfig,
    Connection,
    NotConnected,
    Serialization,
    Backend,
    Io,
    TaskJoin,
}

impl ErrorKind {
    /// Stable code for this kind, e.g. `NO_KEY`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoKey => "NO_KEY",
            Self::InvalidKey => "INVALID_KEY",
            Self::NoValue => "NO_VALUE",
            Self::ValueNotObject => "VALUE_NOT_OBJECT",
            Self::InvalidParameters => "INVALID_PARAMETERS",
            Self::InvalidOperator => "INVALID_MATH_OPERATOR",
            Self::InvalidNumber => "INVALID_NUMBER",
            Self::NoConfig => "NO_CONFIG",
            Self::InvalidDialect => "INVALID_DIALECT",
            Self::InvalidDbName => "INVALID_DB_NAME",
            Self::InvalidConfig => "INVALID_CONFIG",
            Self::Connection => "CONNECTION_ERROR",
            Self::NotConnected => "NOT_CONNECTED",
            Self::Serialization => "SERIALIZATION_ERROR",
            Self::Backend => "BACKEND_ERROR",
            Self::Io => "IO_ERROR",
            Self::TaskJoin => "TASK_JOIN_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StoreError {
    /// The machine-readable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoKey => ErrorKind::NoKey,
            Self::InvalidKey { .. } => ErrorKind::InvalidKey,
            Self::NoValue { .. } => ErrorKind::NoValue,
            Self::ValueNotObject { .. } => ErrorKind::ValueNotObject,
            Self::InvalidParameters(_) => ErrorKind::InvalidParameters,
            Self::InvalidOperator(_) => ErrorKind::InvalidOperator,
            Self::InvalidNumber(_) => ErrorKind::InvalidNumber,
            Self::NoConfig(_) => ErrorKind::NoConfig,
            Self::InvalidDialect(_) => ErrorKind::InvalidDialect,
            Self::InvalidDbName(_) => ErrorKind::InvalidDbName,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::Connection(_) => ErrorKind::Connection,
            Self::NotConnected { .. } => ErrorKind::NotConnected,
            Self::Serialization(_) | Self::Json(_) => ErrorKind::Serialization,
            Self::Sqlite(_) => ErrorKind::Backend,
            #[cfg(feature = "sql")]
            Self::Sql(_) => ErrorKind::Backend,
            Self::Io(_) => ErrorKind::Io,
            Self::TaskJoin(_) => ErrorKind::TaskJoin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_have_stable_codes() {
        assert_eq!(StoreError::NoKey.kind().as_str(), "NO_KEY");
        assert_eq!(
            StoreError::InvalidKey { key: "a-b".into() }.kind(),
            ErrorKind::InvalidKey
        );
        assert_eq!(
            StoreError::NotConnected { name: "t".into() }.kind().to_string(),
            "NOT_CONNECTED"
        );
    }

    #[test]
    fn json_errors_are_serialization_kind() {
        let err: StoreError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::Serialization);
    }

    #[test]
    fn messages_name_the_key() {
        let err = StoreError::ValueNotObject { key: "user".into() };
        assert!(err.to_string().contains("\"user\""));
    }
}
