use std::time::Duration;
use thiserror::Error;

/// Errors raised while provisioning the store or loading station data
///
/// Row-level insert failures are not represented here: they are recovered by
/// the batch loader and returned to the caller as a `FailureSet`.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Host unreachable or credentials rejected
    #[error("could not connect to {host}:{port} as {username}: {}", db_error_text(.source))]
    Connection {
        host: String,
        port: u16,
        username: String,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    /// Database, extension or table creation failed
    #[error("schema provisioning failed for {object}: {}", db_error_text(.source))]
    Schema {
        object: String,
        #[source]
        source: tokio_postgres::Error,
    },

    /// A role could not be created or granted its read-only privileges
    #[error("grant failed for user {username} ({statement}): {}", db_error_text(.source))]
    Grant {
        username: String,
        statement: String,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("database error: {}", db_error_text(.0))]
    Database(#[from] tokio_postgres::Error),

    #[error("invalid credentials for {0}")]
    InvalidCredentials(String),

    #[error("secret store error: {0}")]
    SecretStore(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("AFDC API request failed: {0}")]
    Api(#[from] reqwest::Error),

    #[error("AFDC API returned status {status}: {body}")]
    ApiStatus { status: u16, body: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Server error text of a PostgreSQL error
///
/// `tokio_postgres::Error` only displays "db error" for errors reported by the
/// server; the severity, message and detail live on the inner `DbError`.
pub fn db_error_text(e: &tokio_postgres::Error) -> String {
    e.as_db_error()
        .map(ToString::to_string)
        .unwrap_or_else(|| e.to_string())
}

impl SyncError {
    /// True for failures that a corrected password could fix
    pub fn is_connectivity(&self) -> bool {
        matches!(self, SyncError::Connection { .. } | SyncError::Timeout { .. })
    }
}
