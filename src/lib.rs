// Include the error module
pub mod error;

// Include the database module
pub mod database;

// Include the secret store and credential gate
pub mod secrets;
pub mod credentials;

// Include the AFDC API client module
#[path = "afdc-api.rs"]
pub mod afdc_api;

// Include the station extraction module
#[path = "station-extract.rs"]
pub mod station_extract;

// Include the end-to-end sync
pub mod sync;

// Database-backed tests (need a live PostgreSQL/PostGIS server)
#[cfg(test)]
#[path = "test_sync_db.rs"]
pub mod test_sync_db;

// Re-export the types most callers need
pub use error::SyncError;
pub use afdc_api::{AfdcClient, StateRecords};
pub use database::{DatabaseManager, FailureSet, Row, SqlValue, SyncConfig, SyncReport, TableId};
pub use secrets::{FileSecretStore, KeyringSecretStore, MemorySecretStore, SecretPrompt, SecretStore, TerminalPrompt};
pub use station_extract::{extract, ExtractedRows};
pub use sync::StationSync;
