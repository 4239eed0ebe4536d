// Module declarations
pub mod config;
pub mod connection;
pub mod models;
pub mod statements;
pub mod structure;
mod schema;
mod access;
mod loader;

// Re-export public types
pub use config::SyncConfig;
pub use connection::{acquire, ConnectionDescriptor, ScopedConnection};
pub use models::{
    DatabaseSetupResult,
    FailedRow,
    FailureSet,
    Row,
    SqlValue,
    SyncReport,
    TableLoadSummary,
};
pub use access::derived_password;
pub use loader::RowChange;
pub use statements::SqlWriter;
pub use structure::{TableId, TableSchema};

/// Administrative handle on the destination store
///
/// Provides:
/// - Database, extension and table provisioning
/// - Read-only role provisioning and grants
/// - Batched row loading with per-row fallback
///
/// The manager holds no connection. Every operation opens its own
/// [`ScopedConnection`] with the administrative credentials and releases it
/// before returning, including on error.
///
/// # Example
/// ```rust,no_run
/// use afdc_station_sync_lib::database::{DatabaseManager, Row, SyncConfig, TableId};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = SyncConfig::from_env();
///     let db = DatabaseManager::new(config, "admin-password".to_string());
///
///     db.ensure_database(&db.database()).await?;
///     db.ensure_tables(&TableId::ALL).await?;
///
///     let rows = vec![Row::new().with("id", "1").with("latitude", "34.5")];
///     let failures = db.load(TableId::Station, &rows).await?;
///     println!("{} rows failed", failures.len());
///
///     Ok(())
/// }
/// ```
pub struct DatabaseManager {
    config: SyncConfig,
    admin_password: String,
}

impl DatabaseManager {
    /// Create a new DatabaseManager instance
    pub fn new(config: SyncConfig, admin_password: String) -> Self {
        Self {
            config,
            admin_password,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Target database name
    pub fn database(&self) -> String {
        self.config.database_name()
    }

    fn admin_server(&self) -> ConnectionDescriptor {
        ConnectionDescriptor::server(&self.config, &self.config.admin_user, &self.admin_password)
    }

    fn admin_database(&self, database: &str) -> ConnectionDescriptor {
        ConnectionDescriptor::database(&self.config, &self.config.admin_user, &self.admin_password, database)
    }
}
