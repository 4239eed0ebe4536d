use std::fmt;
use std::ops::{Deref, DerefMut};
use std::time::Duration;
use log::{debug, error};
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls};
use crate::database::config::{SyncConfig, MAINTENANCE_DATABASE};
use crate::error::{db_error_text, SyncError};

const APPLICATION_NAME: &str = "afdc-station-sync";

/// Parameters for a single connection
///
/// Built per operation and consumed by [`acquire`]; descriptors are cheap and
/// are never cached between operations.
#[derive(Clone)]
pub struct ConnectionDescriptor {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// `None` opens a server-level connection against the maintenance database
    pub database: Option<String>,
    pub connect_timeout: Duration,
    pub statement_timeout: Duration,
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

impl ConnectionDescriptor {
    /// Server-level descriptor, used for catalog checks and role management
    pub fn server(config: &SyncConfig, username: &str, password: &str) -> Self {
        Self {
            host: config.hostname.clone(),
            port: config.port,
            username: username.to_string(),
            password: password.to_string(),
            database: None,
            connect_timeout: config.connect_timeout(),
            statement_timeout: config.statement_timeout(),
        }
    }

    /// Database-level descriptor; the database must already exist
    pub fn database(config: &SyncConfig, username: &str, password: &str, database: &str) -> Self {
        Self {
            database: Some(database.to_string()),
            ..Self::server(config, username, password)
        }
    }

    fn target_database(&self) -> &str {
        self.database.as_deref().unwrap_or(MAINTENANCE_DATABASE)
    }

    fn pg_config(&self) -> tokio_postgres::Config {
        let mut pg = tokio_postgres::Config::new();
        pg.host(&self.host)
            .port(self.port)
            .user(&self.username)
            .password(&self.password)
            .dbname(self.target_database())
            .application_name(APPLICATION_NAME)
            .keepalives(true);
        // Server-side bound on every statement issued over this connection
        if !self.statement_timeout.is_zero() {
            pg.options(&format!("-c statement_timeout={}", self.statement_timeout.as_millis()));
        }
        pg
    }
}

/// An open connection that is released when dropped
///
/// Auto-commit applies to every statement unless the caller opens an explicit
/// transaction through [`Client::transaction`].
pub struct ScopedConnection {
    client: Client,
    label: String,
    _task: JoinHandle<()>,
}

/// Open a connection described by `descriptor`
///
/// Fails with [`SyncError::Connection`] when the host is unreachable or the
/// credentials are rejected, and with [`SyncError::Timeout`] when the connect
/// does not finish within the descriptor's connect timeout. No retry is
/// attempted here.
pub async fn acquire(descriptor: &ConnectionDescriptor) -> Result<ScopedConnection, SyncError> {
    let label = format!(
        "{}@{}:{}/{}",
        descriptor.username,
        descriptor.host,
        descriptor.port,
        descriptor.target_database()
    );
    let pg = descriptor.pg_config();

    let (client, connection) = match tokio::time::timeout(descriptor.connect_timeout, pg.connect(NoTls)).await {
        Ok(Ok(pair)) => pair,
        Ok(Err(source)) => {
            return Err(SyncError::Connection {
                host: descriptor.host.clone(),
                port: descriptor.port,
                username: descriptor.username.clone(),
                source,
            })
        }
        Err(_) => {
            return Err(SyncError::Timeout {
                operation: format!("connect to {}", label),
                after: descriptor.connect_timeout,
            })
        }
    };

    let task_label = label.clone();
    let task = tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("Connection {} closed with error: {}", task_label, db_error_text(&e));
        }
    });

    debug!("Opened connection {}", label);
    Ok(ScopedConnection {
        client,
        label,
        _task: task,
    })
}

impl ScopedConnection {
    /// Run a single-row `SELECT EXISTS(...)` query bound to one text parameter
    pub async fn exists(&self, sql: &str, param: &str) -> Result<bool, tokio_postgres::Error> {
        let row = self.client.query_one(sql, &[&param]).await?;
        Ok(row.get(0))
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Deref for ScopedConnection {
    type Target = Client;

    fn deref(&self) -> &Client {
        &self.client
    }
}

impl DerefMut for ScopedConnection {
    fn deref_mut(&mut self) -> &mut Client {
        &mut self.client
    }
}

impl Drop for ScopedConnection {
    fn drop(&mut self) {
        // Dropping the client terminates the session; the connection task then exits
        debug!("Releasing connection {}", self.label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_descriptor_targets_maintenance_database() {
        let config = SyncConfig::default();
        let descriptor = ConnectionDescriptor::server(&config, "postgres", "secret");
        assert_eq!(descriptor.database, None);
        assert_eq!(descriptor.target_database(), MAINTENANCE_DATABASE);
        assert_eq!(descriptor.connect_timeout, config.connect_timeout());
    }

    #[test]
    fn database_descriptor_keeps_exact_name() {
        let config = SyncConfig::default();
        let descriptor = ConnectionDescriptor::database(&config, "postgres", "secret", "Afdc_Api");
        assert_eq!(descriptor.target_database(), "Afdc_Api");
        assert_eq!(descriptor.pg_config().get_dbname(), Some("Afdc_Api"));
    }

    #[test]
    fn debug_output_redacts_password() {
        let config = SyncConfig::default();
        let descriptor = ConnectionDescriptor::server(&config, "postgres", "hunter2");
        let rendered = format!("{:?}", descriptor);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_connectivity_error() {
        let config = SyncConfig {
            hostname: "127.0.0.1".to_string(),
            port: 1,
            connect_timeout_secs: 5,
            ..SyncConfig::default()
        };
        let descriptor = ConnectionDescriptor::server(&config, "postgres", "secret");
        let err = match acquire(&descriptor).await {
            Ok(_) => panic!("connection to port 1 should fail"),
            Err(e) => e,
        };
        assert!(err.is_connectivity());
    }
}
