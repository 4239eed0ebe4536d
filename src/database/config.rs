use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::error::SyncError;

/// Sync configuration constants

// Naming
pub const DEFAULT_NAMESPACE: &str = "AFDC_API";
pub const DEFAULT_API_NAME: &str = "nrel_api_key";

// Database server
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_ADMIN_USER: &str = "postgres";
pub const MAINTENANCE_DATABASE: &str = "postgres";
pub const PUBLIC_SCHEMA: &str = "public";
pub const GEOSPATIAL_EXTENSION: &str = "postgis";

// Timeouts
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_STATEMENT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 60;

// Batch processing
pub const PROGRESS_INTERVAL: usize = 1000;

const APP_CONFIG_DIR: &str = "afdc-station-sync";
const CONFIG_FILE_NAME: &str = "config.json";

/// Configuration for one sync run
///
/// Loaded once at startup and passed explicitly to every component; nothing
/// reads process environment after `load()` returns.
///
/// # Environment Variables
/// - `AFDC_NAMESPACE`: secret store namespace, also the database name once lowercased (default: "AFDC_API")
/// - `AFDC_API_NAME`: secret store key of the API key (default: "nrel_api_key")
/// - `AFDC_DB_HOST`: database host (default: "localhost")
/// - `AFDC_DB_PORT`: database port (default: 5432)
/// - `AFDC_DB_ADMIN_USER`: administrative user (default: "postgres")
/// - `AFDC_DB_USERS`: comma separated read-only users (default: none)
/// - `AFDC_CONNECT_TIMEOUT_SECS`, `AFDC_STATEMENT_TIMEOUT_SECS`: database timeouts
/// - `AFDC_API_TIMEOUT_SECS`: per-request timeout of the AFDC API (default: 60)
///
/// # Example
/// ```rust
/// use afdc_station_sync_lib::database::SyncConfig;
///
/// let config = SyncConfig {
///     users: vec!["analyst".to_string()],
///     ..SyncConfig::default()
/// };
/// assert_eq!(config.database_name(), "afdc_api");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    pub namespace: String,
    pub api_name: String,
    pub hostname: String,
    pub port: u16,
    pub admin_user: String,
    pub users: Vec<String>,
    pub connect_timeout_secs: u64,
    pub statement_timeout_secs: u64,
    pub api_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            api_name: DEFAULT_API_NAME.to_string(),
            hostname: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            admin_user: DEFAULT_ADMIN_USER.to_string(),
            users: Vec::new(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            statement_timeout_secs: DEFAULT_STATEMENT_TIMEOUT_SECS,
            api_timeout_secs: DEFAULT_API_TIMEOUT_SECS,
        }
    }
}

impl SyncConfig {
    /// Load configuration from file, falling back to environment variables, then defaults
    pub fn load() -> Result<Self, SyncError> {
        let path = Self::config_file_path();
        if path.exists() {
            let contents = fs::read_to_string(&path)?;
            let config: SyncConfig = serde_json::from_str(&contents)?;
            config.validate()?;
            return Ok(config);
        }

        let config = Self::from_env();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            namespace: std::env::var("AFDC_NAMESPACE").unwrap_or(defaults.namespace),
            api_name: std::env::var("AFDC_API_NAME").unwrap_or(defaults.api_name),
            hostname: std::env::var("AFDC_DB_HOST").unwrap_or(defaults.hostname),
            port: std::env::var("AFDC_DB_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            admin_user: std::env::var("AFDC_DB_ADMIN_USER").unwrap_or(defaults.admin_user),
            users: std::env::var("AFDC_DB_USERS")
                .map(|users| Self::parse_user_list(&users))
                .unwrap_or(defaults.users),
            connect_timeout_secs: std::env::var("AFDC_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.connect_timeout_secs),
            statement_timeout_secs: std::env::var("AFDC_STATEMENT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.statement_timeout_secs),
            api_timeout_secs: std::env::var("AFDC_API_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.api_timeout_secs),
        }
    }

    /// Config file location: `AFDC_CONFIG` if set, otherwise the user config directory
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var("AFDC_CONFIG") {
            return PathBuf::from(path);
        }
        user_config_dir().join(APP_CONFIG_DIR).join(CONFIG_FILE_NAME)
    }

    /// Save configuration to the config file
    pub fn save(&self) -> Result<(), SyncError> {
        let path = Self::config_file_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    fn validate(&self) -> Result<(), SyncError> {
        if self.namespace.trim().is_empty() {
            return Err(SyncError::Config("namespace must not be empty".to_string()));
        }
        if self.hostname.trim().is_empty() {
            return Err(SyncError::Config("hostname must not be empty".to_string()));
        }
        if self.admin_user.trim().is_empty() {
            return Err(SyncError::Config("admin_user must not be empty".to_string()));
        }
        if self.api_timeout_secs == 0 {
            return Err(SyncError::Config("api_timeout_secs must be positive".to_string()));
        }
        Ok(())
    }

    fn parse_user_list(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Name of the target database, derived from the namespace
    pub fn database_name(&self) -> String {
        self.namespace.to_lowercase()
    }

    /// Namespace under which the API key is stored
    pub fn api_key_namespace(&self) -> String {
        format!("{}_KEY", self.namespace)
    }

    /// Configured users other than the administrative one
    pub fn read_only_users(&self) -> Vec<&str> {
        self.users
            .iter()
            .map(String::as_str)
            .filter(|u| *u != self.admin_user)
            .collect()
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn statement_timeout(&self) -> Duration {
        Duration::from_secs(self.statement_timeout_secs)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }
}

/// Per-user configuration directory, shared with the file secret store
pub(crate) fn user_config_dir() -> PathBuf {
    if cfg!(windows) {
        std::env::var("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
    } else {
        std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".config"))
            .unwrap_or_else(|_| PathBuf::from("."))
    }
}

pub(crate) fn app_config_dir() -> PathBuf {
    user_config_dir().join(APP_CONFIG_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_name_is_lowercased_namespace() {
        let config = SyncConfig::default();
        assert_eq!(config.database_name(), "afdc_api");
        assert_eq!(config.api_key_namespace(), "AFDC_API_KEY");
    }

    #[test]
    fn read_only_users_exclude_admin() {
        let config = SyncConfig {
            users: vec!["postgres".to_string(), "analyst".to_string(), "viewer".to_string()],
            ..SyncConfig::default()
        };
        assert_eq!(config.read_only_users(), vec!["analyst", "viewer"]);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: SyncConfig =
            serde_json::from_str(r#"{"hostname": "db.internal", "users": ["analyst"]}"#).unwrap();
        assert_eq!(config.hostname, "db.internal");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.namespace, DEFAULT_NAMESPACE);
        assert_eq!(config.users, vec!["analyst".to_string()]);
    }

    #[test]
    fn user_list_parsing_skips_blanks() {
        assert_eq!(
            SyncConfig::parse_user_list(" analyst, ,viewer ,"),
            vec!["analyst".to_string(), "viewer".to_string()]
        );
    }

    #[test]
    fn api_timeout_is_independent_of_statement_timeout() {
        let config: SyncConfig = serde_json::from_str(r#"{"statement_timeout_secs": 900}"#).unwrap();
        assert_eq!(config.statement_timeout(), Duration::from_secs(900));
        assert_eq!(config.api_timeout(), Duration::from_secs(DEFAULT_API_TIMEOUT_SECS));

        let zero = SyncConfig {
            api_timeout_secs: 0,
            ..SyncConfig::default()
        };
        assert!(matches!(zero.validate(), Err(SyncError::Config(_))));
    }

    #[test]
    fn empty_namespace_is_rejected() {
        let config = SyncConfig {
            namespace: "  ".to_string(),
            ..SyncConfig::default()
        };
        assert!(matches!(config.validate(), Err(SyncError::Config(_))));
    }
}
