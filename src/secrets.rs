use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use crate::database::config::app_config_dir;
use crate::error::SyncError;

const SECRETS_FILE_NAME: &str = "secrets.json";

/// Credential storage keyed by namespace and key
///
/// The sync only reads and writes through this trait; how secrets are kept
/// is up to the implementation.
pub trait SecretStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, SyncError>;
    fn set(&mut self, namespace: &str, key: &str, secret: &str) -> Result<(), SyncError>;
}

/// Source of secrets typed in by an operator
pub trait SecretPrompt {
    fn prompt(&mut self, label: &str) -> Result<String, SyncError>;
}

/// In-process store, used by tests and one-off runs
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: HashMap<(String, String), String>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, SyncError> {
        Ok(self
            .secrets
            .get(&(namespace.to_string(), key.to_string()))
            .cloned())
    }

    fn set(&mut self, namespace: &str, key: &str, secret: &str) -> Result<(), SyncError> {
        self.secrets
            .insert((namespace.to_string(), key.to_string()), secret.to_string());
        Ok(())
    }
}

type SecretFile = BTreeMap<String, BTreeMap<String, String>>;

/// JSON file store under the user config directory, readable only by its owner
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    path: PathBuf,
}

impl FileSecretStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Store at `AFDC_SECRETS` if set, otherwise next to the config file
    pub fn open_default() -> Self {
        match std::env::var("AFDC_SECRETS") {
            Ok(path) => Self::new(path),
            Err(_) => Self::new(app_config_dir().join(SECRETS_FILE_NAME)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<SecretFile, SyncError> {
        if !self.path.exists() {
            return Ok(SecretFile::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        serde_json::from_str(&contents)
            .map_err(|e| SyncError::SecretStore(format!("{} is not a valid secret file: {}", self.path.display(), e)))
    }

    fn write_all(&self, secrets: &SecretFile) -> Result<(), SyncError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(secrets)?)?;
        restrict_permissions(&self.path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}

impl SecretStore for FileSecretStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, SyncError> {
        let secrets = self.read_all()?;
        Ok(secrets.get(namespace).and_then(|keys| keys.get(key)).cloned())
    }

    fn set(&mut self, namespace: &str, key: &str, secret: &str) -> Result<(), SyncError> {
        let mut secrets = self.read_all()?;
        secrets
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), secret.to_string());
        self.write_all(&secrets)
    }
}

/// OS credential store: Keychain, Windows Credential Manager or the Linux
/// kernel keyring
///
/// The namespace is the keyring service and the key is the account.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyringSecretStore;

fn keyring_error(e: keyring::Error) -> SyncError {
    SyncError::SecretStore(format!("keyring: {}", e))
}

impl SecretStore for KeyringSecretStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, SyncError> {
        let entry = keyring::Entry::new(namespace, key).map_err(keyring_error)?;
        match entry.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(keyring_error(e)),
        }
    }

    fn set(&mut self, namespace: &str, key: &str, secret: &str) -> Result<(), SyncError> {
        keyring::Entry::new(namespace, key)
            .and_then(|entry| entry.set_password(secret))
            .map_err(keyring_error)
    }
}

/// Asks on the terminal without echoing what is typed
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl SecretPrompt for TerminalPrompt {
    fn prompt(&mut self, label: &str) -> Result<String, SyncError> {
        println!("\n*** Please provide the {} ***", label);
        let secret = rpassword::prompt_password("Enter here: ")?;
        let secret = secret.trim_end_matches(['\r', '\n']).to_string();
        if secret.is_empty() {
            return Err(SyncError::InvalidCredentials(format!("no {} provided", label)));
        }
        Ok(secret)
    }
}
