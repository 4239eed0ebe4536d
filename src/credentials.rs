use log::{info, warn};
use crate::afdc_api::AfdcClient;
use crate::database::{acquire, ConnectionDescriptor, SyncConfig};
use crate::error::SyncError;
use crate::secrets::{SecretPrompt, SecretStore};

/// Secret store key of a database user's password
pub fn password_key(username: &str) -> String {
    format!("{}_password", username)
}

/// Open and close a server-level connection with the given password
pub async fn test_database_password(config: &SyncConfig, username: &str, password: &str) -> Result<(), SyncError> {
    let conn = acquire(&ConnectionDescriptor::server(config, username, password)).await?;
    drop(conn);
    Ok(())
}

/// Resolve and validate a database user's password
///
/// The stored password is tested first. If it is missing or rejected the
/// operator is prompted once; the new password is written to the store only
/// after it connects successfully.
pub async fn resolve_database_password<S, P>(
    store: &mut S,
    prompt: &mut P,
    config: &SyncConfig,
    username: &str,
) -> Result<String, SyncError>
where
    S: SecretStore,
    P: SecretPrompt,
{
    let key = password_key(username);

    if let Some(password) = store.get(&config.namespace, &key)? {
        match test_database_password(config, username, &password).await {
            Ok(()) => {
                info!("Stored password for database user {} validated", username);
                return Ok(password);
            }
            Err(e) if e.is_connectivity() => warn!("Stored password for database user {} failed: {}", username, e),
            Err(e) => return Err(e),
        }
    }

    let password = prompt.prompt(&format!("password for the Postgres database server - {} user", username))?;
    info!("Testing password provided for {}", username);
    match test_database_password(config, username, &password).await {
        Ok(()) => {
            info!("Password for {} validated", username);
            store.set(&config.namespace, &key, &password)?;
            Ok(password)
        }
        Err(e) if e.is_connectivity() => Err(SyncError::InvalidCredentials(format!(
            "database user {}: {}",
            username, e
        ))),
        Err(e) => Err(e),
    }
}

/// Resolve and validate the AFDC API key, following the same rules
pub async fn resolve_api_key<S, P>(
    store: &mut S,
    prompt: &mut P,
    config: &SyncConfig,
    client: &AfdcClient,
) -> Result<String, SyncError>
where
    S: SecretStore,
    P: SecretPrompt,
{
    let namespace = config.api_key_namespace();

    if let Some(api_key) = store.get(&namespace, &config.api_name)? {
        if client.test_api_key(&api_key).await? {
            info!("Stored API key validated");
            return Ok(api_key);
        }
        warn!("Stored API key was rejected");
    }

    let api_key = prompt.prompt("API key for the AFDC API")?;
    info!("Testing API key provided");
    if client.test_api_key(&api_key).await? {
        info!("API key validated");
        store.set(&namespace, &config.api_name, &api_key)?;
        Ok(api_key)
    } else {
        Err(SyncError::InvalidCredentials("AFDC API key".to_string()))
    }
}
