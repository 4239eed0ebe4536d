use log::info;
use crate::afdc_api::AfdcClient;
use crate::credentials::{resolve_api_key, resolve_database_password};
use crate::database::{DatabaseManager, DatabaseSetupResult, SyncConfig, SyncReport, TableId, TableLoadSummary};
use crate::error::SyncError;
use crate::secrets::{SecretPrompt, SecretStore};
use crate::station_extract::extract;

/// One end-to-end run: provision the store, fetch the feed, load it
///
/// Phases run strictly one after another. Connectivity, schema and grant
/// failures abort the run; rows that fail to insert are collected in the
/// report and the run continues.
pub struct StationSync<S: SecretStore, P: SecretPrompt> {
    config: SyncConfig,
    store: S,
    prompt: P,
    api: AfdcClient,
}

impl<S: SecretStore, P: SecretPrompt> StationSync<S, P> {
    pub fn new(config: SyncConfig, store: S, prompt: P, api: AfdcClient) -> Self {
        Self {
            config,
            store,
            prompt,
            api,
        }
    }

    /// Resolve the admin password and provision database, tables and users
    pub async fn provision(&mut self) -> Result<(DatabaseManager, DatabaseSetupResult), SyncError> {
        let admin_user = self.config.admin_user.clone();
        let admin_password =
            resolve_database_password(&mut self.store, &mut self.prompt, &self.config, &admin_user).await?;

        let db = DatabaseManager::new(self.config.clone(), admin_password);
        let database = db.database();

        let database_created = db.ensure_database(&database).await?;
        let tables_created = db.ensure_tables(&TableId::ALL).await?;
        let users_provisioned = db.provision_read_only_users().await?;

        let setup = DatabaseSetupResult {
            database,
            database_created,
            tables_created,
            users_provisioned,
        };
        Ok((db, setup))
    }

    pub async fn run(&mut self) -> Result<SyncReport, SyncError> {
        let (db, setup) = self.provision().await?;
        db.truncate_all(&TableId::ALL).await?;

        let api_key = resolve_api_key(&mut self.store, &mut self.prompt, &self.config, &self.api).await?;
        let feed = self.api.fetch_all(&api_key).await;
        let extracted = extract(&feed);

        let mut tables = Vec::new();
        let mut failures = Vec::new();
        for (table, rows) in [(TableId::Station, &extracted.stations), (TableId::Evse, &extracted.evse)] {
            info!("Loading {} rows into {}", rows.len(), table);
            let failed = db.load(table, rows).await?;
            tables.push(TableLoadSummary {
                table: table.name().to_string(),
                attempted: failed.attempted,
                inserted: failed.inserted(),
                failed: failed.len(),
            });
            if !failed.is_empty() {
                failures.push(failed);
            }
        }

        Ok(SyncReport {
            setup,
            states_fetched: feed.len(),
            tables,
            failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;
    use super::*;
    use crate::secrets::MemorySecretStore;

    struct NoAnswer;

    impl SecretPrompt for NoAnswer {
        fn prompt(&mut self, label: &str) -> Result<String, SyncError> {
            Err(SyncError::SecretStore(format!("no answer for {}", label)))
        }
    }

    #[tokio::test]
    async fn unreachable_server_aborts_before_any_fetch() {
        let config = SyncConfig {
            hostname: "127.0.0.1".to_string(),
            port: 1,
            connect_timeout_secs: 5,
            ..SyncConfig::default()
        };
        let api = AfdcClient::new(Duration::from_secs(1))
            .unwrap()
            .with_base_url("http://127.0.0.1:1/unused");
        let mut store = MemorySecretStore::new();
        store.set(&config.namespace, "postgres_password", "secret").unwrap();

        let mut sync = StationSync::new(config, store, NoAnswer, api);
        let result = sync.run().await;

        assert!(matches!(result, Err(SyncError::SecretStore(_))));
    }
}
