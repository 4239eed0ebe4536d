use std::fs;
use std::time::Instant;
use anyhow::Context;
use log::{info, warn};
use afdc_station_sync_lib::{
    AfdcClient, FileSecretStore, KeyringSecretStore, SecretStore, StationSync, SyncConfig, SyncReport, TerminalPrompt,
};

async fn run_with<S: SecretStore>(config: SyncConfig, store: S) -> anyhow::Result<SyncReport> {
    let api = AfdcClient::new(config.api_timeout()).context("failed to build HTTP client")?;
    let mut sync = StationSync::new(config, store, TerminalPrompt, api);
    sync.run().await.context("sync aborted")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let start = Instant::now();

    let config = SyncConfig::load().context("failed to load configuration")?;
    info!(
        "Syncing AFDC stations into {} on {}:{}",
        config.database_name(),
        config.hostname,
        config.port
    );

    // AFDC_SECRETS switches to a file store for hosts without an OS keyring
    let report = if std::env::var_os("AFDC_SECRETS").is_some() {
        let store = FileSecretStore::open_default();
        info!("Using secret file {}", store.path().display());
        run_with(config, store).await?
    } else {
        run_with(config, KeyringSecretStore).await?
    };

    for table in &report.tables {
        info!(
            "{}: {} attempted, {} inserted, {} failed",
            table.table, table.attempted, table.inserted, table.failed
        );
    }

    if report.total_failed() > 0 {
        warn!("{} rows could not be inserted", report.total_failed());
        if let Ok(path) = std::env::var("AFDC_FAILURES_FILE") {
            fs::write(&path, serde_json::to_string_pretty(&report.failures)?)
                .with_context(|| format!("failed to write failures to {}", path))?;
            info!("Wrote failed rows to {}", path);
        }
    }

    info!("The sync took {:.1?} to finish", start.elapsed());
    Ok(())
}
