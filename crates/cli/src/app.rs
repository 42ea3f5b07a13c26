//! Builds the engine from config: catalog client, store, notifier, orchestrator.

use std::sync::Arc;

use {
    anyhow::Context,
    shelfsync_catalog::HttpCatalog,
    shelfsync_config::ShelfsyncConfig,
    shelfsync_sync::{
        LedgerNotifier, NoopNotifier, Notifier, OrchestratorOptions, SqliteSyncStore,
        SyncOrchestrator, SyncStore,
    },
    tracing::{debug, warn},
};

pub struct Engine {
    pub store: Arc<dyn SyncStore>,
    pub orchestrator: Arc<SyncOrchestrator>,
}

pub async fn build(config: &ShelfsyncConfig) -> anyhow::Result<Engine> {
    if !config.catalog.has_credentials() {
        warn!("catalog credentials are not configured; sync runs will fail");
    }
    let catalog = HttpCatalog::from_config(&config.catalog)?;

    debug!(url = %config.database.url, "opening database");
    let store: Arc<dyn SyncStore> = Arc::new(
        SqliteSyncStore::new(&config.database.url)
            .await
            .with_context(|| format!("failed to open database {}", config.database.url))?,
    );

    let notifier: Arc<dyn Notifier> = if config.sync.notifications {
        Arc::new(LedgerNotifier::logging(Arc::clone(&store)))
    } else {
        Arc::new(NoopNotifier)
    };

    let orchestrator = SyncOrchestrator::new(
        Arc::new(catalog),
        Arc::clone(&store),
        notifier,
        OrchestratorOptions {
            exclusive_runs: config.sync.exclusive_runs,
            notify: config.sync.notifications,
        },
    );

    Ok(Engine {
        store,
        orchestrator,
    })
}
