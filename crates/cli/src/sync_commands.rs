//! One-shot commands: `sync`, `runs`, `stats`.

use {
    anyhow::Result,
    shelfsync_config::ShelfsyncConfig,
    shelfsync_sync::SyncOperation,
};

use crate::app::Engine;

/// Run one manual sync and print the outcome. Returns `false` if the run failed.
pub async fn sync(engine: &Engine) -> Result<bool> {
    match engine.orchestrator.run_sync(SyncOperation::Manual).await {
        Ok(outcome) => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(true)
        },
        Err(e) => {
            eprintln!("{e}");
            Ok(false)
        },
    }
}

pub async fn runs(engine: &Engine, limit: usize) -> Result<()> {
    let runs = engine.store.recent_runs(limit).await?;
    if runs.is_empty() {
        println!("No sync runs recorded.");
        return Ok(());
    }
    for run in &runs {
        let duration = run
            .duration_ms
            .map(|ms| format!("{ms}ms"))
            .unwrap_or_else(|| "-".into());
        print!(
            "{}  {:<9}  {:<9}  items={:<5} {duration}",
            run.id, run.operation, run.status, run.item_count
        );
        match &run.error_message {
            Some(err) => println!("  error: {err}"),
            None => println!(),
        }
    }
    Ok(())
}

pub async fn stats(engine: &Engine, config: &ShelfsyncConfig) -> Result<()> {
    let stats = engine
        .store
        .stats(config.sync.low_stock_threshold)
        .await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
