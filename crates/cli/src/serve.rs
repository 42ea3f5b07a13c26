//! Long-running mode: standing jobs plus a JSON-lines control loop on stdin.

use std::sync::Arc;

use {
    anyhow::Result,
    shelfsync_config::ShelfsyncConfig,
    shelfsync_cron::{Control, JobScheduler, standing_jobs},
    tokio::io::BufReader,
    tracing::info,
};

use crate::app::Engine;

pub async fn serve(engine: Engine, config: &ShelfsyncConfig) -> Result<()> {
    let jobs = standing_jobs(Arc::clone(&engine.orchestrator), config)?;
    let scheduler = JobScheduler::new(jobs);
    scheduler.start().await;

    let control = Arc::new(Control::new(
        Arc::clone(&scheduler),
        Arc::clone(&engine.orchestrator),
        config.sync.low_stock_threshold,
    ));
    info!(
        jobs = scheduler.definitions().len(),
        "serving; reading control requests from stdin"
    );

    let requests = control.serve_lines(BufReader::new(tokio::io::stdin()), tokio::io::stdout());
    tokio::select! {
        served = requests => {
            served?;
            // Keep running on the schedule alone.
            info!("stdin closed, control loop disabled");
            tokio::signal::ctrl_c().await?;
            info!("shutdown requested");
        },
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("shutdown requested");
        },
    }

    scheduler.stop().await;
    Ok(())
}
