use common::Watermark;
use std::time::Duration;
use sync_engine::{CycleReport, Replicator, Scheduler};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;

/// Replicate forever until a shutdown signal arrives.
pub async fn run_sync_loop(replicator: Replicator, config: &Config, since: Option<Watermark>) {
    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_shutdown(shutdown.clone()));

    let mut scheduler = Scheduler::new(
        replicator,
        Duration::from_secs(config.sync.interval_secs),
        config.sync.dead_letter_capacity,
        shutdown,
    );

    let watermark = scheduler.run(since).await;
    info!(
        %watermark,
        dead_letters = scheduler.dead_letters().len(),
        "Sync loop finished"
    );
}

/// Run exactly one cycle, for backfills.
pub async fn run_one_shot(replicator: &Replicator, since: Option<Watermark>) -> CycleReport {
    info!("Running a single sync pass");

    let report = replicator.run_once(since).await;

    for (table, failure) in report.failures() {
        warn!(table, key = %failure.key, cause = %failure.cause, "Row not replicated");
    }
    info!(
        fetched = report.fetched(),
        written = report.written(),
        watermark = %report.watermark,
        "Single sync pass complete"
    );

    report
}

async fn wait_for_shutdown(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown requested, finishing current cycle");
    shutdown.cancel();
}
