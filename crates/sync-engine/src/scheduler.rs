use common::Watermark;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{metrics, DeadLetterLog, Replicator};

/// Perpetual replication loop: seed, cycle, sleep, repeat.
///
/// Owns the watermark; each cycle receives a copy and cycles never overlap.
pub struct Scheduler {
    replicator: Replicator,
    interval: Duration,
    shutdown: CancellationToken,
    dead_letters: DeadLetterLog,
}

impl Scheduler {
    pub fn new(
        replicator: Replicator,
        interval: Duration,
        dead_letter_capacity: usize,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            replicator,
            interval,
            shutdown,
            dead_letters: DeadLetterLog::new(dead_letter_capacity),
        }
    }

    pub fn dead_letters(&self) -> &DeadLetterLog {
        &self.dead_letters
    }

    /// Run until shutdown is requested and return the last computed watermark.
    ///
    /// Without an initial watermark the resolver seeds it from the
    /// destination. A cycle that aborts keeps the previous watermark.
    pub async fn run(&mut self, initial: Option<Watermark>) -> Watermark {
        info!("Starting sync scheduler");

        let mut watermark = match initial {
            Some(watermark) => {
                info!(%watermark, "Using supplied watermark");
                watermark
            }
            None => self.replicator.resolve_watermark().await,
        };

        while !self.shutdown.is_cancelled() {
            match self.replicator.run_cycle_isolated(watermark).await {
                Ok(report) => {
                    let added = self.dead_letters.record(&report);
                    if added > 0 {
                        warn!(
                            added,
                            total = self.dead_letters.len(),
                            evicted = self.dead_letters.evicted(),
                            "Rows moved to the dead-letter log"
                        );
                    }
                    metrics::set_dead_letters(self.dead_letters.len());
                    watermark = report.watermark;
                }
                Err(e) => {
                    metrics::record_aborted_cycle();
                    error!(error = %e, %watermark, "Sync cycle failed, keeping previous watermark");
                }
            }

            info!(secs = self.interval.as_secs_f64(), "Sleeping");
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!(%watermark, "Sync scheduler stopped");
        watermark
    }
}
