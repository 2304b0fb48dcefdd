use chrono::{DateTime, Utc};
use common::Watermark;
use futures::future::join_all;
use schema::RowViolation;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::{
    metrics, resolve_watermark, sync_table, DocumentStore, RelationalSource, TableMapping,
    TableSync, TableSyncError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableStatus {
    Empty,
    Synced,
    FetchFailed(String),
    ValidationFailed(Vec<RowViolation>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    pub key: String,
    pub cause: String,
}

/// Result of one table within a cycle. Logged, never persisted.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub table: &'static str,
    pub status: TableStatus,
    pub fetched: usize,
    pub written: usize,
    pub failures: Vec<WriteFailure>,
    /// Newest `created_at` among fetched rows, written or not.
    pub newest: Option<DateTime<Utc>>,
}

impl SyncOutcome {
    fn from_result(mapping: &TableMapping, result: Result<TableSync, TableSyncError>) -> Self {
        let mut outcome = SyncOutcome {
            table: mapping.name,
            status: TableStatus::Empty,
            fetched: 0,
            written: 0,
            failures: Vec::new(),
            newest: None,
        };

        match result {
            Ok(TableSync::Empty) => {}
            Ok(TableSync::Synced(writes)) => {
                outcome.status = TableStatus::Synced;
                outcome.fetched = writes.len();
                for write in writes {
                    if outcome.newest.map_or(true, |newest| write.created_at > newest) {
                        outcome.newest = Some(write.created_at);
                    }
                    match write.result {
                        Ok(()) => outcome.written += 1,
                        Err(e) => outcome.failures.push(WriteFailure {
                            key: write.key,
                            cause: e.to_string(),
                        }),
                    }
                }
            }
            Err(TableSyncError::Fetch { source, .. }) => {
                error!(table = mapping.name, error = %source, "Failed to fetch rows");
                outcome.status = TableStatus::FetchFailed(source.to_string());
            }
            Err(TableSyncError::Validation { violations, .. }) => {
                error!(
                    table = mapping.name,
                    count = violations.len(),
                    "Fetched rows do not match the expected shape, skipping table"
                );
                for violation in &violations {
                    error!(
                        table = mapping.name,
                        row = violation.index,
                        key = %violation.key,
                        "  {}",
                        violation.message
                    );
                }
                outcome.status = TableStatus::ValidationFailed(violations);
            }
        }

        outcome
    }

    fn record_metrics(&self) {
        metrics::record_rows_fetched(self.table, self.fetched);
        metrics::record_rows_written(self.table, self.written);
        metrics::record_write_failures(self.table, self.failures.len());
        match self.status {
            TableStatus::FetchFailed(_) => metrics::record_table_error(self.table, "fetch"),
            TableStatus::ValidationFailed(_) => {
                metrics::record_table_error(self.table, "validation")
            }
            TableStatus::Empty | TableStatus::Synced => {}
        }
    }
}

/// Summary of one full pass over every mapping.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub started_from: Watermark,
    pub watermark: Watermark,
    pub outcomes: Vec<SyncOutcome>,
    pub duration: Duration,
}

impl CycleReport {
    pub fn fetched(&self) -> usize {
        self.outcomes.iter().map(|o| o.fetched).sum()
    }

    pub fn written(&self) -> usize {
        self.outcomes.iter().map(|o| o.written).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&'static str, &WriteFailure)> {
        self.outcomes
            .iter()
            .flat_map(|o| o.failures.iter().map(move |f| (o.table, f)))
    }

    pub fn outcome(&self, table: &str) -> Option<&SyncOutcome> {
        self.outcomes.iter().find(|o| o.table == table)
    }
}

/// Run every table sync concurrently and compute the next watermark.
///
/// Table failures never cancel sibling tables. The next watermark is the
/// maximum of `watermark` and every fetched row's `created_at`.
pub async fn run_cycle(
    source: &dyn RelationalSource,
    store: &dyn DocumentStore,
    mappings: &[TableMapping],
    watermark: Watermark,
) -> CycleReport {
    let cycle_id = Uuid::new_v4();
    let span = info_span!("sync_cycle", %cycle_id);

    async move {
        let started = Instant::now();
        info!(%watermark, tables = mappings.len(), "Starting sync cycle");

        let results = join_all(mappings.iter().map(|mapping| async move {
            let result = sync_table(source, store, mapping, watermark).await;
            SyncOutcome::from_result(mapping, result)
        }))
        .await;

        let mut next = watermark;
        for outcome in &results {
            if let Some(newest) = outcome.newest {
                next.observe(newest);
            }
            outcome.record_metrics();
        }

        let report = CycleReport {
            cycle_id,
            started_from: watermark,
            watermark: next,
            outcomes: results,
            duration: started.elapsed(),
        };

        metrics::record_cycle(report.duration.as_secs_f64(), report.watermark);
        info!(
            fetched = report.fetched(),
            written = report.written(),
            failed = report.failures().count(),
            watermark = %report.watermark,
            elapsed_ms = report.duration.as_millis() as u64,
            "Sync cycle complete"
        );

        report
    }
    .instrument(span)
    .await
}

/// Shared handle on both stores and the mapping list.
#[derive(Clone)]
pub struct Replicator {
    source: Arc<dyn RelationalSource>,
    store: Arc<dyn DocumentStore>,
    mappings: Arc<[TableMapping]>,
}

impl Replicator {
    pub fn new(
        source: Arc<dyn RelationalSource>,
        store: Arc<dyn DocumentStore>,
        mappings: impl Into<Arc<[TableMapping]>>,
    ) -> Self {
        Self {
            source,
            store,
            mappings: mappings.into(),
        }
    }

    pub fn mappings(&self) -> &[TableMapping] {
        &self.mappings
    }

    pub async fn resolve_watermark(&self) -> Watermark {
        resolve_watermark(self.store.as_ref(), &self.mappings).await
    }

    pub async fn run_cycle(&self, watermark: Watermark) -> CycleReport {
        run_cycle(
            self.source.as_ref(),
            self.store.as_ref(),
            &self.mappings,
            watermark,
        )
        .await
    }

    /// Run a cycle on its own task so a panic anywhere inside it surfaces as
    /// an error instead of unwinding through the caller.
    pub async fn run_cycle_isolated(&self, watermark: Watermark) -> common::Result<CycleReport> {
        let replicator = self.clone();
        tokio::spawn(async move { replicator.run_cycle(watermark).await })
            .await
            .map_err(|e| common::Error::Internal(format!("sync cycle aborted: {}", e)))
    }

    /// One-shot pass: seed the watermark if none is given, then run a single cycle.
    pub async fn run_once(&self, watermark: Option<Watermark>) -> CycleReport {
        let watermark = match watermark {
            Some(watermark) => watermark,
            None => self.resolve_watermark().await,
        };
        self.run_cycle(watermark).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{opening_row, ts, ts_millis, user_row, MemorySource, MemoryStore};
    use crate::MAPPINGS;

    fn replicator(source: MemorySource, store: MemoryStore) -> (Replicator, Arc<MemorySource>, Arc<MemoryStore>) {
        let source = Arc::new(source);
        let store = Arc::new(store);
        let replicator = Replicator::new(source.clone(), store.clone(), MAPPINGS);
        (replicator, source, store)
    }

    #[tokio::test]
    async fn test_absent_watermark_replicates_all_users() {
        let (replicator, _, store) = replicator(
            MemorySource::new().with_rows(
                "user",
                vec![user_row("a", ts(1)), user_row("b", ts(2)), user_row("c", ts(3))],
            ),
            MemoryStore::new(),
        );

        let report = replicator.run_cycle(Watermark::absent()).await;

        assert_eq!(store.count("user"), 3);
        assert_eq!(report.watermark, Watermark::at(ts(3)));
        assert_eq!(report.outcome("user").unwrap().written, 3);
        assert_eq!(report.outcome("game").unwrap().status, TableStatus::Empty);
    }

    #[tokio::test]
    async fn test_only_rows_past_watermark_are_fetched() {
        let (replicator, _, store) = replicator(
            MemorySource::new().with_rows(
                "user",
                vec![
                    user_row("a", ts(1)),
                    user_row("b", ts_millis(2, 700)),
                    user_row("c", ts(3)),
                ],
            ),
            MemoryStore::new(),
        );

        let report = replicator.run_cycle(Watermark::at(ts_millis(2, 100))).await;

        let users = report.outcome("user").unwrap();
        assert_eq!(users.fetched, 1);
        assert_eq!(store.count("user"), 1);
        assert_eq!(report.watermark, Watermark::at(ts(3)));
    }

    #[tokio::test]
    async fn test_write_conflict_still_advances_watermark() {
        let store = MemoryStore::new().with_unique("user", &["id"]);
        store.seed("user", user_row("b", ts(0)));
        let (replicator, _, store) = replicator(
            MemorySource::new().with_rows("user", vec![user_row("a", ts(4)), user_row("b", ts(5))]),
            store,
        );

        let report = replicator.run_cycle(Watermark::at(ts(0))).await;

        let users = report.outcome("user").unwrap();
        assert_eq!(users.fetched, 2);
        assert_eq!(users.written, 1);
        assert_eq!(users.failures.len(), 1);
        assert_eq!(users.failures[0].key, "b");
        assert_eq!(store.inserts(), 1);
        assert_eq!(report.watermark, Watermark::at(ts(5)));
    }

    #[tokio::test]
    async fn test_failing_table_does_not_block_others() {
        let (replicator, _, store) = replicator(
            MemorySource::new()
                .with_rows("user", vec![user_row("a", ts(9))])
                .with_rows("game_opening", vec![opening_row("C20", "King's Pawn", ts(4))])
                .failing("game"),
            MemoryStore::new(),
        );

        let report = replicator.run_cycle(Watermark::absent()).await;

        assert!(matches!(
            report.outcome("game").unwrap().status,
            TableStatus::FetchFailed(_)
        ));
        assert_eq!(store.count("user"), 1);
        assert_eq!(store.count("game_opening"), 1);
        assert_eq!(report.watermark, Watermark::at(ts(9)));
    }

    #[tokio::test]
    async fn test_validation_failure_contributes_nothing() {
        let mut drifted = user_row("late", ts(50));
        drifted["extra"] = serde_json::json!(true);
        let (replicator, _, store) = replicator(
            MemorySource::new()
                .with_rows("user", vec![drifted])
                .with_rows("game_opening", vec![opening_row("B00", "Nimzowitsch", ts(7))]),
            MemoryStore::new(),
        );

        let report = replicator.run_cycle(Watermark::absent()).await;

        assert!(matches!(
            report.outcome("user").unwrap().status,
            TableStatus::ValidationFailed(ref v) if v.len() == 1
        ));
        assert_eq!(store.count("user"), 0);
        assert_eq!(report.watermark, Watermark::at(ts(7)));
    }

    #[tokio::test]
    async fn test_watermark_unchanged_when_nothing_fetched() {
        let (replicator, _, _) = replicator(MemorySource::new(), MemoryStore::new());

        let report = replicator.run_cycle(Watermark::at(ts(42))).await;

        assert_eq!(report.fetched(), 0);
        assert_eq!(report.watermark, Watermark::at(ts(42)));
        assert_eq!(report.started_from, Watermark::at(ts(42)));
    }

    #[tokio::test]
    async fn test_second_cycle_without_new_rows_writes_nothing() {
        let (replicator, _, store) = replicator(
            MemorySource::new()
                .with_rows("user", vec![user_row("a", ts(1)), user_row("b", ts(2))]),
            MemoryStore::new(),
        );

        let first = replicator.run_cycle(Watermark::absent()).await;
        let second = replicator.run_cycle(first.watermark).await;

        assert_eq!(store.inserts(), 2);
        assert_eq!(second.written(), 0);
        assert_eq!(second.watermark, first.watermark);
    }

    #[tokio::test]
    async fn test_watermark_is_monotonic_across_cycles() {
        let (replicator, source, _) = replicator(
            MemorySource::new().with_rows("user", vec![user_row("a", ts(10))]),
            MemoryStore::new(),
        );

        let mut watermark = Watermark::absent();
        for step in 0..4 {
            // A late row older than the watermark must not pull it back.
            source.push("user", user_row(&format!("old-{}", step), ts(step)));
            source.push("user", user_row(&format!("new-{}", step), ts(20 + step)));

            let report = replicator.run_cycle(watermark).await;
            assert!(report.watermark >= watermark);
            assert_eq!(report.watermark > watermark, report.fetched() > 0);
            watermark = report.watermark;
        }
        assert_eq!(watermark, Watermark::at(ts(23)));
    }

    #[tokio::test]
    async fn test_run_once_seeds_from_empty_store() {
        let (replicator, _, store) = replicator(
            MemorySource::new()
                .with_rows("user", vec![user_row("a", ts(1))])
                .with_rows("game_opening", vec![opening_row("A00", "Polish", ts(2))]),
            MemoryStore::new(),
        );

        let report = replicator.run_once(None).await;

        assert!(report.started_from.is_absent());
        assert_eq!(store.count("user"), 1);
        assert_eq!(store.count("game_opening"), 1);
        assert_eq!(report.watermark, Watermark::at(ts(2)));
    }

    #[tokio::test]
    async fn test_run_once_resumes_from_store_contents() {
        let store = MemoryStore::new().failing_lookup("game");
        store.seed("user", user_row("a", ts(5)));
        let (replicator, _, store) = replicator(
            MemorySource::new()
                .with_rows("user", vec![user_row("a", ts(5)), user_row("b", ts(6))]),
            store,
        );

        let report = replicator.run_once(None).await;

        assert_eq!(report.started_from, Watermark::at(ts(5)));
        assert_eq!(store.inserts(), 1);
    }

    #[tokio::test]
    async fn test_isolated_cycle_reports_panics() {
        let (replicator, _, _) =
            replicator(MemorySource::new().panicking_for(1), MemoryStore::new());

        let result = replicator.run_cycle_isolated(Watermark::absent()).await;

        assert!(result.is_err());
    }
}
