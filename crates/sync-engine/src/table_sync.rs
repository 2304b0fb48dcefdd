use chrono::{DateTime, Utc};
use common::Watermark;
use futures::stream::{self, StreamExt};
use schema::{validate_rows, RowViolation, ValidatedRow};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{DocumentStore, RelationalSource, TableMapping};

/// Upper bound on inserts in flight for one table.
pub const MAX_CONCURRENT_WRITES: usize = 64;

/// Table-level failure. Either kind leaves the watermark untouched for the table.
#[derive(Error, Debug)]
pub enum TableSyncError {
    #[error("failed to fetch rows for {table}: {source}")]
    Fetch {
        table: &'static str,
        source: common::Error,
    },

    #[error("{} fetched rows of {table} do not match the expected shape", violations.len())]
    Validation {
        table: &'static str,
        violations: Vec<RowViolation>,
    },
}

/// Write attempt for one fetched row.
#[derive(Debug)]
pub struct RowWrite {
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub result: common::Result<()>,
}

#[derive(Debug)]
pub enum TableSync {
    /// Nothing newer than the watermark.
    Empty,
    /// One entry per fetched row, whether or not its write succeeded.
    Synced(Vec<RowWrite>),
}

/// Replicate the rows of one table created after `watermark`.
///
/// The whole result set is validated before anything is written. Rows are
/// then inserted concurrently, at most [`MAX_CONCURRENT_WRITES`] at a time,
/// and each write failure stays with its row.
pub async fn sync_table(
    source: &dyn RelationalSource,
    store: &dyn DocumentStore,
    mapping: &TableMapping,
    watermark: Watermark,
) -> Result<TableSync, TableSyncError> {
    let raw_rows = source
        .fetch_rows(mapping.table, watermark)
        .await
        .map_err(|source| TableSyncError::Fetch {
            table: mapping.name,
            source,
        })?;

    let rows = validate_rows(mapping.validate, mapping.key_fields, &raw_rows).map_err(
        |violations| TableSyncError::Validation {
            table: mapping.name,
            violations,
        },
    )?;

    let (rows, stale): (Vec<ValidatedRow>, Vec<ValidatedRow>) = rows
        .into_iter()
        .partition(|row| watermark.admits(row.created_at));
    if !stale.is_empty() {
        warn!(
            table = mapping.name,
            count = stale.len(),
            %watermark,
            "Source returned rows at or before the watermark, skipping them"
        );
    }

    if rows.is_empty() {
        info!(table = mapping.name, "No new rows, skipping");
        return Ok(TableSync::Empty);
    }

    info!(table = mapping.name, fetched = rows.len(), "Retrieved rows from source");

    let writes: Vec<RowWrite> = stream::iter(rows.into_iter().map(|row| async move {
        let ValidatedRow {
            key,
            created_at,
            document,
        } = row;
        let result = store.insert_one(mapping.collection, document).await;
        RowWrite {
            key,
            created_at,
            result,
        }
    }))
    .buffer_unordered(MAX_CONCURRENT_WRITES)
    .collect()
    .await;

    let mut written = 0;
    for write in &writes {
        match &write.result {
            Ok(()) => written += 1,
            Err(e) => error!(
                table = mapping.name,
                key = %write.key,
                duplicate = e.is_duplicate_key(),
                error = %e,
                "Failed to save row to destination"
            ),
        }
    }

    info!(table = mapping.name, written, "Saved rows to destination");

    Ok(TableSync::Synced(writes))
}
