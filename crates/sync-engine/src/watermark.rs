use common::Watermark;
use futures::future::join_all;
use tracing::{info, warn};

use crate::{DocumentStore, TableMapping};

/// Find the point replication should resume from.
///
/// Looks up the newest document of every mapped collection concurrently and
/// returns the maximum. A failed lookup counts as an empty collection, so an
/// unavailable collection never blocks the others. Returns an absent
/// watermark when nothing has been replicated yet.
pub async fn resolve_watermark(store: &dyn DocumentStore, mappings: &[TableMapping]) -> Watermark {
    let lookups = mappings.iter().map(|mapping| async move {
        match store.latest_created_at(mapping.collection).await {
            Ok(latest) => latest,
            Err(e) => {
                warn!(
                    collection = mapping.collection,
                    error = %e,
                    "Watermark lookup failed, treating collection as empty"
                );
                None
            }
        }
    });

    let mut watermark = Watermark::absent();
    for latest in join_all(lookups).await.into_iter().flatten() {
        watermark.observe(latest);
    }

    if watermark.is_absent() {
        info!("No data replicated yet, starting from scratch");
    } else {
        info!(%watermark, "Resuming replication");
    }

    watermark
}
