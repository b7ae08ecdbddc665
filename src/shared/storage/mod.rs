mod influxdb_storage;

pub use influxdb_storage::{encode_batch, encode_point, InfluxDbStorage};

use crate::shared::point::CollectionBatch;
use crate::shared::traits::BatchPublisher;
use log::{error, warn};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishSummary {
    pub published: usize,
    pub failed: Vec<String>,
    /// Targets whose collection was abandoned; nothing was written for them.
    pub unreachable: Vec<String>,
}

impl PublishSummary {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.unreachable.is_empty()
    }
}

/// Publishes batches in order; a failed target does not stop the others.
pub async fn publish_batches(
    publisher: &dyn BatchPublisher,
    database: &str,
    batches: &[CollectionBatch],
) -> PublishSummary {
    let mut summary = PublishSummary::default();
    for batch in batches {
        if batch.aborted {
            warn!("Nothing to store for {}: collection was aborted", batch.target);
            summary.unreachable.push(batch.target.clone());
            continue;
        }
        match publisher.publish(database, batch).await {
            Ok(()) => summary.published += 1,
            Err(e) => {
                error!("Failed to store points of {}: {}", batch.target, e);
                summary.failed.push(batch.target.clone());
            }
        }
    }
    summary
}
