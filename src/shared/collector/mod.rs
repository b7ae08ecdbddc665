//! Collection run orchestration.
//!
//! Targets are visited strictly in configuration order and, for each target,
//! entity collectors run one after the other. Nothing is spawned: a slow
//! controller delays the rest of the run.

use crate::shared::config::Target;
use crate::shared::error::{CollectionError, StorageError};
use crate::shared::point::CollectionBatch;
use crate::shared::storage::{publish_batches, PublishSummary};
use crate::shared::traits::{
    BatchPublisher, Clock, CollectionContext, EntityCollector, RemoteExecutor, RemoteSession,
    TimestampPolicy,
};
use log::{error, info, warn};

pub struct RunCollector<'a> {
    executor: &'a dyn RemoteExecutor,
    clock: &'a dyn Clock,
    collectors: Vec<Box<dyn EntityCollector>>,
}

impl<'a> RunCollector<'a> {
    pub fn new(executor: &'a dyn RemoteExecutor, clock: &'a dyn Clock) -> Self {
        Self {
            executor,
            clock,
            collectors: Vec::new(),
        }
    }

    /// Collectors run in registration order.
    pub fn with_collector(mut self, collector: Box<dyn EntityCollector>) -> Self {
        self.collectors.push(collector);
        self
    }

    pub fn with_collectors(mut self, collectors: Vec<Box<dyn EntityCollector>>) -> Self {
        self.collectors.extend(collectors);
        self
    }

    /// Policy for a whole run: `fixed` captures the clock once, here.
    pub fn timestamp_policy(&self, fixed: bool) -> TimestampPolicy {
        if fixed {
            TimestampPolicy::Fixed(self.clock.now_millis())
        } else {
            TimestampPolicy::PerCommand
        }
    }

    /// Collects every target, one batch per target, in input order.
    pub async fn collect_run(&self, targets: &[Target], fixed: bool) -> Vec<CollectionBatch> {
        let policy = self.timestamp_policy(fixed);
        let mut batches = Vec::with_capacity(targets.len());
        for target in targets {
            batches.push(self.collect(target, policy).await);
        }
        batches
    }

    /// A connection failure yields an empty, aborted batch for this target only.
    pub async fn collect(&self, target: &Target, policy: TimestampPolicy) -> CollectionBatch {
        info!("Collecting {} ({})", target.name, target.address);

        match self.collect_points(target, policy).await {
            Ok(batch) => {
                info!("Collected {} points from {}", batch.len(), target.name);
                batch
            }
            Err(e) => {
                error!("Aborting collection of {}: {}", target.name, e);
                CollectionBatch::aborted(target.name.clone())
            }
        }
    }

    async fn collect_points(
        &self,
        target: &Target,
        policy: TimestampPolicy,
    ) -> Result<CollectionBatch, CollectionError> {
        let mut session = self
            .executor
            .connect(target)
            .await
            .map_err(|e| CollectionError::from_exec(&target.name, e))?;
        let ctx = CollectionContext::new(target, policy, self.clock);

        let mut batch = CollectionBatch::new(target.name.clone());
        for collector in &self.collectors {
            let points = collector.collect(session.as_mut(), &ctx).await?;
            info!("{}: {} {} points", target.name, points.len(), collector.name());
            batch.points.extend(points);
        }
        Ok(batch)
    }
}

/// One complete run: every target is collected before anything is written,
/// so the database receives the run as a single snapshot.
///
/// Only a failure to prepare the database is returned; failed target writes
/// are reported in the summary.
pub async fn collect_and_publish(
    collector: &RunCollector<'_>,
    publisher: &dyn BatchPublisher,
    database: &str,
    targets: &[Target],
    fixed: bool,
) -> Result<PublishSummary, StorageError> {
    let batches = collector.collect_run(targets, fixed).await;
    let total: usize = batches.iter().map(CollectionBatch::len).sum();
    info!("Collected {} points from {} targets", total, batches.len());

    publisher.ensure_database(database).await?;
    Ok(publish_batches(publisher, database, &batches).await)
}

/// Runs one command, turning command-scoped failures into `None`.
///
/// Connection-level failures are returned so the caller can abandon the
/// target.
pub async fn run_command(
    session: &mut dyn RemoteSession,
    target: &str,
    command: &str,
) -> Result<Option<String>, CollectionError> {
    match session.exec(command).await {
        Ok(output) => Ok(Some(output)),
        Err(e) if e.is_connection_level() => Err(CollectionError::from_exec(target, e)),
        Err(e) => {
            warn!("Skipping `{}` on {}: {}", command, target, e);
            Ok(None)
        }
    }
}
