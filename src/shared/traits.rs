use async_trait::async_trait;
use chrono::Utc;
use crate::shared::config::Target;
use crate::shared::error::{CollectionError, ExecError, StorageError};
use crate::shared::point::{CollectionBatch, Point, TagSet, Timestamp};

/// Opens command sessions on storage controllers.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn connect(&self, target: &Target) -> Result<Box<dyn RemoteSession>, ExecError>;
}

#[async_trait]
pub trait RemoteSession: Send {
    /// Runs one CLI command and returns its standard output.
    async fn exec(&mut self, command: &str) -> Result<String, ExecError>;
}

#[async_trait]
pub trait BatchPublisher: Send + Sync {
    /// Creates the database when it does not exist yet.
    async fn ensure_database(&self, database: &str) -> Result<(), StorageError>;
    async fn publish(&self, database: &str, batch: &CollectionBatch) -> Result<(), StorageError>;
}

pub trait Clock: Send + Sync {
    fn now_millis(&self) -> Timestamp;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> Timestamp {
        Utc::now().timestamp_millis()
    }
}

/// When points get their timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampPolicy {
    /// One capture shared by every point of the run.
    Fixed(Timestamp),
    /// A fresh capture right after each command returns.
    PerCommand,
}

/// What entity collectors need besides the session.
pub struct CollectionContext<'a> {
    pub target: &'a Target,
    pub target_tags: TagSet,
    pub policy: TimestampPolicy,
    pub clock: &'a dyn Clock,
}

impl<'a> CollectionContext<'a> {
    pub fn new(target: &'a Target, policy: TimestampPolicy, clock: &'a dyn Clock) -> Self {
        Self {
            target,
            target_tags: target.tags(),
            policy,
            clock,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        match self.policy {
            TimestampPolicy::Fixed(timestamp) => timestamp,
            TimestampPolicy::PerCommand => self.clock.now_millis(),
        }
    }
}

/// One family of controller entities (pools, volumes, ...).
#[async_trait]
pub trait EntityCollector: Send + Sync {
    fn name(&self) -> &str;

    /// Only connection-level failures are returned; failed commands
    /// contribute no point.
    async fn collect(
        &self,
        session: &mut dyn RemoteSession,
        ctx: &CollectionContext<'_>,
    ) -> Result<Vec<Point>, CollectionError>;
}
