//! In-memory executor, publisher and clock for exercising collection runs
//! without a controller or a database.

use async_trait::async_trait;
use crate::shared::config::Target;
use crate::shared::error::{ExecError, StorageError};
use crate::shared::point::{CollectionBatch, Timestamp};
use crate::shared::traits::{BatchPublisher, Clock, RemoteExecutor, RemoteSession};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Canned answer to one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Output(String),
    Exit(i32),
    Timeout,
    /// The connection drops while the command runs.
    Disconnect,
}

/// Replays scripted replies keyed by target name and command.
#[derive(Debug, Default, Clone)]
pub struct ScriptedExecutor {
    replies: HashMap<(String, String), Reply>,
    unreachable: HashSet<String>,
    issued: Arc<Mutex<Vec<(String, String)>>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, target: &str, command: &str, output: &str) -> Self {
        self.script(target, command, Reply::Output(output.to_string()))
    }

    pub fn script(mut self, target: &str, command: &str, reply: Reply) -> Self {
        self.replies
            .insert((target.to_string(), command.to_string()), reply);
        self
    }

    /// Refuse every connection to `target`.
    pub fn unreachable(mut self, target: &str) -> Self {
        self.unreachable.insert(target.to_string());
        self
    }

    /// Every (target, command) executed so far, in order.
    pub fn issued(&self) -> Vec<(String, String)> {
        locked(&self.issued).clone()
    }

    pub fn issued_for(&self, target: &str) -> Vec<String> {
        locked(&self.issued)
            .iter()
            .filter(|(name, _)| name == target)
            .map(|(_, command)| command.clone())
            .collect()
    }
}

#[async_trait]
impl RemoteExecutor for ScriptedExecutor {
    async fn connect(&self, target: &Target) -> Result<Box<dyn RemoteSession>, ExecError> {
        if self.unreachable.contains(&target.name) {
            return Err(ExecError::Connection {
                destination: target.destination(),
                message: "Connection refused".to_string(),
            });
        }
        Ok(Box::new(ScriptedSession {
            target: target.name.clone(),
            destination: target.destination(),
            replies: self.replies.clone(),
            issued: Arc::clone(&self.issued),
        }))
    }
}

pub struct ScriptedSession {
    target: String,
    destination: String,
    replies: HashMap<(String, String), Reply>,
    issued: Arc<Mutex<Vec<(String, String)>>>,
}

#[async_trait]
impl RemoteSession for ScriptedSession {
    async fn exec(&mut self, command: &str) -> Result<String, ExecError> {
        locked(&self.issued).push((self.target.clone(), command.to_string()));

        let reply = self
            .replies
            .get(&(self.target.clone(), command.to_string()))
            .cloned()
            .unwrap_or(Reply::Exit(1));

        match reply {
            Reply::Output(output) => Ok(output),
            Reply::Exit(status) => Err(ExecError::Command {
                command: command.to_string(),
                status,
                stderr: "CMMVC5786E The action failed".to_string(),
            }),
            Reply::Timeout => Err(ExecError::Timeout {
                command: command.to_string(),
                timeout: Duration::from_secs(60),
            }),
            Reply::Disconnect => Err(ExecError::Connection {
                destination: self.destination.clone(),
                message: "Connection reset by peer".to_string(),
            }),
        }
    }
}

/// Clock advancing by a fixed step on every read.
#[derive(Debug)]
pub struct StepClock {
    next: AtomicI64,
    step: i64,
}

impl StepClock {
    pub fn new(start: Timestamp, step: i64) -> Self {
        Self {
            next: AtomicI64::new(start),
            step,
        }
    }
}

impl Clock for StepClock {
    fn now_millis(&self) -> Timestamp {
        self.next.fetch_add(self.step, Ordering::SeqCst)
    }
}

/// Keeps published batches in memory.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    pub databases: Mutex<Vec<String>>,
    pub published: Mutex<Vec<CollectionBatch>>,
    failing_targets: HashSet<String>,
    database_unreachable: bool,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(mut self, target: &str) -> Self {
        self.failing_targets.insert(target.to_string());
        self
    }

    pub fn database_unreachable(mut self) -> Self {
        self.database_unreachable = true;
        self
    }

    pub fn published_targets(&self) -> Vec<String> {
        locked(&self.published)
            .iter()
            .map(|batch| batch.target.clone())
            .collect()
    }
}

#[async_trait]
impl BatchPublisher for MemoryPublisher {
    async fn ensure_database(&self, database: &str) -> Result<(), StorageError> {
        if self.database_unreachable {
            return Err(StorageError::Connection("connection refused".to_string()));
        }
        let mut databases = locked(&self.databases);
        if !databases.iter().any(|name| name == database) {
            databases.push(database.to_string());
        }
        Ok(())
    }

    async fn publish(&self, _database: &str, batch: &CollectionBatch) -> Result<(), StorageError> {
        if self.failing_targets.contains(&batch.target) {
            return Err(StorageError::Write {
                status: 500,
                message: format!("write for {} rejected", batch.target),
            });
        }
        locked(&self.published).push(batch.clone());
        Ok(())
    }
}

/// Minimal target for tests.
pub fn target(name: &str) -> Target {
    Target {
        name: name.to_string(),
        address: format!("{}.example.net", name),
        port: 22,
        username: "monitor".to_string(),
        password: None,
        identity_file: None,
        tags: Default::default(),
    }
}
