use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration failed: {0}")]
    Config(#[from] ConfigError),

    #[error("Collection failed: {0}")]
    Collection(#[from] CollectionError),

    #[error("Storage failed: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("The format of the configuration file is incorrect: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid database address: {0}")]
    Url(#[from] url::ParseError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Failure of a single remote command.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Failed to spawn ssh process: {0}")]
    Spawn(#[from] io::Error),

    #[error("Connection to {destination} failed: {message}")]
    Connection { destination: String, message: String },

    #[error("Authentication error on {destination}: {message}")]
    Authentication { destination: String, message: String },

    #[error("Password authentication requested but sshpass is not installed")]
    MissingSshpass,

    #[error("Command `{command}` timed out after {}s", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    #[error("Command `{command}` failed (exit {status}): {stderr}")]
    Command {
        command: String,
        status: i32,
        stderr: String,
    },
}

impl ExecError {
    /// Connection-level errors abort the whole target; anything else only
    /// drops the command that raised it.
    pub fn is_connection_level(&self) -> bool {
        matches!(
            self,
            ExecError::Connection { .. }
                | ExecError::Authentication { .. }
                | ExecError::MissingSshpass
        )
    }
}

#[derive(Error, Debug)]
pub enum CollectionError {
    #[error("Target {target} is unreachable: {source}")]
    Connection {
        target: String,
        #[source]
        source: ExecError,
    },

    #[error("Command failed on {target}: {source}")]
    Command {
        target: String,
        #[source]
        source: ExecError,
    },
}

impl CollectionError {
    pub fn from_exec(target: &str, source: ExecError) -> Self {
        if source.is_connection_level() {
            CollectionError::Connection {
                target: target.to_string(),
                source,
            }
        } else {
            CollectionError::Command {
                target: target.to_string(),
                source,
            }
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("Line {line}: expected {expected} fields, found {found}")]
    FieldCountMismatch {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("Output has no header line")]
    MissingHeader,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Cannot access the InfluxDB database: {0}")]
    Connection(String),

    #[error("InfluxDB rejected the write (status {status}): {message}")]
    Write { status: u16, message: String },

    #[error("Database error: {0}")]
    Database(String),
}

impl From<reqwest::Error> for StorageError {
    fn from(e: reqwest::Error) -> Self {
        StorageError::Connection(e.to_string())
    }
}
