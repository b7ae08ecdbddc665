use crate::shared::error::ConfigError;
use crate::shared::point::TagSet;
use log::info;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Tag carrying the target name on every point.
pub const TARGET_TAG: &str = "target";

const DEFAULT_DATABASE: &str = "svc2influxdb";
const DEFAULT_INFLUXDB_PORT: u16 = 8086;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub influxdb: DatabaseConfig,
    #[serde(default)]
    pub ssh: SshSettings,
    pub targets: Vec<Target>,
}

#[derive(Clone, Deserialize)]
pub struct DatabaseConfig {
    pub address: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SshSettings {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

/// A storage controller to poll.
#[derive(Clone, Deserialize)]
pub struct Target {
    pub name: String,
    pub address: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub identity_file: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

fn default_database() -> String {
    DEFAULT_DATABASE.to_string()
}

fn default_batch_size() -> usize {
    5000
}

fn default_http_timeout() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_command_timeout() -> u64 {
    60
}

fn default_ssh_port() -> u16 {
    22
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            command_timeout_secs: default_command_timeout(),
        }
    }
}

impl SshSettings {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&content)?;
        info!(
            "Loaded configuration from {} ({} targets)",
            path.display(),
            config.targets.len()
        );
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::Invalid("no target defined".to_string()));
        }
        if self.influxdb.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be positive".to_string()));
        }
        self.influxdb.base_url()?;

        let mut names = HashSet::new();
        for target in &self.targets {
            target.validate()?;
            if !names.insert(target.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate target name `{}`",
                    target.name
                )));
            }
        }
        Ok(())
    }
}

impl DatabaseConfig {
    /// Address with a scheme and a port, `http://host:8086` by default.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let address = self.address.trim();
        let with_scheme = if address.contains("://") {
            address.to_string()
        } else {
            format!("http://{}", address)
        };
        let mut url = Url::parse(&with_scheme)?;
        if url.port().is_none() && !self.address.contains("://") {
            url.set_port(Some(DEFAULT_INFLUXDB_PORT))
                .map_err(|_| ConfigError::Invalid(format!("cannot set port on `{}`", address)))?;
        }
        Ok(url)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Target {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("target without a name".to_string()));
        }
        if self.address.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "target `{}` has no address",
                self.name
            )));
        }
        if self.username.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "target `{}` has no username",
                self.name
            )));
        }
        if self.tags.contains_key(TARGET_TAG) {
            return Err(ConfigError::Invalid(format!(
                "target `{}` redefines the reserved `{}` tag",
                self.name, TARGET_TAG
            )));
        }
        // line protocol has no escape for line breaks
        let breaks_line = |text: &str| text.contains(['\n', '\r']);
        if breaks_line(&self.name)
            || self
                .tags
                .iter()
                .any(|(key, value)| breaks_line(key.as_str()) || breaks_line(value.as_str()))
        {
            return Err(ConfigError::Invalid(format!(
                "target `{}` has a line break in its name or tags",
                self.name.escape_debug()
            )));
        }
        Ok(())
    }

    /// Static tags plus the target name.
    pub fn tags(&self) -> TagSet {
        let mut tags = self.tags.clone();
        tags.insert(TARGET_TAG.to_string(), self.name.clone());
        tags
    }

    /// `user@address` as handed to ssh.
    pub fn destination(&self) -> String {
        format!("{}@{}", self.username, self.address)
    }
}

fn redact(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| "***")
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("identity_file", &self.identity_file)
            .field("tags", &self.tags)
            .finish()
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("database", &self.database)
            .field("batch_size", &self.batch_size)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
