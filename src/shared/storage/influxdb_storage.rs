use async_trait::async_trait;
use crate::shared::config::{DatabaseConfig, TARGET_TAG};
use crate::shared::error::StorageError;
use crate::shared::point::{CollectionBatch, FieldValue, Point};
use crate::shared::traits::BatchPublisher;
use log::{debug, error, info, warn};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use url::Url;

/// Writes points to an InfluxDB 1.x server over its HTTP API.
pub struct InfluxDbStorage {
    client: Client,
    base_url: Url,
    username: Option<String>,
    password: Option<String>,
    batch_size: usize,
}

impl InfluxDbStorage {
    pub fn new(config: &DatabaseConfig) -> Result<Self, StorageError> {
        let base_url = config
            .base_url()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
            batch_size: config.batch_size.max(1),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, StorageError> {
        self.base_url
            .join(path)
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    fn authenticated(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.username {
            Some(username) => request.basic_auth(username, self.password.as_ref()),
            None => request,
        }
    }

    async fn check(response: Response) -> Result<(), StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|json| json.get("error").and_then(Value::as_str).map(str::to_string))
            .unwrap_or(body);
        Err(StorageError::Write {
            status: status.as_u16(),
            message,
        })
    }

    async fn write_lines(&self, database: &str, body: String) -> Result<(), StorageError> {
        let request = self
            .client
            .post(self.endpoint("write")?)
            .query(&[("db", database), ("precision", "ms")])
            .body(body);
        let response = self.authenticated(request).send().await?;
        Self::check(response).await
    }
}

#[async_trait]
impl BatchPublisher for InfluxDbStorage {
    async fn ensure_database(&self, database: &str) -> Result<(), StorageError> {
        let statement = format!("CREATE DATABASE \"{}\"", database.replace('"', "\\\""));
        let request = self
            .client
            .post(self.endpoint("query")?)
            .query(&[("q", statement.as_str())]);
        let response = self.authenticated(request).send().await?;

        Self::check(response).await.map_err(|e| {
            error!("Failed to create database {}: {}", database, e);
            StorageError::Database(e.to_string())
        })?;
        debug!("Database {} is ready", database);
        Ok(())
    }

    async fn publish(&self, database: &str, batch: &CollectionBatch) -> Result<(), StorageError> {
        let lines = encode_batch(batch);
        if lines.len() < batch.len() {
            warn!(
                "{}: dropped {} points without fields",
                batch.target,
                batch.len() - lines.len()
            );
        }

        for chunk in lines.chunks(self.batch_size) {
            self.write_lines(database, chunk.join("\n")).await?;
        }

        info!(
            "Stored {} points for {} in {}",
            lines.len(),
            batch.target,
            database
        );
        Ok(())
    }
}

/// Line protocol for every writable point of the batch, target tag enforced.
pub fn encode_batch(batch: &CollectionBatch) -> Vec<String> {
    batch
        .points
        .iter()
        .filter(|point| !point.fields.is_empty())
        .map(|point| {
            if point.tags.contains_key(TARGET_TAG) {
                encode_point(point)
            } else {
                let mut tagged = point.clone();
                tagged
                    .tags
                    .insert(TARGET_TAG.to_string(), batch.target.clone());
                encode_point(&tagged)
            }
        })
        .collect()
}

/// `measurement,tag=v field=1i 1700000000000`
pub fn encode_point(point: &Point) -> String {
    let mut line = escape(&point.measurement, &[',', ' ']);

    for (key, value) in &point.tags {
        if value.is_empty() {
            continue;
        }
        line.push(',');
        line.push_str(&escape(key, &[',', '=', ' ']));
        line.push('=');
        line.push_str(&escape(value, &[',', '=', ' ']));
    }

    let fields = point
        .fields
        .iter()
        .map(|(key, value)| {
            let value = match value {
                FieldValue::Bytes(n) => format!("{}i", n),
                FieldValue::Integer(n) => format!("{}i", n),
            };
            format!("{}={}", escape(key, &[',', '=', ' ']), value)
        })
        .collect::<Vec<_>>()
        .join(",");

    line.push(' ');
    line.push_str(&fields);
    line.push(' ');
    line.push_str(&point.timestamp.to_string());
    line
}

fn escape(raw: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
