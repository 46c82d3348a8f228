//! Optional remote sync against a JSON-blob HTTP store
//!
//! The bin id is passed on every call; base URL and secret come from settings.
//! Failures are logged and returned to the caller without retrying.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};

use crate::config::RemoteSettings;
use crate::graph::FactoryGraph;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("no API key configured for the remote store")]
    MissingApiKey,

    #[error("client build failed: {0}")]
    BuildClient(String),

    #[error("http request failed: {0}")]
    Http(String),

    #[error("http status {code}: {message}")]
    HttpStatus { code: u16, message: String },

    #[error("decode response failed: {0}")]
    Decode(String),

    #[error("encode request failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A key-value store addressed by bin id
pub trait RemoteStore {
    fn save(&self, bin_id: &str, record: &Value) -> Result<Value, RemoteError>;
    fn load(&self, bin_id: &str) -> Result<Value, RemoteError>;
}

#[derive(Debug, Deserialize)]
struct LatestResponse {
    record: Value,
}

#[derive(Debug, Clone)]
pub struct JsonBinClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl JsonBinClient {
    pub fn from_settings(settings: &RemoteSettings) -> Result<Self, RemoteError> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(RemoteError::MissingApiKey)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()
            .map_err(|e| RemoteError::BuildClient(e.to_string()))?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn bin_url(&self, bin_id: &str) -> String {
        format!("{}/b/{}", self.base_url, bin_id)
    }

    fn check(response: reqwest::blocking::Response) -> Result<Value, RemoteError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_else(|_| "<no body>".to_string());
            return Err(RemoteError::HttpStatus {
                code: status.as_u16(),
                message,
            });
        }
        response
            .json()
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

impl RemoteStore for JsonBinClient {
    fn save(&self, bin_id: &str, record: &Value) -> Result<Value, RemoteError> {
        let result = self
            .client
            .put(self.bin_url(bin_id))
            .header("X-Master-Key", &self.api_key)
            .header("X-Bin-Versioning", "false")
            .json(record)
            .send()
            .map_err(|e| RemoteError::Http(e.to_string()))
            .and_then(Self::check);

        if let Err(e) = &result {
            error!(bin = bin_id, "Error saving to remote store: {}", e);
        }
        result
    }

    fn load(&self, bin_id: &str) -> Result<Value, RemoteError> {
        let result = self
            .client
            .get(format!("{}/latest", self.bin_url(bin_id)))
            .header("X-Master-Key", &self.api_key)
            .send()
            .map_err(|e| RemoteError::Http(e.to_string()))
            .and_then(Self::check)
            .and_then(unwrap_record);

        if let Err(e) = &result {
            error!(bin = bin_id, "Error retrieving from remote store: {}", e);
        }
        result
    }
}

/// The store wraps the saved payload as `{ "record": ..., "metadata": ... }`
fn unwrap_record(body: Value) -> Result<Value, RemoteError> {
    serde_json::from_value::<LatestResponse>(body)
        .map(|r| r.record)
        .map_err(|e| RemoteError::Decode(e.to_string()))
}

/// Upload the plan to `bin_id`
pub fn push_flow(store: &impl RemoteStore, bin_id: &str, graph: &FactoryGraph) -> Result<(), RemoteError> {
    let record = serde_json::to_value(graph)?;
    store.save(bin_id, &record)?;
    info!(bin = bin_id, nodes = graph.nodes.len(), "pushed plan");
    Ok(())
}

/// Download the plan stored in `bin_id`, re-evaluating connected factories
pub fn pull_flow(store: &impl RemoteStore, bin_id: &str) -> Result<FactoryGraph, RemoteError> {
    let record = store.load(bin_id)?;
    let mut graph: FactoryGraph =
        serde_json::from_value(record).map_err(|e| RemoteError::Decode(e.to_string()))?;
    graph.refresh_all();
    info!(bin = bin_id, nodes = graph.nodes.len(), "pulled plan");
    Ok(graph)
}
