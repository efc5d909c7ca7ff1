use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::constants;
use crate::domain::Address;

/// Why a batch could not be resolved by the oracle
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("oracle request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("oracle answered HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed oracle response: {0}")]
    Malformed(String),
}

impl OracleError {
    /// Short label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            OracleError::Transport(_) => "transport",
            OracleError::Status { .. } => "status",
            OracleError::Malformed(_) => "malformed",
        }
    }
}

/// Verdict for one address, matched to the request by position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupeDecision {
    pub dupe: bool,
    #[serde(default)]
    pub guid: Option<String>,
}

impl DedupeDecision {
    pub fn unique(guid: impl Into<String>) -> Self {
        Self { dupe: false, guid: Some(guid.into()) }
    }

    pub fn duplicate() -> Self {
        Self { dupe: true, guid: None }
    }
}

#[derive(Debug, Serialize)]
pub struct DedupeRequest<'a> {
    pub addresses: &'a [Address],
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DedupeResponse {
    pub addresses: Vec<DedupeDecision>,
}

/// The remote service deciding which addresses have been seen before.
#[async_trait]
pub trait DedupeOracle: Send + Sync {
    /// One decision per address, in request order
    async fn dedupe(&self, batch: &[Address]) -> Result<Vec<DedupeDecision>, OracleError>;
}

/// Talks to the oracle's batch endpoint over HTTP.
pub struct HttpDedupeOracle {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpDedupeOracle {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint_url(base_url),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

pub fn endpoint_url(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), constants::DEDUPE_ENDPOINT_PATH)
}

#[async_trait]
impl DedupeOracle for HttpDedupeOracle {
    async fn dedupe(&self, batch: &[Address]) -> Result<Vec<DedupeDecision>, OracleError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&DedupeRequest { addresses: batch })
            .send()
            .await?;

        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes).chars().take(200).collect();
            return Err(OracleError::Status { status: status.as_u16(), body });
        }

        let parsed: DedupeResponse = serde_json::from_slice(&bytes)
            .map_err(|e| OracleError::Malformed(format!("undecodable body: {}", e)))?;
        Ok(parsed.addresses)
    }
}
