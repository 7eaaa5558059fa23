// src/network/ledger.rs
//! Krist sync node client
//!
//! The sync node answers plain-text queries on a single endpoint:
//! `?lastblock`, `?getwork`, `?getbalance=<address>` and
//! `?submitblock&address=<address>&nonce=<nonce>`. Only the first line of
//! each answer matters.

use crate::network::Ledger;
use crate::types::WorkTarget;
use crate::utils::error::MinerError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::runtime::Runtime;
use url::Url;

/// Configuration for reaching the sync node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Sync node endpoint (e.g., "http://localhost:8080/index.php")
    #[serde(default = "default_node_url")]
    pub node_url: String,
    /// Document whose first line is the sync node endpoint
    ///
    /// When set, it takes precedence over `node_url`.
    #[serde(default)]
    pub node_list_url: Option<String>,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_node_url() -> String {
    "http://localhost:8080/index.php".into()
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            node_url: default_node_url(),
            node_list_url: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Blocking client for the sync node
///
/// Requests run on a private tokio runtime so the client can be called
/// from plain worker threads.
pub struct LedgerClient {
    /// Resolved sync node endpoint
    base: Url,
    /// HTTP client shared by all requests
    client: Client,
    /// Runtime driving the async requests
    runtime: Runtime,
}

impl LedgerClient {
    /// Creates a client, resolving the node through `node_list_url` if set
    ///
    /// # Errors
    /// Returns `MinerError` if the runtime or HTTP client cannot be built,
    /// the URL is invalid, or node discovery fails.
    pub fn new(config: &LedgerConfig) -> Result<Self, MinerError> {
        let runtime = Runtime::new()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let base = match &config.node_list_url {
            Some(list) => {
                let node = runtime.block_on(fetch_first_line(&client, Url::parse(list)?))?;
                log::info!("Discovered sync node {}", node);
                Url::parse(&node)?
            }
            None => Url::parse(&config.node_url)?,
        };

        Ok(LedgerClient {
            base,
            client,
            runtime,
        })
    }

    /// Endpoint the client talks to
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn get(&self, query: &str) -> Result<String, MinerError> {
        let url = endpoint(&self.base, query);
        log::trace!("GET {}", url);
        self.runtime.block_on(fetch_first_line(&self.client, url))
    }
}

impl Ledger for LedgerClient {
    fn last_block(&self) -> Result<String, MinerError> {
        self.get("lastblock")
    }

    fn work_target(&self) -> Result<WorkTarget, MinerError> {
        let target = self.get("getwork")?.parse::<WorkTarget>().unwrap_or(WorkTarget::Invalid);
        if !target.is_valid() {
            log::warn!("Sync node returned an unparseable work target");
        }
        Ok(target)
    }

    fn balance(&self, address: &str) -> Result<String, MinerError> {
        self.get(&format!("getbalance={}", address))
    }

    fn submit_solution(&self, address: &str, nonce: u64) -> Result<(), MinerError> {
        self.get(&submit_query(address, nonce)).map(|_| ())
    }
}

/// Builds the URL for a sync node query
fn endpoint(base: &Url, query: &str) -> Url {
    let mut url = base.clone();
    url.set_query(Some(query));
    url
}

fn submit_query(address: &str, nonce: u64) -> String {
    format!("submitblock&address={}&nonce={}", address, nonce)
}

/// First line of a response body, trimmed
fn first_line(body: &str) -> Option<&str> {
    body.lines().next().map(str::trim)
}

async fn fetch_first_line(client: &Client, url: Url) -> Result<String, MinerError> {
    let body = client
        .get(url.clone())
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    first_line(&body)
        .map(str::to_string)
        .ok_or_else(|| MinerError::ProtocolError(format!("Empty response from {}", url)))
}
