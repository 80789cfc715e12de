//! Ordered pool of chain RPC endpoints.

use std::fmt;
use url::Url;

use crate::blockchain::types::{BlockchainError, BlockchainResult};

/// A validated JSON-RPC endpoint address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint(Url);

impl Endpoint {
    pub fn parse(raw: &str) -> BlockchainResult<Self> {
        Url::parse(raw.trim())
            .map(Self)
            .map_err(|e| BlockchainError::Rpc(format!("Invalid RPC URL '{}': {}", raw, e)))
    }

    pub fn url(&self) -> &Url {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Static, ordered list of endpoints. Holds no connection state.
#[derive(Debug, Clone)]
pub struct EndpointPool {
    endpoints: Vec<Endpoint>,
}

impl EndpointPool {
    /// Build a pool from raw URLs, skipping (and logging) any that fail to parse.
    pub fn from_urls<S: AsRef<str>>(urls: &[S]) -> Self {
        let mut endpoints = Vec::with_capacity(urls.len());
        for raw in urls {
            match Endpoint::parse(raw.as_ref()) {
                Ok(endpoint) => endpoints.push(endpoint),
                Err(e) => tracing::warn!(url = %raw.as_ref(), error = %e, "Ignoring invalid RPC URL"),
            }
        }
        Self { endpoints }
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Endpoint> {
        self.endpoints.get(index)
    }

    /// Every endpoint exactly once, beginning at `start` and wrapping around.
    pub fn rotation(&self, start: usize) -> impl Iterator<Item = (usize, &Endpoint)> + '_ {
        let len = self.endpoints.len();
        (0..len).map(move |offset| {
            let index = (start + offset) % len;
            (index, &self.endpoints[index])
        })
    }
}
