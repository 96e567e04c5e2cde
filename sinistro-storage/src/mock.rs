//! Scriptable [`CollectionFetcher`] for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use sinistro_core::{CollectionKey, CollectionName, RefDataError, RefDataResult};
use tokio::sync::Semaphore;

use crate::refdata::{CollectionFetcher, FetchResponse};

/// Scripted outcome of one fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum MockResponse {
    /// `success: true` with these raw records.
    Items(Vec<Value>),
    /// `success: false` with this message.
    Failure(String),
    /// The request never produced a response.
    TransportError(String),
}

impl MockResponse {
    pub fn items(items: Vec<Value>) -> Self {
        Self::Items(items)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(message.into())
    }

    pub fn transport_error(message: impl Into<String>) -> Self {
        Self::TransportError(message.into())
    }
}

/// Fetcher that answers from a script and records every call.
///
/// A gated fetcher holds each fetch until [`MockFetcher::release`] hands out
/// a permit, which lets tests observe the in-flight window.
#[derive(Debug, Default)]
pub struct MockFetcher {
    responses: Mutex<HashMap<CollectionKey, MockResponse>>,
    calls: Mutex<Vec<CollectionKey>>,
    gate: Option<Arc<Semaphore>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetcher whose fetches block until released.
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    /// Script the response for `key`, replacing any previous script.
    pub fn respond(&self, key: CollectionKey, response: MockResponse) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, response);
    }

    /// Let `n` gated fetches proceed. No-op on an ungated fetcher.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Every fetch so far, in call order.
    pub fn calls(&self) -> Vec<CollectionKey> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn calls_for(&self, key: &CollectionKey) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|call| *call == key)
            .count()
    }
}

#[async_trait]
impl CollectionFetcher for MockFetcher {
    async fn fetch(
        &self,
        collection: CollectionName,
        parent: Option<&str>,
    ) -> RefDataResult<FetchResponse> {
        let key = match parent {
            Some(parent) => CollectionKey::scoped(collection, parent),
            None => CollectionKey::new(collection),
        };
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(key.clone());

        if let Some(gate) = &self.gate {
            match gate.acquire().await {
                Ok(permit) => permit.forget(),
                Err(_) => return Err(RefDataError::fetch_failed(key.to_string(), "gate closed")),
            }
        }

        let response = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned();

        match response {
            Some(MockResponse::Items(items)) => Ok(FetchResponse::ok(items)),
            Some(MockResponse::Failure(message)) => Ok(FetchResponse::failure(message)),
            Some(MockResponse::TransportError(message)) => {
                Err(RefDataError::fetch_failed(key.to_string(), message))
            }
            None => Ok(FetchResponse::failure(format!("no scripted response for {key}"))),
        }
    }
}
