//! Contract with the CRUD backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sinistro_core::{normalize_records, CollectionKey, CollectionName, Item, RefDataError, RefDataResult};

/// Body of a collection read: `(success, items, message)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResponse {
    pub success: bool,
    #[serde(default, alias = "data")]
    pub items: Vec<Value>,
    #[serde(default)]
    pub message: String,
}

impl FetchResponse {
    pub fn ok(items: Vec<Value>) -> Self {
        Self {
            success: true,
            items,
            message: String::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            items: Vec::new(),
            message: message.into(),
        }
    }
}

/// Read side of the CRUD backend, one call per collection.
///
/// Transport concerns (addressing, auth headers, timeouts) belong to the
/// implementation. A transport failure is reported as
/// [`RefDataError::FetchFailed`].
#[async_trait]
pub trait CollectionFetcher: Send + Sync {
    /// Fetch `collection`, scoped by `parent` for scoped collections.
    async fn fetch(
        &self,
        collection: CollectionName,
        parent: Option<&str>,
    ) -> RefDataResult<FetchResponse>;
}

/// Fetch `key` and normalize the result, dropping malformed records.
pub(crate) async fn fetch_items(
    fetcher: &dyn CollectionFetcher,
    key: &CollectionKey,
) -> RefDataResult<Vec<Item>> {
    if !key.is_complete() {
        return Err(RefDataError::fetch_failed(
            key.to_string(),
            "scoped collection requested without a parent key",
        ));
    }

    let response = fetcher.fetch(key.name(), key.parent()).await?;
    if !response.success {
        let message = if response.message.is_empty() {
            "backend reported failure".to_string()
        } else {
            response.message
        };
        return Err(RefDataError::fetch_failed(key.to_string(), message));
    }

    let (items, dropped) = normalize_records(response.items);
    if dropped > 0 {
        tracing::debug!(collection = %key, dropped, "dropped malformed records");
    }
    Ok(items)
}
