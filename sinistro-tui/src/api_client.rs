//! REST client for the CRUD backend's collection reads.

use crate::config::{AuthConfig, TuiConfig};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use sinistro_core::{CollectionKey, CollectionName, RefDataError, RefDataResult};
use sinistro_storage::{CollectionFetcher, FetchResponse};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ApiClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
    #[error("Config error: {0}")]
    Config(String),
}

/// Collection reads accept either the `{success, data, message}` envelope
/// or a bare JSON array.
#[derive(Deserialize)]
#[serde(untagged)]
enum CollectionBody {
    Envelope(FetchResponse),
    Bare(Vec<Value>),
}

pub fn parse_collection_body(body: &[u8]) -> Result<FetchResponse, ApiClientError> {
    match serde_json::from_slice::<CollectionBody>(body)? {
        CollectionBody::Envelope(response) => Ok(response),
        CollectionBody::Bare(items) => Ok(FetchResponse::ok(items)),
    }
}

/// [`CollectionFetcher`] over HTTP.
///
/// Unscoped collections live at `/api/{slug}`; cities are read per state at
/// `/api/estados/{uf}/cidades`.
#[derive(Clone)]
pub struct RestFetcher {
    client: reqwest::Client,
    base_url: Url,
    auth_header: HeaderMap,
    timeout: Duration,
}

impl RestFetcher {
    pub fn new(config: &TuiConfig) -> Result<Self, ApiClientError> {
        let timeout = config.request_timeout();
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = Url::parse(config.api_base_url.trim_end_matches('/'))
            .map_err(|e| ApiClientError::Config(format!("api_base_url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiClientError::Config(
                "api_base_url must be an http(s) URL".to_string(),
            ));
        }

        let auth_header = build_auth_headers(&config.auth)?;
        Ok(Self {
            client,
            base_url,
            auth_header,
            timeout,
        })
    }

    pub fn endpoint(&self, collection: CollectionName, parent: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("api");
            match parent {
                Some(parent) if collection.is_scoped() => {
                    segments
                        .push(CollectionName::States.slug())
                        .push(parent)
                        .push(collection.slug());
                }
                _ => {
                    segments.push(collection.slug());
                }
            }
        }
        url
    }

    pub async fn fetch_collection(
        &self,
        collection: CollectionName,
        parent: Option<&str>,
    ) -> Result<FetchResponse, ApiClientError> {
        let url = self.endpoint(collection, parent);
        tracing::debug!(%url, "fetching collection");
        let response = self
            .client
            .get(url)
            .headers(self.auth_header.clone())
            .send()
            .await?;
        self.parse_response(response).await
    }

    async fn parse_response(&self, response: reqwest::Response) -> Result<FetchResponse, ApiClientError> {
        let status = response.status();
        let body = response.bytes().await?;
        if status.is_success() {
            return parse_collection_body(&body);
        }
        // Error bodies that still use the envelope carry a useful message.
        if let Ok(CollectionBody::Envelope(envelope)) = serde_json::from_slice(&body) {
            if !envelope.message.is_empty() {
                return Err(ApiClientError::InvalidResponse(format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    envelope.message
                )));
            }
        }
        Err(ApiClientError::InvalidResponse(format!(
            "HTTP {}: {}",
            status.as_u16(),
            String::from_utf8_lossy(&body)
        )))
    }
}

#[async_trait]
impl CollectionFetcher for RestFetcher {
    async fn fetch(
        &self,
        collection: CollectionName,
        parent: Option<&str>,
    ) -> RefDataResult<FetchResponse> {
        let key = match parent {
            Some(parent) => CollectionKey::scoped(collection, parent),
            None => CollectionKey::new(collection),
        };
        self.fetch_collection(collection, parent)
            .await
            .map_err(|e| {
                let message = match &e {
                    ApiClientError::Http(http) if http.is_timeout() => {
                        format!("request timed out after {}ms", self.timeout.as_millis())
                    }
                    other => other.to_string(),
                };
                tracing::warn!(collection = %key, error = %message, "collection fetch failed");
                RefDataError::fetch_failed(key.to_string(), message)
            })
    }
}

fn build_auth_headers(auth: &AuthConfig) -> Result<HeaderMap, ApiClientError> {
    let mut headers = HeaderMap::new();
    if let Some(api_key) = &auth.api_key {
        headers.insert(
            HeaderName::from_static("x-api-key"),
            HeaderValue::from_str(api_key).map_err(|e| ApiClientError::Config(e.to_string()))?,
        );
    }
    if let Some(jwt) = &auth.jwt {
        let value = format!("Bearer {}", jwt);
        headers.insert(
            HeaderName::from_static("authorization"),
            HeaderValue::from_str(&value).map_err(|e| ApiClientError::Config(e.to_string()))?,
        );
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher(base: &str) -> RestFetcher {
        let mut config = crate::test_support::config();
        config.api_base_url = base.to_string();
        RestFetcher::new(&config).unwrap()
    }

    #[test]
    fn unscoped_endpoint() {
        let url = fetcher("http://localhost:3000").endpoint(CollectionName::Brands, None);
        assert_eq!(url.as_str(), "http://localhost:3000/api/marcas");
    }

    #[test]
    fn cities_are_read_per_state() {
        let url = fetcher("http://localhost:3000/").endpoint(CollectionName::Cities, Some("SP"));
        assert_eq!(url.as_str(), "http://localhost:3000/api/estados/SP/cidades");
    }

    #[test]
    fn base_path_is_kept() {
        let url = fetcher("https://example.test/admin").endpoint(CollectionName::Positions, None);
        assert_eq!(url.as_str(), "https://example.test/admin/api/posicoes");
    }

    #[test]
    fn envelope_and_bare_bodies() {
        let envelope = parse_collection_body(br#"{"success":true,"data":[{"id":1}]}"#).unwrap();
        assert!(envelope.success);
        assert_eq!(envelope.items.len(), 1);

        let failure = parse_collection_body(br#"{"success":false,"message":"sem acesso"}"#).unwrap();
        assert!(!failure.success);
        assert_eq!(failure.message, "sem acesso");

        let bare = parse_collection_body(br#"["SP","RJ"]"#).unwrap();
        assert!(bare.success);
        assert_eq!(bare.items.len(), 2);

        assert!(parse_collection_body(b"<html>").is_err());
    }

    #[test]
    fn auth_headers_from_config() {
        let headers = build_auth_headers(&AuthConfig {
            api_key: Some("k".into()),
            jwt: Some("t".into()),
        })
        .unwrap();
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        assert_eq!(header("x-api-key"), Some("k"));
        assert_eq!(header("authorization"), Some("Bearer t"));
    }

    #[test]
    fn rejects_non_http_base() {
        let mut config = crate::test_support::config();
        config.api_base_url = "mailto:ops@example.test".to_string();
        assert!(matches!(
            RestFetcher::new(&config),
            Err(ApiClientError::Config(_))
        ));
    }
}
