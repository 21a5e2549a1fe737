//! Dictionary Fetcher - One HTTP GET Per Dictionary
//!
//! Downloads the compression dictionary of a single store version from a
//! randomly picked ready-to-serve storage node:
//!
//! ```text
//! GET {scheme}://{host}:{port}/dictionary/{store}/{version}
//! ```
//!
//! A single deadline (`dictionary_retrieval_time_ms`) bounds the whole
//! resolve-connect-transfer sequence. Any 2xx response with a non-empty
//! body succeeds and yields the exact body bytes; everything else maps to a
//! typed [`FetchError`]. The fetcher does not retry; retry policy lives in
//! the retrieval service.

use crate::config::RouterConfig;
use crate::error::{FetchError, RouterError};
use crate::instance::{InstanceDirectory, ReplicaPicker};
use bytes::Bytes;
use keyhouse_core::topic;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Idle connections kept per storage node.
const MAX_IDLE_CONNECTIONS_PER_HOST: usize = 2;

/// Downloads compression dictionaries from storage nodes.
pub struct DictionaryFetcher {
    client: reqwest::Client,
    picker: ReplicaPicker,
    timeout: Duration,
    ssl_enabled: bool,
}

impl DictionaryFetcher {
    pub fn new(
        directory: Arc<dyn InstanceDirectory>,
        config: &RouterConfig,
    ) -> Result<Self, RouterError> {
        let timeout = config.retrieval_timeout();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(MAX_IDLE_CONNECTIONS_PER_HOST)
            .build()
            .map_err(|error| RouterError::Transport(error.to_string()))?;

        Ok(Self {
            client,
            picker: ReplicaPicker::new(directory),
            timeout,
            ssl_enabled: config.ssl_enabled,
        })
    }

    /// Download the dictionary for one store version.
    pub async fn fetch(&self, store_name: &str, version_number: u32) -> Result<Bytes, FetchError> {
        let topic = topic::compose(store_name, version_number);

        let instance = self
            .picker
            .pick(&topic)
            .ok_or_else(|| FetchError::NoReplica {
                topic: topic.clone(),
            })?;

        let url = format!(
            "{}/dictionary/{}/{}",
            instance.url(self.ssl_enabled),
            store_name,
            version_number
        );
        debug!(topic = %topic, url = %url, "downloading dictionary");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|error| self.classify(error, &url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|error| self.classify(error, &url))?;

        if body.is_empty() {
            return Err(FetchError::BadResponse { url });
        }

        Ok(body)
    }

    fn classify(&self, error: reqwest::Error, url: &str) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            }
        } else if error.is_body() || error.is_decode() {
            FetchError::BadResponse {
                url: url.to_string(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                detail: error.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{Instance, StaticInstanceDirectory};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_with_timeout_ms(ms: u64) -> RouterConfig {
        RouterConfig {
            dictionary_retrieval_time_ms: ms,
            ..RouterConfig::default()
        }
    }

    async fn fetcher_for(server: &MockServer, topic: &str, timeout_ms: u64) -> DictionaryFetcher {
        let address = server.address();
        let directory = Arc::new(StaticInstanceDirectory::new());
        directory.set_single_replica(topic, Instance::new(address.ip().to_string(), address.port()));
        DictionaryFetcher::new(directory, &config_with_timeout_ms(timeout_ms)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_success_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dictionary/orders/1"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xAA, 0xBB]))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server, "orders_v1", 2_000).await;
        let bytes = fetcher.fetch("orders", 1).await.unwrap();
        assert_eq!(bytes.as_ref(), &[0xAA, 0xBB]);
    }

    #[tokio::test]
    async fn test_fetch_no_replica() {
        let directory = Arc::new(StaticInstanceDirectory::new());
        let fetcher =
            DictionaryFetcher::new(directory, &config_with_timeout_ms(1_000)).unwrap();

        let error = fetcher.fetch("orders", 1).await.unwrap_err();
        assert!(matches!(error, FetchError::NoReplica { topic } if topic == "orders_v1"));
    }

    #[tokio::test]
    async fn test_fetch_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dictionary/orders/1"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server, "orders_v1", 2_000).await;
        let error = fetcher.fetch("orders", 1).await.unwrap_err();
        assert!(matches!(error, FetchError::HttpStatus { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_fetch_empty_body_is_bad_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dictionary/orders/1"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server, "orders_v1", 2_000).await;
        let error = fetcher.fetch("orders", 1).await.unwrap_err();
        assert!(matches!(error, FetchError::BadResponse { .. }));
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dictionary/orders/1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![0x01])
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server, "orders_v1", 200).await;
        let error = fetcher.fetch("orders", 1).await.unwrap_err();
        assert!(matches!(error, FetchError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_fetch_transport_error() {
        // A port with nothing listening on it.
        let directory = Arc::new(StaticInstanceDirectory::new());
        directory.set_single_replica("orders_v1", Instance::new("127.0.0.1", 1));
        let fetcher =
            DictionaryFetcher::new(directory, &config_with_timeout_ms(1_000)).unwrap();

        let error = fetcher.fetch("orders", 1).await.unwrap_err();
        assert!(matches!(
            error,
            FetchError::Transport { .. } | FetchError::Timeout { .. }
        ));
    }
}
