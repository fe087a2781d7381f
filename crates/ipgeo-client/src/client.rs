//! ipgeolocation.io API client.

use std::sync::Arc;

use ipgeo_core::error::ReqwestErrorExt;
use ipgeo_core::{ClientConfig, EndpointConfig, DEFAULT_TTL_MS};
use ipgeo_storage::{KeyValueStore, TieredCache};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::instrument;

use crate::error::ClientError;
use crate::params::build_geolocation_url_params;
use crate::types::{GeolocationResult, ProviderError, TransportError};

/// Storage key of the cached lookup result (both tiers)
pub const CACHE_KEY: &str = "ipgeo_response";

/// Persistent-tier key of the daily warm-up marker
pub const WARM_UP_KEY: &str = "geoLocationData";

const WARM_UP_TTL_MS: u64 = 86_400_000;
const USER_AGENT: &str = concat!("ipgeo-client/", env!("CARGO_PKG_VERSION"));

pub struct IpGeolocationClient {
    client: reqwest::Client,
    /// Sends the warm-up ping without any headers of our own
    warm_up_client: reqwest::Client,
    config: ClientConfig,
    endpoints: EndpointConfig,
    cache: TieredCache,
}

impl IpGeolocationClient {
    /// Create a client against the public endpoints.
    pub fn new(
        config: ClientConfig,
        session: Arc<dyn KeyValueStore>,
        local: Arc<dyn KeyValueStore>,
    ) -> Result<Self, ClientError> {
        Self::with_endpoints(config, EndpointConfig::default(), session, local)
    }

    pub fn with_endpoints(
        config: ClientConfig,
        endpoints: EndpointConfig,
        session: Arc<dyn KeyValueStore>,
        local: Arc<dyn KeyValueStore>,
    ) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        let warm_up_client = reqwest::Client::builder().build()?;

        Ok(Self {
            client,
            warm_up_client,
            config,
            endpoints,
            cache: TieredCache::new(session, local),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn endpoints(&self) -> &EndpointConfig {
        &self.endpoints
    }

    pub fn build_geolocation_url_params(&self) -> String {
        build_geolocation_url_params(&self.config)
    }

    /// Look up the configured IP, serving from cache when possible.
    ///
    /// Runs the warm-up ping first on every call. A cached result is returned
    /// without contacting the provider; otherwise the fetched result, errors
    /// included, is written to the configured tiers for 24 hours.
    #[instrument(skip(self), level = "info")]
    pub async fn get_geolocation(&self) -> GeolocationResult {
        self.warm_up().await;

        match self.cache.get_from_storage::<GeolocationResult>(CACHE_KEY) {
            Ok(Some(cached)) => {
                tracing::debug!("Serving geolocation from cache");
                return cached;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Cache lookup failed: {}", e),
        }

        let data = self.request().await;

        // Always 24 hours; the configured ttl_ms does not apply on this path.
        if let Err(e) = self.cache.save_to_storage(
            self.config.save_to_local_storage,
            self.config.save_to_session_storage,
            CACHE_KEY,
            &data,
            DEFAULT_TTL_MS,
        ) {
            tracing::warn!("Failed to cache geolocation: {}", e);
        }

        data
    }

    /// Query the provider once, bypassing the cache.
    #[instrument(skip(self), level = "info")]
    pub async fn request(&self) -> GeolocationResult {
        let url = format!(
            "{}?{}",
            self.endpoints.geolocation_url,
            self.build_geolocation_url_params()
        );

        match self.send_lookup(&url).await {
            Ok(result) => result,
            Err(e) => {
                let message = e.to_string();
                let err = e.into_network_error();
                tracing::error!(error = %err, "Error making request");
                GeolocationResult::Transport(TransportError::new(message))
            }
        }
    }

    async fn send_lookup(&self, url: &str) -> Result<GeolocationResult, reqwest::Error> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: Value = response.json().await?;
            let error_message = body.get("message").filter(|m| !m.is_null()).cloned();
            tracing::error!(
                status = status.as_u16(),
                message = ?error_message,
                "Error making request"
            );
            return Ok(GeolocationResult::Provider(ProviderError {
                error_status: status.as_u16(),
                error_message,
            }));
        }

        Ok(GeolocationResult::Location(response.json().await?))
    }

    /// Best-effort daily ping. Never fails; a 200 marks the day as done.
    #[instrument(skip(self), level = "debug")]
    pub async fn warm_up(&self) {
        tracing::debug!("Fetching geolocation data");

        match self.cache.get_item_with_expiration::<bool>(WARM_UP_KEY) {
            Ok(Some(true)) => return,
            Ok(_) => {}
            Err(e) => tracing::debug!("Warm-up marker unreadable: {}", e),
        }

        let response = match self
            .warm_up_client
            .get(&self.endpoints.warm_up_url)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!("Warm-up request failed: {}", e);
                return;
            }
        };

        if response.status() == StatusCode::OK {
            if let Err(e) = self
                .cache
                .set_item_with_expiration(WARM_UP_KEY, &true, WARM_UP_TTL_MS)
            {
                tracing::debug!("Failed to record warm-up: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use ipgeo_storage::MemoryStore;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, config: ClientConfig) -> IpGeolocationClient {
        let endpoints = EndpointConfig {
            geolocation_url: format!("{}/ipgeo", server.uri()),
            warm_up_url: format!("{}/task", server.uri()),
        };
        IpGeolocationClient::with_endpoints(
            config,
            endpoints,
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_request_success_returns_body_verbatim() {
        let mock_server = MockServer::start().await;
        let body = json!({"ip": "8.8.8.8", "country_name": "United States", "time_zone": {"offset": -8}});

        Mock::given(method("GET"))
            .and(path("/ipgeo"))
            .and(query_param("apiKey", "test_key"))
            .and(query_param("ip", "8.8.8.8"))
            .and(query_param("fields", "*"))
            .and(header("Accept", "application/json"))
            .and(header("Content-Type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(
            &mock_server,
            ClientConfig {
                api_key: Some("test_key".into()),
                ip_address: "8.8.8.8".into(),
                ..ClientConfig::default()
            },
        );

        assert_eq!(client.request().await, GeolocationResult::Location(body));
    }

    #[tokio::test]
    async fn test_request_provider_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ipgeo"))
            .respond_with(
                ResponseTemplate::new(429).set_body_json(json!({"message": "rate limited"})),
            )
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server, ClientConfig::default());

        assert_eq!(
            client.request().await,
            GeolocationResult::Provider(ProviderError {
                error_status: 429,
                error_message: Some(json!("rate limited")),
            })
        );
    }

    #[tokio::test]
    async fn test_request_provider_error_without_message() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ipgeo"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"status": 401})))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server, ClientConfig::default());

        assert_eq!(
            client.request().await,
            GeolocationResult::Provider(ProviderError {
                error_status: 401,
                error_message: None,
            })
        );
    }

    #[tokio::test]
    async fn test_request_unparseable_error_body_is_transport() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ipgeo"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server, ClientConfig::default());

        let result = client.request().await;
        assert!(matches!(result, GeolocationResult::Transport(ref e) if !e.message.is_empty()));
    }

    #[tokio::test]
    async fn test_request_malformed_success_body_is_transport() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ipgeo"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{truncated"))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server, ClientConfig::default());

        assert!(matches!(client.request().await, GeolocationResult::Transport(_)));
    }

    #[tokio::test]
    async fn test_warm_up_marks_day_on_200() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/task"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server, ClientConfig::default());
        client.warm_up().await;
        client.warm_up().await;

        let marker: Option<bool> = client.cache.get_item_with_expiration(WARM_UP_KEY).unwrap();
        assert_eq!(marker, Some(true));
    }

    #[tokio::test]
    async fn test_warm_up_non_200_is_retried_next_call() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/task"))
            .respond_with(ResponseTemplate::new(204))
            .expect(2)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server, ClientConfig::default());
        client.warm_up().await;
        client.warm_up().await;

        let marker: Option<bool> = client.cache.get_item_with_expiration(WARM_UP_KEY).unwrap();
        assert_eq!(marker, None);
    }

    #[tokio::test]
    async fn test_request_provider_error_keeps_message_type() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ipgeo"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"message": 42})))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server, ClientConfig::default());

        assert_eq!(
            client.request().await,
            GeolocationResult::Provider(ProviderError {
                error_status: 400,
                error_message: Some(json!(42)),
            })
        );
    }

    #[tokio::test]
    async fn test_request_null_message_is_omitted() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ipgeo"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": null})))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server, ClientConfig::default());

        assert_eq!(
            client.request().await,
            GeolocationResult::Provider(ProviderError {
                error_status: 404,
                error_message: None,
            })
        );
    }

    #[tokio::test]
    async fn test_warm_up_sends_no_user_agent() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/task"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ipgeo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ip": "8.8.8.8"})))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server, ClientConfig::default());
        client.get_geolocation().await;

        let requests = mock_server.received_requests().await.unwrap();
        let warm_up = requests.iter().find(|r| r.url.path() == "/task").unwrap();
        let lookup = requests.iter().find(|r| r.url.path() == "/ipgeo").unwrap();

        assert!(warm_up.headers.get("user-agent").is_none());
        assert!(warm_up.headers.get("content-type").is_none());
        assert_eq!(
            lookup.headers.get("user-agent").unwrap().to_str().unwrap(),
            USER_AGENT
        );
    }
}
