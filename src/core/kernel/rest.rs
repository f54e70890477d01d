use crate::core::errors::PelagosError;
use crate::core::kernel::policy::{run_with_retry, RetryPolicy};
use async_trait::async_trait;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{instrument, trace};

/// REST client trait for venue HTTP calls.
///
/// Authentication happens before this layer: authenticated POST bodies are
/// already signed envelopes by the time they reach the transport, which
/// only delivers, retries and classifies.
#[async_trait]
pub trait RestClient: Send + Sync {
    /// Make a GET request, returning the response body as a JSON value.
    async fn get(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
    ) -> Result<Value, PelagosError>;

    /// Make a GET request with strongly-typed response.
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
    ) -> Result<T, PelagosError>;

    /// Make a POST request with a JSON body.
    async fn post(&self, endpoint: &str, body: &Value) -> Result<Value, PelagosError>;

    /// Make a POST request with strongly-typed response.
    async fn post_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &Value,
    ) -> Result<T, PelagosError>;
}

/// Configuration for the REST client.
#[derive(Clone, Debug)]
pub struct RestClientConfig {
    /// Base URL for the API, without trailing slash.
    pub base_url: String,
    /// Request timeout in seconds; an expired deadline aborts the in-flight
    /// attempt and counts against the retry budget.
    pub timeout_seconds: u64,
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Base backoff delay in milliseconds (doubles per retry).
    pub retry_base_delay_ms: u64,
    /// User agent string to include in requests.
    pub user_agent: String,
}

impl RestClientConfig {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            timeout_seconds: 30,
            max_retries: 3,
            retry_base_delay_ms: 1_000,
            user_agent: "pelagos-rs/0.1".to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_base_delay(mut self, delay_ms: u64) -> Self {
        self.retry_base_delay_ms = delay_ms;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// Implementation of [`RestClient`] using reqwest.
#[derive(Clone, Debug)]
pub struct ReqwestRest {
    client: Client,
    config: RestClientConfig,
    policy: RetryPolicy,
}

impl ReqwestRest {
    pub fn new(config: RestClientConfig) -> Result<Self, PelagosError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                PelagosError::Network(format!("failed to build HTTP client: {}", e))
            })?;

        let policy = RetryPolicy::new(
            config.max_retries,
            Duration::from_millis(config.retry_base_delay_ms),
        );

        Ok(Self {
            client,
            config,
            policy,
        })
    }

    fn build_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.config.base_url, endpoint)
    }

    /// One attempt: send, classify the outcome.
    async fn attempt(
        &self,
        method: Method,
        endpoint: &str,
        query_params: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value, PelagosError> {
        let url = self.build_url(endpoint);
        let mut request = self.client.request(method, &url);

        for (key, value) in query_params {
            request = request.query(&[(key, value)]);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(classify_send_error)?;
        handle_response(response).await
    }

    /// Deliver a request through the retry loop. Retries of one logical
    /// request are strictly sequential; distinct requests are independent.
    #[instrument(skip(self, body), fields(endpoint = %endpoint))]
    async fn request_with_retry(
        &self,
        method: Method,
        endpoint: &str,
        query_params: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value, PelagosError> {
        run_with_retry(&self.policy, || {
            self.attempt(method.clone(), endpoint, query_params, body)
        })
        .await
    }
}

#[async_trait]
impl RestClient for ReqwestRest {
    #[instrument(skip(self, query_params), fields(endpoint = %endpoint, param_count = query_params.len()))]
    async fn get(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
    ) -> Result<Value, PelagosError> {
        self.request_with_retry(Method::GET, endpoint, query_params, None)
            .await
    }

    #[instrument(skip(self, query_params), fields(endpoint = %endpoint, param_count = query_params.len()))]
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
    ) -> Result<T, PelagosError> {
        self.request_with_retry(Method::GET, endpoint, query_params, None)
            .await
            .and_then(|value| {
                serde_json::from_value(value).map_err(|e| {
                    PelagosError::Deserialization(format!("failed to deserialize JSON: {}", e))
                })
            })
    }

    #[instrument(skip(self, body), fields(endpoint = %endpoint))]
    async fn post(&self, endpoint: &str, body: &Value) -> Result<Value, PelagosError> {
        self.request_with_retry(Method::POST, endpoint, &[], Some(body))
            .await
    }

    #[instrument(skip(self, body), fields(endpoint = %endpoint))]
    async fn post_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &Value,
    ) -> Result<T, PelagosError> {
        self.request_with_retry(Method::POST, endpoint, &[], Some(body))
            .await
            .and_then(|value| {
                serde_json::from_value(value).map_err(|e| {
                    PelagosError::Deserialization(format!("failed to deserialize JSON: {}", e))
                })
            })
    }
}

fn classify_send_error(error: reqwest::Error) -> PelagosError {
    if error.is_timeout() {
        PelagosError::Timeout(format!("request deadline exceeded: {}", error))
    } else {
        PelagosError::Network(format!("request failed: {}", error))
    }
}

async fn handle_response(response: Response) -> Result<Value, PelagosError> {
    let status = response.status();

    if status.as_u16() == 429 {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        // drain the body so the connection can be reused
        let _ = response.text().await;
        return Err(PelagosError::RateLimited { retry_after });
    }

    let body = response
        .text()
        .await
        .map_err(|e| PelagosError::Network(format!("failed to read response body: {}", e)))?;

    trace!(status = status.as_u16(), "response body: {}", body);

    if status.is_success() {
        serde_json::from_str(&body).map_err(|e| {
            PelagosError::Deserialization(format!("failed to parse JSON response: {}", e))
        })
    } else if status.as_u16() == 401 || status.as_u16() == 403 {
        Err(PelagosError::Authentication(body))
    } else {
        Err(PelagosError::Api {
            status: status.as_u16(),
            body,
        })
    }
}
