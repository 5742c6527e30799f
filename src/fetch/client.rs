//! HTTP client that retries failed requests
//!
//! Wraps a `reqwest::Client` with the retry loop from [`super::retry`]. Every
//! attempt asks intermediaries not to serve a cached response, and a response
//! only counts as a success once its body has been parsed as JSON.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CACHE_CONTROL, PRAGMA};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use super::error::{FetchError, RetryFailure};
use super::retry::{retry_with_backoff, RetryPolicy};

/// Method, headers and body of a request; defaults to a bare GET
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    /// JSON body, sent with `Content-Type: application/json`
    pub body: Option<serde_json::Value>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

impl RequestOptions {
    /// A GET request
    pub fn get() -> Self {
        Self::default()
    }

    /// A POST request carrying `body` as JSON
    pub fn post_json<B: Serialize>(body: &B) -> Result<Self, FetchError> {
        Ok(Self {
            method: Method::POST,
            headers: HeaderMap::new(),
            body: Some(serde_json::to_value(body)?),
        })
    }

    /// Sets the method
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Adds a header
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Client for requests that must survive transient failures
#[derive(Debug, Clone)]
pub struct ResilientFetcher {
    client: Client,
    policy: RetryPolicy,
}

impl Default for ResilientFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ResilientFetcher {
    /// Create a fetcher with the default policy: 3 attempts, 5s per attempt,
    /// 500ms backoff doubling each retry
    pub fn new() -> Self {
        Self::with_policy(RetryPolicy::default())
    }

    /// Create a fetcher with a custom retry policy
    pub fn with_policy(policy: RetryPolicy) -> Self {
        Self {
            client: Client::new(),
            policy,
        }
    }

    /// Create a fetcher with a custom HTTP client
    pub fn with_client(client: Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// The policy applied by [`ResilientFetcher::fetch`]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch `url` with this fetcher's policy and parse the JSON body
    ///
    /// # Returns
    /// * `Ok(T)` - The body of the first successful attempt
    /// * `Err(FetchError)` - The last attempt's error once every attempt failed
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> Result<T, FetchError> {
        self.fetch_with_policy(url, options, &self.policy)
            .await
            .map_err(RetryFailure::into_last)
    }

    /// Fetch `url` with explicit attempt count, timeout and verbosity
    ///
    /// The backoff delay and factor come from this fetcher's policy.
    ///
    /// # Arguments
    /// * `url` - Resource to request; must not be empty
    /// * `options` - Method, headers and body
    /// * `max_attempts` - Total attempts; values below 1 mean a single attempt
    /// * `timeout_ms` - Time limit for each attempt; zero is rejected with
    ///   [`FetchError::InvalidTimeout`] before any request is sent
    /// * `verbose` - Report failed attempts at warn level
    pub async fn fetch_with_retry<T: DeserializeOwned>(
        &self,
        url: &str,
        options: &RequestOptions,
        max_attempts: u32,
        timeout_ms: u64,
        verbose: bool,
    ) -> Result<T, FetchError> {
        let policy = RetryPolicy {
            max_attempts,
            timeout: Duration::from_millis(timeout_ms),
            verbose,
            ..self.policy
        };
        self.fetch_with_policy(url, options, &policy)
            .await
            .map_err(RetryFailure::into_last)
    }

    /// Like [`ResilientFetcher::fetch`], but a failure keeps every attempt's error
    pub async fn fetch_with_history<T: DeserializeOwned>(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> Result<T, RetryFailure> {
        self.fetch_with_policy(url, options, &self.policy).await
    }

    async fn fetch_with_policy<T: DeserializeOwned>(
        &self,
        url: &str,
        options: &RequestOptions,
        policy: &RetryPolicy,
    ) -> Result<T, RetryFailure> {
        if url.trim().is_empty() {
            return Err(RetryFailure {
                last: FetchError::InvalidUrl(url.to_string()),
                history: Vec::new(),
            });
        }
        if policy.timeout.is_zero() {
            return Err(RetryFailure {
                last: FetchError::InvalidTimeout,
                history: Vec::new(),
            });
        }

        debug!(method = %options.method, url, "fetching");
        retry_with_backoff(policy, move |_| self.attempt(url, options)).await
    }

    /// One request: send, check status, read and parse the body
    async fn attempt<T: DeserializeOwned>(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> Result<T, FetchError> {
        let mut request = self
            .client
            .request(options.method.clone(), url)
            .headers(options.headers.clone())
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache");
        if let Some(body) = &options.body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status,
                url: url.to_string(),
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
