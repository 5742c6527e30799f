//! Runtime configuration for fetching and caching
//!
//! Defaults match the behaviour the site was built around: 3 attempts, 5 seconds
//! per attempt, 500ms backoff doubling each retry, and a 60 second cache TTL.
//! Values are checked once at the boundary by [`Config::validate`].

use std::time::Duration;
use thiserror::Error;

use crate::fetch::{
    RetryPolicy, DEFAULT_BACKOFF_FACTOR, DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_TIMEOUT_MS,
};

/// Default TTL for cached query results in seconds
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60;

/// Default location of the news API
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Errors for configuration values that cannot be used
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max attempts must be at least 1")]
    ZeroAttempts,

    #[error("timeout must be greater than zero")]
    ZeroTimeout,

    #[error("backoff factor must be at least 1")]
    ZeroBackoffFactor,

    #[error("cache TTL must be greater than zero")]
    ZeroTtl,

    #[error("base url must start with http:// or https://, got '{0}'")]
    InvalidBaseUrl(String),
}

/// Configuration for retrying requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts per request
    pub max_attempts: u32,
    /// Time limit for a single attempt
    pub timeout: Duration,
    /// Wait after the first failed attempt
    pub base_delay: Duration,
    /// Multiplier applied to the wait after each further failure
    pub backoff_factor: u32,
    /// Whether failed attempts are reported at warn level
    pub verbose: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            verbose: false,
        }
    }
}

impl RetryConfig {
    /// Rejects values the retry loop would otherwise have to paper over
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.backoff_factor == 0 {
            return Err(ConfigError::ZeroBackoffFactor);
        }
        Ok(())
    }

    /// The policy this configuration describes
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            timeout: self.timeout,
            base_delay: self.base_delay,
            backoff_factor: self.backoff_factor,
            verbose: self.verbose,
        }
    }
}

/// Configuration for the query cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long a cached result stays valid
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl.is_zero() {
            return Err(ConfigError::ZeroTtl);
        }
        Ok(())
    }
}

/// Complete runtime configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Root of the news API, without a trailing slash
    pub base_url: String,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Config {
    /// Checks every section, returning the first problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(self.base_url.clone()));
        }
        self.retry.validate()?;
        self.cache.validate()
    }
}
