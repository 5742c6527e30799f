//! Command-line interface parsing for newsdesk
//!
//! This module handles parsing of CLI arguments using clap and turns them into a
//! validated [`Config`] plus the command to run.

use clap::{Args, Parser, Subcommand};
use reqwest::Method;
use std::time::Duration;
use thiserror::Error;

use crate::config::{CacheConfig, Config, ConfigError, RetryConfig, DEFAULT_BASE_URL};
use crate::feed::ArticleQuery;

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// A tuning value failed validation
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The HTTP method name is not a valid token
    #[error("Invalid method: '{0}'")]
    InvalidMethod(String),

    /// The request body is not JSON
    #[error("Invalid JSON body: {0}")]
    InvalidBody(#[from] serde_json::Error),
}

/// newsdesk - read and update the news API with retries and a short-lived cache
#[derive(Parser, Debug)]
#[command(name = "newsdesk")]
#[command(about = "Resilient, cached access to the news site API")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub tuning: Tuning,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command
#[derive(Args, Debug)]
pub struct Tuning {
    /// Root url of the news API
    #[arg(long, global = true, env = "NEWSDESK_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Total attempts per request
    #[arg(long, global = true, env = "NEWSDESK_ATTEMPTS", default_value_t = 3)]
    pub attempts: u32,

    /// Time limit for each attempt, in milliseconds
    #[arg(long, global = true, env = "NEWSDESK_TIMEOUT_MS", default_value_t = 5000)]
    pub timeout_ms: u64,

    /// Wait after the first failed attempt, in milliseconds; doubles each retry
    #[arg(long, global = true, env = "NEWSDESK_BACKOFF_MS", default_value_t = 500)]
    pub backoff_ms: u64,

    /// How long a cached list stays fresh, in seconds
    #[arg(long, global = true, env = "NEWSDESK_CACHE_TTL_SECS", default_value_t = 60)]
    pub cache_ttl_secs: u64,

    /// Report every failed attempt
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// What to do
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Request an arbitrary url and print the JSON response
    Fetch {
        url: String,

        /// HTTP method
        #[arg(long, default_value = "GET")]
        method: String,

        /// JSON request body
        #[arg(long)]
        body: Option<String>,
    },

    /// List articles
    ///
    /// Examples:
    ///   newsdesk articles --locale es
    ///   newsdesk articles --home --locale en
    ///   newsdesk articles --tag politics --page 2
    Articles {
        #[arg(long)]
        locale: Option<String>,

        #[arg(long)]
        tag: Option<String>,

        /// Only articles shown on the home page
        #[arg(long)]
        home: bool,

        #[arg(long)]
        page: Option<u32>,

        #[arg(long)]
        limit: Option<u32>,
    },

    /// Show or hide an article on the home page
    ShowOnHome {
        id: String,

        #[arg(long, conflicts_with = "off", required_unless_present = "off")]
        on: bool,

        #[arg(long)]
        off: bool,
    },
}

/// A command with its arguments checked
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Fetch {
        url: String,
        method: Method,
        body: Option<serde_json::Value>,
    },
    Articles(ArticleQuery),
    ShowOnHome {
        id: String,
        show: bool,
    },
}

/// Configuration derived from CLI arguments for application startup
#[derive(Debug, Clone, PartialEq)]
pub struct StartupConfig {
    pub config: Config,
    pub action: Action,
    pub verbose: bool,
}

/// Parses an HTTP method name, case-insensitively
pub fn parse_method_arg(s: &str) -> Result<Method, CliError> {
    Method::from_bytes(s.to_ascii_uppercase().as_bytes())
        .map_err(|_| CliError::InvalidMethod(s.to_string()))
}

impl Tuning {
    /// The configuration these options describe, validated
    pub fn to_config(&self) -> Result<Config, CliError> {
        let config = Config {
            base_url: self.base_url.clone(),
            retry: RetryConfig {
                max_attempts: self.attempts,
                timeout: Duration::from_millis(self.timeout_ms),
                base_delay: Duration::from_millis(self.backoff_ms),
                verbose: self.verbose,
                ..RetryConfig::default()
            },
            cache: CacheConfig {
                ttl: Duration::from_secs(self.cache_ttl_secs),
            },
        };
        config.validate()?;
        Ok(config)
    }
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(StartupConfig)` with validated settings
    /// * `Err(CliError)` if a value is out of range or a body is not JSON
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let config = cli.tuning.to_config()?;

        let action = match &cli.command {
            Command::Fetch { url, method, body } => Action::Fetch {
                url: url.clone(),
                method: parse_method_arg(method)?,
                body: body
                    .as_deref()
                    .map(serde_json::from_str::<serde_json::Value>)
                    .transpose()?,
            },
            Command::Articles {
                locale,
                tag,
                home,
                page,
                limit,
            } => Action::Articles(ArticleQuery {
                locale: locale.clone(),
                tag: tag.clone(),
                show_on_home: home.then_some(true),
                page: *page,
                limit: *limit,
            }),
            Command::ShowOnHome { id, on, .. } => Action::ShowOnHome {
                id: id.clone(),
                show: *on,
            },
        };

        Ok(StartupConfig {
            config,
            action,
            verbose: cli.tuning.verbose,
        })
    }
}
