//! newsdesk - resilient, cached access to the news site API
//!
//! Reads article lists through a short-lived query cache, retries failing
//! requests with exponential backoff, and invalidates the cache after writes.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde_json::Value;
use tracing::error;

use newsdesk::cache::QueryCache;
use newsdesk::cli::{Action, Cli, StartupConfig};
use newsdesk::feed::NewsFeed;
use newsdesk::fetch::{RequestOptions, ResilientFetcher};
use newsdesk::logging;

/// Runs the requested action and returns the JSON to print
async fn run(startup: StartupConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let config = startup.config;
    let fetcher = ResilientFetcher::with_policy(config.retry.policy());
    let cache = Arc::new(QueryCache::with_ttl(config.cache.ttl));
    let feed = NewsFeed::new(config.base_url, fetcher.clone(), cache);

    let output = match startup.action {
        Action::Fetch { url, method, body } => {
            let options = RequestOptions {
                method,
                body,
                ..RequestOptions::default()
            };
            fetcher.fetch(&url, &options).await?
        }
        Action::Articles(query) => feed.list_articles(&query).await?,
        Action::ShowOnHome { id, show } => feed.set_show_on_home(&id, show).await?,
    };

    Ok(output)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let startup = match StartupConfig::from_cli(&cli) {
        Ok(startup) => startup,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(2);
        }
    };

    logging::init(startup.verbose);

    match run(startup).await {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("failed to render response: {}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
