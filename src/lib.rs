//! newsdesk library
//!
//! Resilient fetching and short-lived query caching for the news site API,
//! exposed for the binary and for integration tests.

pub mod cache;
pub mod cli;
pub mod config;
pub mod feed;
pub mod fetch;
pub mod logging;
