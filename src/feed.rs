//! News API access with cached reads
//!
//! Reads go through the query cache and fall back to the resilient fetcher on a
//! miss. Writes that change what a cached query would return clear the whole
//! cache once the server has accepted them.

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::cache::{cache_key, QueryCache};
use crate::fetch::{FetchError, RequestOptions, ResilientFetcher};

/// Path of the article list endpoint
const ARTICLES_PATH: &str = "/api/news";

/// Errors returned by the news feed
#[derive(Debug, Error)]
pub enum FeedError {
    /// The request failed after every retry
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Article ids are path segments and cannot be blank or contain '/'
    #[error("Invalid article id: '{0}'")]
    InvalidId(String),
}

/// Filters for the article list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleQuery {
    /// Language of the articles, e.g. "en" or "es"
    pub locale: Option<String>,
    /// Only articles carrying this tag
    pub tag: Option<String>,
    /// Only articles flagged (or not) for the home page
    pub show_on_home: Option<bool>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ArticleQuery {
    /// The home feed in `locale`
    pub fn home(locale: impl Into<String>) -> Self {
        Self {
            locale: Some(locale.into()),
            show_on_home: Some(true),
            ..Self::default()
        }
    }

    /// Query parameters for the set filters
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(locale) = &self.locale {
            params.push(("locale", locale.clone()));
        }
        if let Some(tag) = &self.tag {
            params.push(("tag", tag.clone()));
        }
        if let Some(show) = self.show_on_home {
            params.push(("showOnHome", show.to_string()));
        }
        if let Some(page) = self.page {
            params.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        params
    }
}

/// Body of a "show on home" update
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ShowOnHomeUpdate {
    show_on_home: bool,
}

/// Client for the news API with a shared query cache
#[derive(Debug, Clone)]
pub struct NewsFeed {
    base_url: String,
    fetcher: ResilientFetcher,
    cache: Arc<QueryCache<Value>>,
}

impl NewsFeed {
    /// Creates a feed rooted at `base_url`
    ///
    /// The cache is shared: every clone of the `Arc` sees the same entries, so a
    /// writer holding another handle can invalidate reads made here.
    pub fn new(
        base_url: impl Into<String>,
        fetcher: ResilientFetcher,
        cache: Arc<QueryCache<Value>>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            fetcher,
            cache,
        }
    }

    /// The cache this feed reads through
    pub fn cache(&self) -> &Arc<QueryCache<Value>> {
        &self.cache
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}{}", self.base_url, key)
    }

    /// Cached GET of `path` with `params`
    ///
    /// Returns the cached payload if one younger than the TTL exists; otherwise
    /// fetches, stores and returns a fresh one. Failed fetches are not cached.
    pub async fn get_json(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Value, FeedError> {
        let key = cache_key(path, params);
        if let Some(cached) = self.cache.get(&key) {
            debug!(key = %key, "serving from query cache");
            return Ok(cached);
        }

        let value: Value = self
            .fetcher
            .fetch(&self.url_for(&key), &RequestOptions::get())
            .await?;
        self.cache.set(key, value.clone());
        Ok(value)
    }

    /// Article list matching `query`
    pub async fn list_articles(&self, query: &ArticleQuery) -> Result<Value, FeedError> {
        self.get_json(ARTICLES_PATH, &query.params()).await
    }

    /// Articles flagged for the home page in `locale`
    pub async fn home_articles(&self, locale: &str) -> Result<Value, FeedError> {
        self.list_articles(&ArticleQuery::home(locale)).await
    }

    /// Loads several article lists concurrently so later reads hit the cache
    ///
    /// Returns one result per query, in the same order.
    pub async fn warm(&self, queries: &[ArticleQuery]) -> Vec<Result<Value, FeedError>> {
        join_all(queries.iter().map(|query| self.list_articles(query))).await
    }

    /// Sets whether article `id` appears on the home page
    ///
    /// The cache is cleared only after the server accepts the change, and before
    /// this returns, so no later read can observe the old list from cache.
    pub async fn set_show_on_home(&self, id: &str, show: bool) -> Result<Value, FeedError> {
        if id.trim().is_empty() || id.contains('/') {
            return Err(FeedError::InvalidId(id.to_string()));
        }

        let url = format!("{}{}/{}/show-on-home", self.base_url, ARTICLES_PATH, id);
        let options = RequestOptions::post_json(&ShowOnHomeUpdate { show_on_home: show })?;
        let response: Value = self.fetcher.fetch(&url, &options).await?;

        self.invalidate();
        info!(id, show, "updated show-on-home flag");
        Ok(response)
    }

    /// Drops every cached query result
    pub fn invalidate(&self) {
        self.cache.clear();
    }
}
