//! Keyed, deduplicating fetches of repository records.
//!
//! `RepoFetcher` sits in front of a `RepoSource` and makes sure an identifier
//! reaches upstream at most once while a result is in flight or cached.
//! Concurrent callers for the same identifier wait on the same call. Failures
//! are not cached, so the next call for that identifier tries again.

use crate::config::AppConfig;
use crate::record::RepoRecord;
use crate::types::RepoIdentifier;
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use thiserror::Error;

/// Why a single repository could not be fetched.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The upstream could not be reached or the request failed in transit.
    #[error("request failed: {0}")]
    Transport(String),
    /// The upstream answered with a non-success status.
    #[error("GitHub responded with an error: {message}")]
    Upstream { message: String },
    /// The upstream answered but the body was not a repository object.
    #[error("malformed repository payload: {0}")]
    Malformed(String),
    /// The identifier cannot be turned into a repository path.
    #[error("invalid repository identifier: {0}")]
    InvalidIdentifier(String),
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::Upstream { message } if message.to_lowercase().contains("not found"))
    }
}

/// One upstream call per invocation, no caching.
#[async_trait]
pub trait RepoSource: Send + Sync {
    async fn fetch_repo(&self, identifier: &RepoIdentifier) -> Result<RepoRecord, FetchError>;
}

/// The outcome of a successful fetch.
#[derive(Clone, Debug)]
pub struct Fetched {
    pub record: RepoRecord,
    /// True when this call went upstream, false when it was served from the cache
    /// or from another caller's in-flight request.
    pub fresh: bool,
}

#[derive(Clone)]
pub struct RepoFetcher {
    cache: Cache<RepoIdentifier, RepoRecord>,
    source: Arc<dyn RepoSource>,
}

impl RepoFetcher {
    pub fn new(config: &AppConfig, source: Arc<dyn RepoSource>) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.cache_max_capacity)
            .time_to_live(config.cache_ttl())
            .build();

        Self { cache, source }
    }

    /// Retrieves the record for `identifier`, going upstream only on a cache miss (read-through).
    pub async fn fetch(&self, identifier: &RepoIdentifier) -> Result<Fetched, FetchError> {
        let source = self.source.clone();
        let key = identifier.clone();

        let entry = self
            .cache
            .entry(identifier.clone())
            .or_try_insert_with(async move { source.fetch_repo(&key).await })
            .await
            .map_err(|e: Arc<FetchError>| {
                tracing::warn!(repo = %identifier, "Fetch failed: {}", e);
                (*e).clone()
            })?;

        let fresh = entry.is_fresh();
        if fresh {
            tracing::info!(repo = %identifier, "Fetched repository from upstream");
        } else {
            tracing::debug!(repo = %identifier, "Serving repository from cache");
        }

        Ok(Fetched {
            record: entry.into_value(),
            fresh,
        })
    }
}
