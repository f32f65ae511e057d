use crate::fetcher::{FetchError, RepoSource};
use crate::record::RepoRecord;
use crate::types::RepoIdentifier;
use async_trait::async_trait;
use octocrab::Octocrab;

/// Unauthenticated client for `GET /repos/{owner}/{name}`.
pub struct GitHubSource {
    octocrab: Octocrab,
}

impl GitHubSource {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let octocrab = Octocrab::builder().base_uri(base_url)?.build()?;
        Ok(Self { octocrab })
    }
}

#[async_trait]
impl RepoSource for GitHubSource {
    async fn fetch_repo(&self, identifier: &RepoIdentifier) -> Result<RepoRecord, FetchError> {
        let route = identifier
            .upstream_path()
            .ok_or_else(|| FetchError::InvalidIdentifier(identifier.to_string()))?;
        tracing::debug!(repo = %identifier, route = %route, "Requesting repository from GitHub");

        let payload: serde_json::Value = self
            .octocrab
            .get(route, None::<&()>)
            .await
            .map_err(map_octocrab_error)?;

        let record =
            RepoRecord::from_value(payload).map_err(|e| FetchError::Malformed(e.to_string()))?;
        // Reject payloads that do not carry the displayed fields.
        record
            .summary()
            .map_err(|e| FetchError::Malformed(e.to_string()))?;

        Ok(record)
    }
}

fn map_octocrab_error(error: octocrab::Error) -> FetchError {
    match error {
        octocrab::Error::GitHub { source, .. } => FetchError::Upstream {
            message: source.message,
        },
        octocrab::Error::Serde { source, .. } => FetchError::Malformed(source.to_string()),
        other => FetchError::Transport(other.to_string()),
    }
}
