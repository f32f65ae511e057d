use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Minimum number of characters a submitted identifier must have.
pub const MIN_IDENTIFIER_LEN: usize = 3;

/// Rejection raised at the submission boundary, before anything reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Repository name must be at least {MIN_IDENTIFIER_LEN} characters.")]
    TooShort,
}

/// An `owner/name` string as submitted by a user.
///
/// Only the length is checked; anything longer than two characters is accepted
/// and a bad identifier surfaces later as a failed fetch.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoIdentifier(String);

impl RepoIdentifier {
    pub fn parse(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        if raw.chars().count() < MIN_IDENTIFIER_LEN {
            return Err(ValidationError::TooShort);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segment used against the upstream API.
    ///
    /// Trimmed and stripped of `..` so an identifier cannot walk to another endpoint.
    /// `None` when the identifier carries a query or fragment, which would change the
    /// request rather than name a repository.
    pub fn upstream_path(&self) -> Option<String> {
        if self.0.contains(|c: char| c == '?' || c == '#') {
            return None;
        }
        Some(format!("/repos/{}", self.0.trim().replace("..", "")))
    }
}

impl TryFrom<String> for RepoIdentifier {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<RepoIdentifier> for String {
    fn from(value: RepoIdentifier) -> Self {
        value.0
    }
}

impl fmt::Display for RepoIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
