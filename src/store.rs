use crate::types::RepoIdentifier;
use parking_lot::RwLock;

/// The identifiers submitted during this process's lifetime, newest first.
///
/// Owned by `AppState` and handed to whoever needs it; nothing is ever removed.
#[derive(Debug, Default)]
pub struct RepoListStore {
    repos: RwLock<Vec<RepoIdentifier>>,
}

impl RepoListStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current list.
    pub fn repos(&self) -> Vec<RepoIdentifier> {
        self.repos.read().clone()
    }

    /// Prepends `identifier`. Duplicates are kept.
    pub fn add_repo(&self, identifier: RepoIdentifier) {
        tracing::debug!(repo = %identifier, "Adding repository to list");
        self.repos.write().insert(0, identifier);
    }

    pub fn len(&self) -> usize {
        self.repos.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.repos.read().is_empty()
    }
}
