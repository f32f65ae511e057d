//! Display state for fetched repositories.
//!
//! Two views are offered:
//! 1. `list_items`: one item per identifier in the store, fetched concurrently
//!    and returned in store order.
//! 2. `Dashboard`: a board hydrated once from the archive (newest first) onto
//!    which live submissions are pushed at the head. Entries move from
//!    `Loading` to `Success` or `Error` exactly once and are never removed.
//!
//! In both views a record that came from an upstream call is appended to the
//! archive after the fetch completes. Cached results are not archived again.

use crate::archive::Archive;
use crate::fetcher::{FetchError, RepoFetcher};
use crate::record::RepoRecord;
use crate::store::RepoListStore;
use crate::types::RepoIdentifier;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ItemState {
    Loading,
    Success { record: RepoRecord },
    Error { error: String },
}

impl ItemState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ItemState::Loading)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct RepoItem {
    pub identifier: RepoIdentifier,
    #[serde(flatten)]
    pub state: ItemState,
}

/// Fetches `identifier` and archives the record if it came from upstream.
///
/// Archiving failures are logged; the fetched record is still returned. A repeat
/// fetch served from the cache is not archived again, so the same repository only
/// shows up twice in the archive once its cache entry has expired.
pub async fn fetch_and_archive(
    fetcher: &RepoFetcher,
    archive: &Archive,
    identifier: &RepoIdentifier,
) -> Result<RepoRecord, FetchError> {
    let fetched = fetcher.fetch(identifier).await?;

    if fetched.fresh {
        match archive.append(fetched.record.clone()).await {
            Ok(len) => tracing::debug!(repo = %identifier, records = len, "Archived repository"),
            Err(e) => tracing::error!(repo = %identifier, "Failed to archive repository: {}", e),
        }
    }

    Ok(fetched.record)
}

/// Resolves one item per identifier in `store`, in store order.
pub async fn list_items(
    store: &RepoListStore,
    fetcher: &RepoFetcher,
    archive: &Archive,
    concurrency_limit: usize,
) -> Vec<RepoItem> {
    stream::iter(store.repos())
        .map(|identifier| async move {
            let state = match fetch_and_archive(fetcher, archive, &identifier).await {
                Ok(record) => ItemState::Success { record },
                Err(e) => ItemState::Error {
                    error: e.to_string(),
                },
            };
            RepoItem { identifier, state }
        })
        .buffered(concurrency_limit.max(1))
        .collect()
        .await
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntrySource {
    Archive,
    Live,
}

#[derive(Clone, Debug, Serialize)]
pub struct DashboardEntry {
    pub id: u64,
    pub source: EntrySource,
    /// Absent for entries read back from the archive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<RepoIdentifier>,
    #[serde(flatten)]
    pub state: ItemState,
    pub updated_at: DateTime<Utc>,
}

/// Newest-first board of archived and live entries.
#[derive(Debug, Default)]
pub struct Dashboard {
    entries: RwLock<Vec<DashboardEntry>>,
    next_id: AtomicU64,
}

impl Dashboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Loads the archive once and lists its records below any live entries.
    ///
    /// Returns how many records were loaded. An unreadable archive loads nothing.
    pub async fn hydrate(&self, archive: &Archive) -> usize {
        let records = match archive.load_newest_first().await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Could not hydrate dashboard from archive: {}", e);
                return 0;
            }
        };

        let now = Utc::now();
        let archived: Vec<DashboardEntry> = records
            .into_iter()
            .map(|record| DashboardEntry {
                id: self.allocate_id(),
                source: EntrySource::Archive,
                identifier: None,
                state: ItemState::Success { record },
                updated_at: now,
            })
            .collect();

        let count = archived.len();
        self.entries.write().extend(archived);
        tracing::info!(records = count, "Dashboard hydrated from archive");
        count
    }

    /// Pushes a `Loading` entry for `identifier` at the head and returns its id.
    pub fn begin(&self, identifier: RepoIdentifier) -> u64 {
        let id = self.allocate_id();
        let entry = DashboardEntry {
            id,
            source: EntrySource::Live,
            identifier: Some(identifier),
            state: ItemState::Loading,
            updated_at: Utc::now(),
        };
        self.entries.write().insert(0, entry);
        id
    }

    /// Fetches the entry's repository and moves it to its terminal state.
    pub async fn resolve(
        &self,
        entry_id: u64,
        identifier: &RepoIdentifier,
        fetcher: &RepoFetcher,
        archive: &Archive,
    ) {
        let state = match fetch_and_archive(fetcher, archive, identifier).await {
            Ok(record) => ItemState::Success { record },
            Err(e) => ItemState::Error {
                error: e.to_string(),
            },
        };
        self.finish(entry_id, state);
    }

    fn finish(&self, entry_id: u64, state: ItemState) {
        let mut entries = self.entries.write();
        match entries.iter_mut().find(|entry| entry.id == entry_id) {
            Some(entry) if !entry.state.is_terminal() => {
                entry.state = state;
                entry.updated_at = Utc::now();
            }
            Some(_) => tracing::warn!(entry_id, "Dashboard entry already resolved"),
            None => tracing::warn!(entry_id, "Unknown dashboard entry"),
        }
    }

    /// Snapshot of every entry, newest first.
    pub fn entries(&self) -> Vec<DashboardEntry> {
        self.entries.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::fetcher::RepoSource;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Answers `missing/*` with a 404 and everything else with a record.
    /// Identifiers under `slow/` take longer so completion order differs from submission order.
    struct FakeSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RepoSource for FakeSource {
        async fn fetch_repo(&self, identifier: &RepoIdentifier) -> Result<RepoRecord, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if identifier.as_str().starts_with("slow/") {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            if identifier.as_str().starts_with("missing/") {
                return Err(FetchError::Upstream {
                    message: "Not Found".to_string(),
                });
            }
            Ok(RepoRecord::from_value(json!({
                "full_name": identifier.as_str(),
                "description": "fake",
                "stargazers_count": 3,
                "forks_count": 2,
                "html_url": format!("https://github.com/{identifier}"),
            }))
            .unwrap())
        }
    }

    struct Fixture {
        _dir: TempDir,
        source: Arc<FakeSource>,
        fetcher: RepoFetcher,
        archive: Archive,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(FakeSource {
            calls: AtomicUsize::new(0),
        });
        let fetcher = RepoFetcher::new(&AppConfig::default(), source.clone());
        let archive = Archive::new(dir.path().join("repoData.json"));
        Fixture {
            _dir: dir,
            source,
            fetcher,
            archive,
        }
    }

    fn id(s: &str) -> RepoIdentifier {
        RepoIdentifier::parse(s).unwrap()
    }

    fn full_name(state: &ItemState) -> Option<&str> {
        match state {
            ItemState::Success { record } => record.full_name(),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_list_items_follows_store_order() {
        let fx = fixture();
        let store = RepoListStore::new();
        store.add_repo(id("a/a"));
        store.add_repo(id("slow/b"));
        store.add_repo(id("missing/c"));

        let items = list_items(&store, &fx.fetcher, &fx.archive, 4).await;

        assert_eq!(items.len(), 3);
        assert!(matches!(items[0].state, ItemState::Error { .. }));
        assert_eq!(full_name(&items[1].state), Some("slow/b"));
        assert_eq!(full_name(&items[2].state), Some("a/a"));
        // A failed fetch leaves the list untouched.
        assert_eq!(store.repos(), vec![id("missing/c"), id("slow/b"), id("a/a")]);
    }

    #[tokio::test]
    async fn test_list_items_archives_only_fresh_fetches() {
        let fx = fixture();
        let store = RepoListStore::new();
        store.add_repo(id("a/a"));

        list_items(&store, &fx.fetcher, &fx.archive, 4).await;
        list_items(&store, &fx.fetcher, &fx.archive, 4).await;

        assert_eq!(fx.source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fx.archive.load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_hydrate_lists_archive_newest_first() {
        let fx = fixture();
        for name in ["old/one", "new/two"] {
            fx.archive
                .append(RepoRecord::from_value(json!({ "full_name": name })).unwrap())
                .await
                .unwrap();
        }
        let dashboard = Dashboard::new();

        assert_eq!(dashboard.hydrate(&fx.archive).await, 2);

        let entries = dashboard.entries();
        assert_eq!(full_name(&entries[0].state), Some("new/two"));
        assert_eq!(full_name(&entries[1].state), Some("old/one"));
        assert!(entries.iter().all(|e| e.source == EntrySource::Archive));
    }

    #[tokio::test]
    async fn test_live_entry_goes_from_loading_to_success() {
        let fx = fixture();
        fx.archive
            .append(RepoRecord::from_value(json!({ "full_name": "a/a" })).unwrap())
            .await
            .unwrap();
        let dashboard = Dashboard::new();
        dashboard.hydrate(&fx.archive).await;

        let entry_id = dashboard.begin(id("a/a"));
        assert_eq!(dashboard.entries()[0].state, ItemState::Loading);

        dashboard
            .resolve(entry_id, &id("a/a"), &fx.fetcher, &fx.archive)
            .await;

        let entries = dashboard.entries();
        // The archived copy and the live copy are both shown.
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].source, EntrySource::Live);
        assert_eq!(full_name(&entries[0].state), Some("a/a"));
        assert_eq!(full_name(&entries[1].state), Some("a/a"));
        assert_eq!(fx.archive.load().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_entry_is_terminal_error() {
        let fx = fixture();
        let dashboard = Dashboard::new();

        let entry_id = dashboard.begin(id("missing/x"));
        dashboard
            .resolve(entry_id, &id("missing/x"), &fx.fetcher, &fx.archive)
            .await;

        let entries = dashboard.entries();
        assert!(matches!(entries[0].state, ItemState::Error { .. }));
        assert!(entries[0].state.is_terminal());
        assert!(fx.archive.load().await.unwrap().is_empty());

        // A second resolution does not overwrite the terminal state.
        dashboard.finish(entry_id, ItemState::Loading);
        assert!(dashboard.entries()[0].state.is_terminal());
    }

    #[test]
    fn test_item_serialization_shape() {
        let item = RepoItem {
            identifier: id("a/a"),
            state: ItemState::Error {
                error: "boom".to_string(),
            },
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json, json!({"identifier": "a/a", "status": "error", "error": "boom"}));
    }
}
