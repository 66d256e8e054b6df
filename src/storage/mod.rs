//! Persistence for identities, match records, statistics snapshots and
//! rank history.
//!
//! Two [`Store`] implementations:
//! - [`MemoryStore`]: lock-guarded maps, used for tests and ephemeral runs
//! - [`JsonlStore`]: JSON Lines files under `data_dir/store`

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

pub mod jsonl;
pub mod memory;

pub use jsonl::{JsonlReader, JsonlStore, JsonlWriter};
pub use memory::MemoryStore;

use crate::models::{MatchId, MatchRecord, PlayerIdentity, Puuid, RankSample, StoredSnapshot};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration for storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn store_dir(&self) -> PathBuf {
        self.data_dir.join("store")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(PathBuf::from("./data"))
    }
}

/// Narrow document-store contract keyed by player identity.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert or replace an identity keyed by puuid.
    async fn upsert_identity(&self, identity: &PlayerIdentity) -> Result<(), StorageError>;

    async fn identity(&self, puuid: &Puuid) -> Result<Option<PlayerIdentity>, StorageError>;

    /// Append a match record. Returns `false` if the (match, player) pair
    /// was already stored; records are never overwritten.
    async fn append_match(&self, record: &MatchRecord) -> Result<bool, StorageError>;

    /// A player's stored matches, newest first.
    async fn matches_for(
        &self,
        puuid: &Puuid,
        limit: usize,
    ) -> Result<Vec<MatchRecord>, StorageError>;

    /// All stored participations in one match.
    async fn match_by_id(&self, match_id: &MatchId) -> Result<Vec<MatchRecord>, StorageError>;

    /// Replace the live snapshot for a player.
    async fn upsert_snapshot(&self, snapshot: &StoredSnapshot) -> Result<(), StorageError>;

    async fn snapshot(&self, puuid: &Puuid) -> Result<Option<StoredSnapshot>, StorageError>;

    async fn append_rank_sample(&self, sample: &RankSample) -> Result<(), StorageError>;

    /// Rank samples, newest first.
    async fn rank_history(
        &self,
        puuid: &Puuid,
        limit: usize,
    ) -> Result<Vec<RankSample>, StorageError>;

    async fn latest_rank(&self, puuid: &Puuid) -> Result<Option<RankSample>, StorageError> {
        Ok(self.rank_history(puuid, 1).await?.into_iter().next())
    }

    /// Case-insensitive substring search over display handles. A blank
    /// query matches nothing.
    async fn search_identities(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<PlayerIdentity>, StorageError>;
}

/// Newest first, ties broken by match id so ordering is stable.
pub(crate) fn sort_newest_first(records: &mut [MatchRecord]) {
    records.sort_by(|a, b| {
        b.started_at
            .cmp(&a.started_at)
            .then_with(|| a.match_id.as_str().cmp(b.match_id.as_str()))
    });
}

/// Filter identities by handle, ordered by handle, bounded by `limit`.
pub(crate) fn search<'a>(
    identities: impl Iterator<Item = &'a PlayerIdentity>,
    query: &str,
    limit: usize,
) -> Vec<PlayerIdentity> {
    if query.trim().is_empty() {
        return Vec::new();
    }
    let mut found: Vec<PlayerIdentity> = identities
        .filter(|identity| identity.matches_handle(query))
        .cloned()
        .collect();
    found.sort_by_key(|identity| identity.display_handle().to_lowercase());
    found.truncate(limit);
    found
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_storage_config_paths() {
        let config = StorageConfig::new(PathBuf::from("/data"));
        assert_eq!(config.store_dir(), PathBuf::from("/data/store"));
    }

    #[test]
    fn test_sort_newest_first() {
        let mut records = vec![
            record("a", "p1", 100),
            record("b", "p1", 300),
            record("c", "p1", 200),
        ];
        sort_newest_first(&mut records);
        let ids: Vec<&str> = records.iter().map(|r| r.match_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_search_is_case_insensitive_and_bounded() {
        let identities = [
            identity("1", "ShadowFox", "EUW"),
            identity("2", "shadowcat", "NA1"),
            identity("3", "Sunrise", "KR1"),
        ];

        let found = search(identities.iter(), "SHADOW", 10);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].riot_id.game_name, "shadowcat");

        assert_eq!(search(identities.iter(), "shadow", 1).len(), 1);
        assert!(search(identities.iter(), "  ", 10).is_empty());
        assert_eq!(search(identities.iter(), "#kr1", 10).len(), 1);
    }
}
