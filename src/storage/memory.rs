//! In-memory [`Store`].

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{search, sort_newest_first, StorageError, Store};
use crate::models::{MatchId, MatchRecord, PlayerIdentity, Puuid, RankSample, StoredSnapshot};

#[derive(Default)]
struct Tables {
    identities: HashMap<Puuid, PlayerIdentity>,
    matches: Vec<MatchRecord>,
    snapshots: HashMap<Puuid, StoredSnapshot>,
    ranks: Vec<RankSample>,
}

/// Store backed by maps behind a single async lock.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_identity(&self, identity: &PlayerIdentity) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        tables
            .identities
            .entry(identity.puuid.clone())
            .and_modify(|existing| existing.refresh_from(identity))
            .or_insert_with(|| identity.clone());
        Ok(())
    }

    async fn identity(&self, puuid: &Puuid) -> Result<Option<PlayerIdentity>, StorageError> {
        Ok(self.tables.read().await.identities.get(puuid).cloned())
    }

    async fn append_match(&self, record: &MatchRecord) -> Result<bool, StorageError> {
        let mut tables = self.tables.write().await;
        let exists = tables
            .matches
            .iter()
            .any(|m| m.match_id == record.match_id && m.puuid == record.puuid);
        if exists {
            return Ok(false);
        }
        tables.matches.push(record.clone());
        Ok(true)
    }

    async fn matches_for(
        &self,
        puuid: &Puuid,
        limit: usize,
    ) -> Result<Vec<MatchRecord>, StorageError> {
        let tables = self.tables.read().await;
        let mut records: Vec<MatchRecord> = tables
            .matches
            .iter()
            .filter(|m| &m.puuid == puuid)
            .cloned()
            .collect();
        sort_newest_first(&mut records);
        records.truncate(limit);
        Ok(records)
    }

    async fn match_by_id(&self, match_id: &MatchId) -> Result<Vec<MatchRecord>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables
            .matches
            .iter()
            .filter(|m| &m.match_id == match_id)
            .cloned()
            .collect())
    }

    async fn upsert_snapshot(&self, snapshot: &StoredSnapshot) -> Result<(), StorageError> {
        self.tables
            .write()
            .await
            .snapshots
            .insert(snapshot.puuid().clone(), snapshot.clone());
        Ok(())
    }

    async fn snapshot(&self, puuid: &Puuid) -> Result<Option<StoredSnapshot>, StorageError> {
        Ok(self.tables.read().await.snapshots.get(puuid).cloned())
    }

    async fn append_rank_sample(&self, sample: &RankSample) -> Result<(), StorageError> {
        self.tables.write().await.ranks.push(sample.clone());
        Ok(())
    }

    async fn rank_history(
        &self,
        puuid: &Puuid,
        limit: usize,
    ) -> Result<Vec<RankSample>, StorageError> {
        let tables = self.tables.read().await;
        let mut samples: Vec<RankSample> = tables
            .ranks
            .iter()
            .filter(|s| &s.puuid == puuid)
            .cloned()
            .collect();
        // Later appends win timestamp ties.
        samples.reverse();
        samples.sort_by(|a, b| b.observed_at.cmp(&a.observed_at));
        samples.truncate(limit);
        Ok(samples)
    }

    async fn search_identities(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<PlayerIdentity>, StorageError> {
        let tables = self.tables.read().await;
        Ok(search(tables.identities.values(), query, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculate::aggregate;
    use crate::models::{RiotId, StoredSnapshot};
    use crate::storage::test_support::*;

    #[tokio::test]
    async fn test_identity_upsert_refreshes_handle() {
        let store = MemoryStore::new();
        store
            .upsert_identity(&identity("p1", "OldName", "EUW"))
            .await
            .unwrap();

        let mut renamed = identity("p1", "NewName", "EUW");
        renamed.riot_id = RiotId::new("NewName", "EU2");
        store.upsert_identity(&renamed).await.unwrap();

        let stored = store.identity(&Puuid::from("p1")).await.unwrap().unwrap();
        assert_eq!(stored.riot_id.to_string(), "NewName#EU2");
        assert!(store.search_identities("oldname", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_match_ignores_duplicates() {
        let store = MemoryStore::new();
        assert!(store.append_match(&record("m1", "p1", 100)).await.unwrap());
        assert!(!store.append_match(&record("m1", "p1", 100)).await.unwrap());

        let records = store.matches_for(&Puuid::from("p1"), 10).await.unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_matches_newest_first_with_limit() {
        let store = MemoryStore::new();
        for (id, at) in [("m1", 100), ("m2", 300), ("m3", 200)] {
            store.append_match(&record(id, "p1", at)).await.unwrap();
        }
        store.append_match(&record("other", "p2", 999)).await.unwrap();

        let records = store.matches_for(&Puuid::from("p1"), 2).await.unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.match_id.as_str()).collect();
        assert_eq!(ids, vec!["m2", "m3"]);

        let by_id = store.match_by_id(&MatchId::from("m3")).await.unwrap();
        assert_eq!(by_id.len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_upsert_replaces() {
        let store = MemoryStore::new();
        let puuid = Puuid::from("p1");
        assert!(store.snapshot(&puuid).await.unwrap().is_none());

        store
            .upsert_snapshot(&StoredSnapshot::new(aggregate(&[], &puuid)))
            .await
            .unwrap();

        let mut updated = aggregate(&[], &puuid);
        updated.total_matches = 7;
        store
            .upsert_snapshot(&StoredSnapshot::new(updated))
            .await
            .unwrap();

        let stored = store.snapshot(&puuid).await.unwrap().unwrap();
        assert_eq!(stored.snapshot.total_matches, 7);
    }

    #[tokio::test]
    async fn test_rank_history_newest_first() {
        let store = MemoryStore::new();
        store.append_rank_sample(&rank_sample("p1", 10, 100)).await.unwrap();
        store.append_rank_sample(&rank_sample("p1", 30, 300)).await.unwrap();
        store.append_rank_sample(&rank_sample("p1", 20, 200)).await.unwrap();

        let history = store.rank_history(&Puuid::from("p1"), 2).await.unwrap();
        let ratings: Vec<u32> = history.iter().map(|s| s.rank.rating).collect();
        assert_eq!(ratings, vec![30, 20]);

        let latest = store.latest_rank(&Puuid::from("p1")).await.unwrap().unwrap();
        assert_eq!(latest.rank.rating, 30);
        assert!(store.latest_rank(&Puuid::from("p2")).await.unwrap().is_none());
    }
}
