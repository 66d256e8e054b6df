//! JSONL (JSON Lines) storage.
//!
//! One file per collection under `data_dir/store`. Match records and rank
//! samples are append-only; identities and snapshots are upserted by
//! rewriting their file through a temporary and renaming it into place.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{search, sort_newest_first, StorageConfig, StorageError, Store};
use crate::models::{MatchId, MatchRecord, PlayerIdentity, Puuid, RankSample, StoredSnapshot};

/// Collections persisted by [`JsonlStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Identities,
    Matches,
    Snapshots,
    RankSamples,
}

impl Collection {
    pub fn filename(&self) -> &'static str {
        match self {
            Collection::Identities => "identities.jsonl",
            Collection::Matches => "matches.jsonl",
            Collection::Snapshots => "snapshots.jsonl",
            Collection::RankSamples => "rank_samples.jsonl",
        }
    }

    pub fn path(&self, config: &StorageConfig) -> PathBuf {
        config.store_dir().join(self.filename())
    }
}

/// JSONL file writer.
pub struct JsonlWriter<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: Serialize> JsonlWriter<T> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    fn ensure_dir(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Append a single entity to the file.
    pub fn append(&self, entity: &T) -> Result<(), StorageError> {
        self.ensure_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", serde_json::to_string(entity)?)?;
        writer.flush()?;

        debug!("Appended entity to {:?}", self.path);
        Ok(())
    }

    /// Replace the file's contents. Readers see either the old or the new
    /// file, never a partial one.
    pub fn write_all(&self, entities: &[T]) -> Result<usize, StorageError> {
        self.ensure_dir()?;

        let tmp = self.path.with_extension("jsonl.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            for entity in entities {
                writeln!(writer, "{}", serde_json::to_string(entity)?)?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)?;

        debug!("Wrote {} entities to {:?}", entities.len(), self.path);
        Ok(entities.len())
    }
}

/// JSONL file reader.
pub struct JsonlReader<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> JsonlReader<T> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read all entities. A missing file reads as empty; unparseable lines
    /// are logged and skipped.
    pub fn read_all(&self) -> Result<Vec<T>, StorageError> {
        if !self.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let mut entities = Vec::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str(&line) {
                Ok(entity) => entities.push(entity),
                Err(e) => warn!(
                    "Failed to parse line {} in {:?}: {}",
                    index + 1,
                    self.path,
                    e
                ),
            }
        }

        debug!("Read {} entities from {:?}", entities.len(), self.path);
        Ok(entities)
    }

    pub fn read_where<F>(&self, predicate: F) -> Result<Vec<T>, StorageError>
    where
        F: Fn(&T) -> bool,
    {
        Ok(self.read_all()?.into_iter().filter(predicate).collect())
    }
}

/// [`Store`] persisted as JSON Lines files.
///
/// File access is serialized through one lock so rewrites never race
/// appends from another request.
pub struct JsonlStore {
    config: StorageConfig,
    lock: Mutex<()>,
}

impl JsonlStore {
    pub fn new(config: StorageConfig) -> Self {
        info!("Using JSONL store at {:?}", config.store_dir());
        Self {
            config,
            lock: Mutex::new(()),
        }
    }

    fn reader<T: DeserializeOwned>(&self, collection: Collection) -> JsonlReader<T> {
        JsonlReader::new(collection.path(&self.config))
    }

    fn writer<T: Serialize>(&self, collection: Collection) -> JsonlWriter<T> {
        JsonlWriter::new(collection.path(&self.config))
    }
}

#[async_trait]
impl Store for JsonlStore {
    async fn upsert_identity(&self, identity: &PlayerIdentity) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut identities: Vec<PlayerIdentity> = self.reader(Collection::Identities).read_all()?;

        match identities.iter_mut().find(|i| i.puuid == identity.puuid) {
            Some(existing) => existing.refresh_from(identity),
            None => identities.push(identity.clone()),
        }

        self.writer::<PlayerIdentity>(Collection::Identities)
            .write_all(&identities)?;
        Ok(())
    }

    async fn identity(&self, puuid: &Puuid) -> Result<Option<PlayerIdentity>, StorageError> {
        let _guard = self.lock.lock().await;
        Ok(self
            .reader::<PlayerIdentity>(Collection::Identities)
            .read_where(|i| &i.puuid == puuid)?
            .into_iter()
            .next())
    }

    async fn append_match(&self, record: &MatchRecord) -> Result<bool, StorageError> {
        let _guard = self.lock.lock().await;
        let existing = self
            .reader::<MatchRecord>(Collection::Matches)
            .read_where(|m| m.match_id == record.match_id && m.puuid == record.puuid)?;
        if !existing.is_empty() {
            debug!("Match {} already stored for {}", record.match_id, record.puuid);
            return Ok(false);
        }

        self.writer(Collection::Matches).append(record)?;
        Ok(true)
    }

    async fn matches_for(
        &self,
        puuid: &Puuid,
        limit: usize,
    ) -> Result<Vec<MatchRecord>, StorageError> {
        let _guard = self.lock.lock().await;
        let mut records = self
            .reader::<MatchRecord>(Collection::Matches)
            .read_where(|m| &m.puuid == puuid)?;
        sort_newest_first(&mut records);
        records.truncate(limit);
        Ok(records)
    }

    async fn match_by_id(&self, match_id: &MatchId) -> Result<Vec<MatchRecord>, StorageError> {
        let _guard = self.lock.lock().await;
        self.reader::<MatchRecord>(Collection::Matches)
            .read_where(|m| &m.match_id == match_id)
    }

    async fn upsert_snapshot(&self, snapshot: &StoredSnapshot) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut snapshots: Vec<StoredSnapshot> = self.reader(Collection::Snapshots).read_all()?;
        snapshots.retain(|s| s.puuid() != snapshot.puuid());
        snapshots.push(snapshot.clone());
        self.writer::<StoredSnapshot>(Collection::Snapshots)
            .write_all(&snapshots)?;
        Ok(())
    }

    async fn snapshot(&self, puuid: &Puuid) -> Result<Option<StoredSnapshot>, StorageError> {
        let _guard = self.lock.lock().await;
        Ok(self
            .reader::<StoredSnapshot>(Collection::Snapshots)
            .read_where(|s| s.puuid() == puuid)?
            .pop())
    }

    async fn append_rank_sample(&self, sample: &RankSample) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        self.writer(Collection::RankSamples).append(sample)
    }

    async fn rank_history(
        &self,
        puuid: &Puuid,
        limit: usize,
    ) -> Result<Vec<RankSample>, StorageError> {
        let _guard = self.lock.lock().await;
        let mut samples = self
            .reader::<RankSample>(Collection::RankSamples)
            .read_where(|s| &s.puuid == puuid)?;
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
        let _guard = self.lock.lock().await;
        let identities: Vec<PlayerIdentity> = self.reader(Collection::Identities).read_all()?;
        Ok(search(identities.iter(), query, limit))
    }
}
