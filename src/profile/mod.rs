//! Player profile assembly.
//!
//! Resolves a handle, aggregates a small window of recent matches and
//! attaches the current rank when a rank source is available. Only identity
//! resolution can fail the request. History, rank and persistence problems
//! degrade the profile instead.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::calculate::aggregate;
use crate::fetch::{UpstreamClient, UpstreamError};
use crate::models::{
    Match, PlayerIdentity, RankSample, RankSnapshot, Region, StatisticsSnapshot, StoredSnapshot,
};
use crate::storage::Store;

/// Source of a player's current competitive standing.
#[async_trait]
pub trait RankSource: Send + Sync {
    async fn current_rank(
        &self,
        identity: &PlayerIdentity,
    ) -> Result<Option<RankSnapshot>, UpstreamError>;
}

/// Rank lookups through the upstream client.
pub struct UpstreamRankSource {
    client: Arc<UpstreamClient>,
}

impl UpstreamRankSource {
    pub fn new(client: Arc<UpstreamClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RankSource for UpstreamRankSource {
    async fn current_rank(
        &self,
        identity: &PlayerIdentity,
    ) -> Result<Option<RankSnapshot>, UpstreamError> {
        self.client.current_rank(identity).await
    }
}

/// A fully assembled player profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub identity: PlayerIdentity,
    pub rank: Option<RankSnapshot>,
    pub statistics: StatisticsSnapshot,
    pub last_updated: DateTime<Utc>,

    /// Non-fatal problems hit while building the profile
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Builds [`PlayerProfile`]s from upstream data.
pub struct ProfileAssembler {
    client: Arc<UpstreamClient>,
    store: Option<Arc<dyn Store>>,
    rank_source: Option<Arc<dyn RankSource>>,
    recent_window: usize,
}

impl ProfileAssembler {
    pub fn new(client: Arc<UpstreamClient>) -> Self {
        Self {
            client,
            store: None,
            rank_source: None,
            recent_window: 5,
        }
    }

    /// Persist identities, matches, snapshots and rank samples here.
    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_rank_source(mut self, rank_source: Arc<dyn RankSource>) -> Self {
        self.rank_source = Some(rank_source);
        self
    }

    pub fn with_recent_window(mut self, recent_window: usize) -> Self {
        self.recent_window = recent_window.max(1);
        self
    }

    pub fn client(&self) -> &Arc<UpstreamClient> {
        &self.client
    }

    /// Build a profile for `game_name#tag_line`.
    ///
    /// Fails only when the identity cannot be resolved.
    pub async fn build_profile(
        &self,
        game_name: &str,
        tag_line: &str,
        region: Region,
    ) -> Result<PlayerProfile, UpstreamError> {
        let identity = self
            .client
            .resolve_account(game_name, tag_line, region)
            .await?;
        let mut warnings = Vec::new();

        let matches = match self
            .client
            .fetch_recent_matches_with_details(&identity.puuid, identity.region, self.recent_window)
            .await
        {
            Ok(recent) => {
                if recent.is_partial() {
                    warnings.push(format!(
                        "{} of {} recent matches could not be fetched",
                        recent.dropped, recent.requested
                    ));
                }
                recent.matches
            }
            Err(e) => {
                warn!(
                    "Match history unavailable for {}: {}; using empty statistics",
                    identity.riot_id, e
                );
                warnings.push("Match history unavailable".to_string());
                Vec::new()
            }
        };

        let statistics = aggregate(&matches, &identity.puuid);
        let rank = self.lookup_rank(&identity).await;

        warnings.extend(self.persist(&identity, &matches, &statistics, rank.as_ref()).await);

        info!(
            "Built profile for {}: {} matches, kd {}, win rate {}%",
            identity.riot_id, statistics.total_matches, statistics.kd, statistics.win_rate
        );

        Ok(PlayerProfile {
            identity,
            rank,
            statistics,
            last_updated: Utc::now(),
            warnings,
        })
    }

    async fn lookup_rank(&self, identity: &PlayerIdentity) -> Option<RankSnapshot> {
        let source = self.rank_source.as_ref()?;
        match source.current_rank(identity).await {
            Ok(rank) => rank,
            Err(e) => {
                warn!("Rank lookup failed for {}: {}", identity.riot_id, e);
                None
            }
        }
    }

    /// Write everything the profile was built from. Failures are logged and
    /// returned as warnings.
    async fn persist(
        &self,
        identity: &PlayerIdentity,
        matches: &[Match],
        statistics: &StatisticsSnapshot,
        rank: Option<&RankSnapshot>,
    ) -> Vec<String> {
        let store = match &self.store {
            Some(store) => store,
            None => return Vec::new(),
        };
        let mut warnings = Vec::new();

        if let Err(e) = store.upsert_identity(identity).await {
            warn!("Failed to store identity {}: {}", identity.puuid, e);
            warnings.push(format!("Identity not saved: {}", e));
        }

        let mut stored = 0;
        for record in matches.iter().filter_map(|m| m.record_for(&identity.puuid)) {
            match store.append_match(&record).await {
                Ok(true) => stored += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!("Failed to store match {}: {}", record.match_id, e);
                    warnings.push(format!("Match {} not saved: {}", record.match_id, e));
                }
            }
        }

        if let Err(e) = store
            .upsert_snapshot(&StoredSnapshot::new(statistics.clone()))
            .await
        {
            warn!("Failed to store statistics for {}: {}", identity.puuid, e);
            warnings.push(format!("Statistics not saved: {}", e));
        }

        if let Some(rank) = rank {
            let sample = RankSample::new(identity.puuid.clone(), rank.clone());
            if let Err(e) = store.append_rank_sample(&sample).await {
                warn!("Failed to store rank sample for {}: {}", identity.puuid, e);
                warnings.push(format!("Rank sample not saved: {}", e));
            }
        }

        info!("Stored {} new matches for {}", stored, identity.riot_id);
        warnings
    }
}
