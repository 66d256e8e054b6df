//! Cache-fronted upstream client.
//!
//! Every read goes through the [`ResponseCache`] first. Misses hit the
//! [`MatchSource`] with retry/backoff, and only responses that parse are
//! cached. Recent-match fetches fan out with a concurrency cap, try each
//! detail once and keep whatever subset succeeds.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{MatchSource, RetryPolicy, UpstreamError};
use crate::cache::{cache_key, ResponseCache};
use crate::config::UpstreamConfig;
use crate::models::{
    Match, MatchId, Platform, PlayerIdentity, Puuid, RankSnapshot, Region, RiotId,
};

/// Matches gathered for a "recent matches" request.
#[derive(Debug, Clone)]
pub struct RecentMatches {
    /// Successfully fetched matches, in upstream order (newest first)
    pub matches: Vec<Match>,

    /// How many match ids upstream listed
    pub requested: usize,

    /// How many detail fetches failed or timed out
    pub dropped: usize,
}

impl RecentMatches {
    /// Whether some listed matches could not be fetched.
    pub fn is_partial(&self) -> bool {
        self.dropped > 0
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct AccountData {
    puuid: String,
    name: String,
    tag: String,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    account_level: Option<u32>,
    #[serde(default)]
    card: Option<Value>,
    #[serde(default)]
    platforms: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MmrData {
    #[serde(default)]
    current_data: Option<CurrentMmr>,
}

#[derive(Debug, Deserialize)]
struct CurrentMmr {
    #[serde(default)]
    currenttier: Option<u32>,
    #[serde(default)]
    currenttierpatched: Option<String>,
    #[serde(default)]
    ranking_in_tier: Option<u32>,
    #[serde(default)]
    leaderboard_placement: Option<u32>,
    #[serde(default)]
    season: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MatchListEntry {
    meta: MatchListMeta,
}

#[derive(Debug, Deserialize)]
struct MatchListMeta {
    id: String,
}

/// Upstream client with response caching, retries and bounded fan-out.
pub struct UpstreamClient {
    source: Arc<dyn MatchSource>,
    cache: ResponseCache,
    retry: RetryPolicy,
    max_concurrency: usize,
    detail_timeout: Duration,
}

impl UpstreamClient {
    pub fn new(source: Arc<dyn MatchSource>, cache: ResponseCache, retry: RetryPolicy) -> Self {
        debug!("Upstream client over {} source", source.name());
        Self {
            source,
            cache,
            retry,
            max_concurrency: 4,
            detail_timeout: Duration::from_secs(15),
        }
    }

    /// Build a client from configuration.
    pub fn from_config(
        source: Arc<dyn MatchSource>,
        cache: ResponseCache,
        config: &UpstreamConfig,
    ) -> Self {
        Self::new(source, cache, RetryPolicy::from_config(config))
            .with_max_concurrency(config.max_concurrency)
            .with_detail_timeout(Duration::from_secs(config.detail_timeout_seconds))
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_detail_timeout(mut self, timeout: Duration) -> Self {
        self.detail_timeout = timeout;
        self
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Call the source, retrying transient failures per the retry policy.
    async fn with_retry<F, Fut>(&self, what: &str, call: F) -> Result<Value, UpstreamError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Value, UpstreamError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for(attempt, &e);
                    warn!(
                        "{} failed ({}), retry {}/{} in {:?}",
                        what,
                        e,
                        attempt + 1,
                        self.retry.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// A cached response that still parses.
    fn cache_lookup<T, P>(&self, key: &str, parse: &P) -> Option<T>
    where
        P: Fn(&Value) -> Result<T, UpstreamError>,
    {
        let value = self.cache.get(key)?;
        match parse(&value) {
            Ok(parsed) => {
                debug!("Cache hit for {}", key);
                Some(parsed)
            }
            Err(e) => {
                debug!("Ignoring unparseable cache entry {}: {}", key, e);
                None
            }
        }
    }

    /// Serve from cache, or fetch (with retries), parse and cache.
    async fn cached<T, F, Fut, P>(&self, key: String, call: F, parse: P) -> Result<T, UpstreamError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Value, UpstreamError>>,
        P: Fn(&Value) -> Result<T, UpstreamError>,
    {
        if let Some(parsed) = self.cache_lookup(&key, &parse) {
            return Ok(parsed);
        }

        let value = self.with_retry(&key, call).await?;
        let parsed = parse(&value)?;
        self.cache.set(key, value);
        Ok(parsed)
    }

    /// Resolve a display handle to a player identity.
    ///
    /// `region` is used when the provider does not report one.
    pub async fn resolve_account(
        &self,
        game_name: &str,
        tag_line: &str,
        region: Region,
    ) -> Result<PlayerIdentity, UpstreamError> {
        let key = cache_key(
            "account",
            &[&game_name.to_lowercase(), &tag_line.to_lowercase()],
        );

        let identity = self
            .cached(
                key,
                || self.source.account(game_name, tag_line),
                |value| parse_account(value, region),
            )
            .await?;

        info!(
            "Resolved {} to {} ({})",
            identity.riot_id, identity.puuid, identity.region
        );
        Ok(identity)
    }

    /// Most recent match ids for a player, newest first, at most `limit`.
    pub async fn list_recent_match_ids(
        &self,
        puuid: &Puuid,
        region: Region,
        limit: usize,
    ) -> Result<Vec<MatchId>, UpstreamError> {
        let key = cache_key(
            "match_ids",
            &[puuid.as_str(), region.as_str(), &limit.to_string()],
        );

        let mut ids = self
            .cached(
                key,
                || self.source.match_ids(puuid, region, limit),
                parse_match_ids,
            )
            .await?;

        ids.truncate(limit);
        Ok(ids)
    }

    /// Full detail for one match.
    pub async fn fetch_match_detail(
        &self,
        match_id: &MatchId,
        region: Region,
    ) -> Result<Match, UpstreamError> {
        let key = cache_key("match_detail", &[match_id.as_str()]);

        self.cached(
            key,
            || self.source.match_detail(match_id, region),
            parse_match,
        )
        .await
    }

    /// Single-attempt, cache-fronted detail fetch.
    async fn fetch_match_detail_once(
        &self,
        match_id: &MatchId,
        region: Region,
    ) -> Result<Match, UpstreamError> {
        let key = cache_key("match_detail", &[match_id.as_str()]);
        if let Some(parsed) = self.cache_lookup(&key, &parse_match) {
            return Ok(parsed);
        }

        let value = self.source.match_detail(match_id, region).await?;
        let parsed = parse_match(&value)?;
        self.cache.set(key, value);
        Ok(parsed)
    }

    /// One fan-out slot: a failed or timed-out fetch is logged and dropped.
    async fn fetch_for_fan_out(&self, match_id: MatchId, region: Region) -> Option<Match> {
        let result = tokio::time::timeout(
            self.detail_timeout,
            self.fetch_match_detail_once(&match_id, region),
        )
        .await
        .unwrap_or(Err(UpstreamError::Timeout(self.detail_timeout)));

        match result {
            Ok(m) => Some(m),
            Err(e) => {
                warn!("Dropping match {}: {}", match_id, e);
                None
            }
        }
    }

    /// List recent match ids and fetch each detail concurrently.
    ///
    /// Detail fetches are attempted once each, not retried. Failed or
    /// timed-out ones are dropped and counted; they never fail the whole
    /// request. Only the id listing itself can fail.
    pub async fn fetch_recent_matches_with_details(
        &self,
        puuid: &Puuid,
        region: Region,
        count: usize,
    ) -> Result<RecentMatches, UpstreamError> {
        let ids = self.list_recent_match_ids(puuid, region, count).await?;
        let requested = ids.len();

        let fetched: Vec<Option<Match>> = stream::iter(ids)
            .map(|id| self.fetch_for_fan_out(id, region))
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let matches: Vec<Match> = fetched.into_iter().flatten().collect();
        let dropped = requested - matches.len();

        if dropped > 0 {
            warn!(
                "Partial match history for {}: {} of {} matches fetched",
                puuid,
                matches.len(),
                requested
            );
        } else {
            debug!("Fetched {} matches for {}", matches.len(), puuid);
        }

        Ok(RecentMatches {
            matches,
            requested,
            dropped,
        })
    }

    /// Current competitive standing. `None` for unranked players.
    pub async fn current_rank(
        &self,
        identity: &PlayerIdentity,
    ) -> Result<Option<RankSnapshot>, UpstreamError> {
        let RiotId {
            game_name,
            tag_line,
        } = &identity.riot_id;
        let key = cache_key(
            "mmr",
            &[identity.region.as_str(), identity.puuid.as_str()],
        );

        self.cached(
            key,
            || self.source.mmr(identity.region, game_name, tag_line),
            parse_rank,
        )
        .await
    }

    /// Static game content, passed through.
    pub async fn content(&self, locale: &str) -> Result<Value, UpstreamError> {
        let key = cache_key("content", &[locale]);
        self.cached(key, || self.source.content(locale), |v| Ok(v.clone()))
            .await
    }

    /// Regional leaderboard, passed through.
    pub async fn leaderboard(&self, region: Region) -> Result<Value, UpstreamError> {
        let key = cache_key("leaderboard", &[region.as_str()]);
        self.cached(key, || self.source.leaderboard(region), |v| {
            Ok(v.get("data").cloned().unwrap_or_else(|| v.clone()))
        })
        .await
    }
}

fn parse_account(value: &Value, fallback_region: Region) -> Result<PlayerIdentity, UpstreamError> {
    let account = Envelope::<AccountData>::deserialize(value)?.data;

    let region = account
        .region
        .as_deref()
        .and_then(|r| r.parse().ok())
        .unwrap_or(fallback_region);

    let card_url = account.card.and_then(|card| match card {
        Value::String(s) => Some(s),
        Value::Object(map) => map.get("small").and_then(|v| v.as_str()).map(String::from),
        _ => None,
    });

    let mut identity = PlayerIdentity::new(
        Puuid::new(account.puuid),
        RiotId::new(account.name, account.tag),
        region,
    );
    identity.account_level = account.account_level;
    identity.card_url = card_url;
    identity.platform = account
        .platforms
        .iter()
        .find_map(|label| Platform::from_provider(label))
        .unwrap_or_default();
    Ok(identity)
}

fn parse_rank(value: &Value) -> Result<Option<RankSnapshot>, UpstreamError> {
    let current = match Envelope::<MmrData>::deserialize(value)?.data.current_data {
        Some(current) => current,
        None => return Ok(None),
    };

    let tier = current.currenttier.unwrap_or(0);
    if tier == 0 {
        return Ok(None);
    }

    Ok(Some(RankSnapshot {
        tier,
        tier_name: current
            .currenttierpatched
            .unwrap_or_else(|| "Unknown".to_string()),
        rating: current.ranking_in_tier.unwrap_or(0),
        leaderboard_position: current.leaderboard_placement,
        season: current.season.unwrap_or_else(|| "current".to_string()),
    }))
}

fn parse_match_ids(value: &Value) -> Result<Vec<MatchId>, UpstreamError> {
    let entries = Envelope::<Vec<MatchListEntry>>::deserialize(value)?.data;
    Ok(entries
        .into_iter()
        .map(|entry| MatchId::new(entry.meta.id))
        .collect())
}

fn parse_match(value: &Value) -> Result<Match, UpstreamError> {
    let data = value
        .get("data")
        .ok_or_else(|| UpstreamError::Upstream {
            status: 200,
            message: "match response has no data".to_string(),
        })?;
    Ok(Match::from_upstream(data)?)
}
