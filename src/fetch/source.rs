//! Match-data provider abstraction.
//!
//! [`MatchSource`] returns raw provider responses; parsing and caching live
//! in the client. [`HttpMatchSource`] talks to a HenrikDev-style REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use super::UpstreamError;
use crate::config::UpstreamConfig;
use crate::models::{MatchId, Puuid, Region};

/// Read-only access to the match-data provider.
#[async_trait]
pub trait MatchSource: Send + Sync {
    /// Source name for logging.
    fn name(&self) -> &'static str;

    /// Account lookup by display handle.
    async fn account(&self, game_name: &str, tag_line: &str) -> Result<Value, UpstreamError>;

    /// Most recent match ids, newest first.
    async fn match_ids(
        &self,
        puuid: &Puuid,
        region: Region,
        limit: usize,
    ) -> Result<Value, UpstreamError>;

    /// Full detail for a single match.
    async fn match_detail(&self, match_id: &MatchId, region: Region)
        -> Result<Value, UpstreamError>;

    /// Static game content (agents, maps, ...).
    async fn content(&self, locale: &str) -> Result<Value, UpstreamError>;

    /// Regional competitive leaderboard.
    async fn leaderboard(&self, region: Region) -> Result<Value, UpstreamError>;

    /// Current competitive standing for a handle.
    async fn mmr(
        &self,
        region: Region,
        game_name: &str,
        tag_line: &str,
    ) -> Result<Value, UpstreamError>;
}

/// HTTP implementation of [`MatchSource`].
pub struct HttpMatchSource {
    client: Client,
    base_url: Url,
}

impl HttpMatchSource {
    /// Create a source. The API key, when present, is attached to every request.
    pub fn new(config: &UpstreamConfig, api_key: Option<String>) -> Result<Self, UpstreamError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| UpstreamError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("val-tracker/0.1.0")),
        );
        if let Some(key) = api_key {
            let mut value = HeaderValue::from_str(&key)
                .map_err(|_| UpstreamError::InvalidUrl("API key is not a valid header".into()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .build()?;

        Ok(Self { client, base_url })
    }

    /// Build an endpoint URL; segments are percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, UpstreamError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| UpstreamError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json(&self, url: Url, what: &str) -> Result<Value, UpstreamError> {
        info!("Fetching {}", url.path());

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();

        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok());
            let body = response.text().await.unwrap_or_default();
            debug!("Provider returned {} for {}: {}", status, url.path(), body);
            return Err(UpstreamError::from_status(status.as_u16(), retry_after, what));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl MatchSource for HttpMatchSource {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn account(&self, game_name: &str, tag_line: &str) -> Result<Value, UpstreamError> {
        let url = self.endpoint(&["valorant", "v1", "account", game_name, tag_line])?;
        self.get_json(url, &format!("account {}#{}", game_name, tag_line))
            .await
    }

    async fn match_ids(
        &self,
        puuid: &Puuid,
        region: Region,
        limit: usize,
    ) -> Result<Value, UpstreamError> {
        let mut url = self.endpoint(&[
            "valorant",
            "v1",
            "by-puuid",
            "lifetime",
            "matches",
            region.as_str(),
            puuid.as_str(),
        ])?;
        url.query_pairs_mut().append_pair("size", &limit.to_string());
        self.get_json(url, &format!("match history for {}", puuid))
            .await
    }

    async fn match_detail(
        &self,
        match_id: &MatchId,
        _region: Region,
    ) -> Result<Value, UpstreamError> {
        let url = self.endpoint(&["valorant", "v2", "match", match_id.as_str()])?;
        self.get_json(url, &format!("match {}", match_id)).await
    }

    async fn content(&self, locale: &str) -> Result<Value, UpstreamError> {
        let mut url = self.endpoint(&["valorant", "v1", "content"])?;
        url.query_pairs_mut().append_pair("locale", locale);
        self.get_json(url, "content").await
    }

    async fn leaderboard(&self, region: Region) -> Result<Value, UpstreamError> {
        let url = self.endpoint(&["valorant", "v1", "leaderboard", region.as_str()])?;
        self.get_json(url, &format!("leaderboard {}", region)).await
    }

    async fn mmr(
        &self,
        region: Region,
        game_name: &str,
        tag_line: &str,
    ) -> Result<Value, UpstreamError> {
        let url = self.endpoint(&[
            "valorant",
            "v2",
            "mmr",
            region.as_str(),
            game_name,
            tag_line,
        ])?;
        self.get_json(url, &format!("rank for {}#{}", game_name, tag_line))
            .await
    }
}

/// In-process source for tests. Responses are wrapped in the provider's
/// `{ "status", "data" }` envelope; call counts are recorded per operation.
#[cfg(test)]
pub struct MockMatchSource {
    accounts: std::collections::HashMap<String, Value>,
    ranks: std::collections::HashMap<String, Value>,
    match_ids: std::collections::HashMap<String, Vec<String>>,
    details: std::collections::HashMap<String, Value>,
    failing: std::collections::HashSet<String>,
    slow: std::collections::HashSet<String>,
    history_error: Option<u16>,
    detail_delay: Option<Duration>,
    in_flight: std::sync::atomic::AtomicUsize,
    rate_limits_remaining: std::sync::atomic::AtomicUsize,
    pub account_calls: std::sync::atomic::AtomicUsize,
    pub match_list_calls: std::sync::atomic::AtomicUsize,
    pub detail_calls: std::sync::atomic::AtomicUsize,
    pub peak_detail_in_flight: std::sync::atomic::AtomicUsize,
    pub leaderboard_calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockMatchSource {
    pub fn new() -> Self {
        Self {
            accounts: Default::default(),
            ranks: Default::default(),
            match_ids: Default::default(),
            details: Default::default(),
            failing: Default::default(),
            slow: Default::default(),
            history_error: None,
            detail_delay: None,
            in_flight: Default::default(),
            rate_limits_remaining: Default::default(),
            account_calls: Default::default(),
            match_list_calls: Default::default(),
            detail_calls: Default::default(),
            peak_detail_in_flight: Default::default(),
            leaderboard_calls: Default::default(),
        }
    }

    fn handle_key(game_name: &str, tag_line: &str) -> String {
        format!("{}#{}", game_name, tag_line).to_lowercase()
    }

    pub fn with_account(mut self, game_name: &str, tag_line: &str, puuid: &str) -> Self {
        self.accounts.insert(
            Self::handle_key(game_name, tag_line),
            serde_json::json!({
                "puuid": puuid,
                "region": "eu",
                "account_level": 87,
                "name": game_name,
                "tag": tag_line,
                "card": { "small": "https://media.example/card.png" }
            }),
        );
        self
    }

    /// Competitive standing for a handle registered with `with_account`.
    pub fn with_rank(mut self, game_name: &str, tag_line: &str, tier: u32, rating: u32) -> Self {
        self.ranks.insert(
            Self::handle_key(game_name, tag_line),
            serde_json::json!({
                "name": game_name,
                "tag": tag_line,
                "current_data": {
                    "currenttier": tier,
                    "currenttierpatched": "Diamond 2",
                    "ranking_in_tier": rating,
                    "season": "e9a2"
                }
            }),
        );
        self
    }

    /// Register a match for a player: its id joins the player's history
    /// (in insertion order, newest first) and its payload becomes fetchable.
    pub fn with_match(mut self, puuid: &str, data: Value) -> Self {
        let id = data["metadata"]["matchid"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        self.match_ids
            .entry(puuid.to_string())
            .or_default()
            .push(id.clone());
        self.details.insert(id, data);
        self
    }

    /// Listed in history, but detail lookups fail with a 500.
    pub fn with_failing_match(mut self, puuid: &str, match_id: &str) -> Self {
        self.match_ids
            .entry(puuid.to_string())
            .or_default()
            .push(match_id.to_string());
        self.failing.insert(match_id.to_string());
        self
    }

    /// Listed in history, but detail lookups never complete.
    pub fn with_hanging_match(mut self, puuid: &str, match_id: &str) -> Self {
        self.match_ids
            .entry(puuid.to_string())
            .or_default()
            .push(match_id.to_string());
        self.slow.insert(match_id.to_string());
        self
    }

    /// Every match-history lookup fails with this status.
    pub fn with_history_error(mut self, status: u16) -> Self {
        self.history_error = Some(status);
        self
    }

    /// Every detail lookup takes at least this long.
    pub fn with_detail_delay(mut self, delay: Duration) -> Self {
        self.detail_delay = Some(delay);
        self
    }

    /// The next `n` calls of any kind are rate limited.
    pub fn with_rate_limits(self, n: usize) -> Self {
        self.rate_limits_remaining
            .store(n, std::sync::atomic::Ordering::SeqCst);
        self
    }

    pub fn calls(counter: &std::sync::atomic::AtomicUsize) -> usize {
        counter.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn throttle(&self) -> Result<(), UpstreamError> {
        use std::sync::atomic::Ordering;
        let throttled = self
            .rate_limits_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if throttled {
            Err(UpstreamError::RateLimited {
                retry_after_secs: 0,
            })
        } else {
            Ok(())
        }
    }

    fn envelope(data: Value) -> Value {
        serde_json::json!({ "status": 200, "data": data })
    }
}

#[cfg(test)]
#[async_trait]
impl MatchSource for MockMatchSource {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn account(&self, game_name: &str, tag_line: &str) -> Result<Value, UpstreamError> {
        self.account_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.throttle()?;
        self.accounts
            .get(&Self::handle_key(game_name, tag_line))
            .cloned()
            .map(Self::envelope)
            .ok_or_else(|| UpstreamError::from_status(404, None, "account"))
    }

    async fn match_ids(
        &self,
        puuid: &Puuid,
        _region: Region,
        limit: usize,
    ) -> Result<Value, UpstreamError> {
        self.match_list_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.throttle()?;
        if let Some(status) = self.history_error {
            return Err(UpstreamError::from_status(status, None, "history"));
        }
        let ids: Vec<Value> = self
            .match_ids
            .get(puuid.as_str())
            .map(|ids| ids.iter().take(limit).collect::<Vec<_>>())
            .unwrap_or_default()
            .into_iter()
            .map(|id| serde_json::json!({ "meta": { "id": id } }))
            .collect();
        Ok(Self::envelope(Value::Array(ids)))
    }

    async fn match_detail(
        &self,
        match_id: &MatchId,
        _region: Region,
    ) -> Result<Value, UpstreamError> {
        use std::sync::atomic::Ordering;
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.throttle()?;
        if let Some(delay) = self.detail_delay {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_detail_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        if self.slow.contains(match_id.as_str()) {
            std::future::pending::<()>().await;
        }
        if self.failing.contains(match_id.as_str()) {
            return Err(UpstreamError::from_status(500, None, "match"));
        }
        self.details
            .get(match_id.as_str())
            .cloned()
            .map(Self::envelope)
            .ok_or_else(|| UpstreamError::from_status(404, None, "match"))
    }

    async fn content(&self, _locale: &str) -> Result<Value, UpstreamError> {
        self.throttle()?;
        Ok(serde_json::json!({ "characters": [{ "name": "Jett" }], "maps": [{ "name": "Ascent" }] }))
    }

    async fn leaderboard(&self, region: Region) -> Result<Value, UpstreamError> {
        self.leaderboard_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.throttle()?;
        Ok(Self::envelope(serde_json::json!([
            { "leaderboardRank": 1, "gameName": "Top", "tagLine": "ONE", "region": region.as_str() }
        ])))
    }

    async fn mmr(
        &self,
        _region: Region,
        game_name: &str,
        tag_line: &str,
    ) -> Result<Value, UpstreamError> {
        self.throttle()?;
        self.ranks
            .get(&Self::handle_key(game_name, tag_line))
            .cloned()
            .map(Self::envelope)
            .ok_or_else(|| UpstreamError::from_status(404, None, "rank"))
    }
}
