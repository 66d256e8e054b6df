use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::api::{page_limit, ApiError};
use crate::calculate::{calculate_headshot_percentage, format_ratio};
use crate::models::{
    Breakdown, MapBreakdown, MatchId, MatchRecord, MatchSummary, Outcome, PlayerIdentity, Puuid,
    RankSample, RankSnapshot, RiotId, StatTotals, StatisticsSnapshot,
};
use crate::profile::PlayerProfile;

#[derive(Debug, Deserialize)]
pub struct RegionParams {
    pub region: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct BreakdownView {
    pub matches: u32,
    pub wins: u32,
    pub kills: u32,
    pub deaths: u32,
    pub kd: String,
    pub win_rate: String,
}

impl From<&Breakdown> for BreakdownView {
    fn from(b: &Breakdown) -> Self {
        Self {
            matches: b.matches,
            wins: b.wins,
            kills: b.kills,
            deaths: b.deaths,
            kd: format_ratio(b.kd, 2),
            win_rate: format_ratio(b.win_rate, 1),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MapBreakdownView {
    pub matches: u32,
    pub wins: u32,
    pub kills: u32,
    pub deaths: u32,
    pub rounds_won: u32,
    pub rounds_lost: u32,
    pub kd: String,
    pub win_rate: String,
    pub round_win_rate: String,
}

impl From<&MapBreakdown> for MapBreakdownView {
    fn from(m: &MapBreakdown) -> Self {
        Self {
            matches: m.matches,
            wins: m.wins,
            kills: m.kills,
            deaths: m.deaths,
            rounds_won: m.rounds_won,
            rounds_lost: m.rounds_lost,
            kd: format_ratio(m.kd, 2),
            win_rate: format_ratio(m.win_rate, 1),
            round_win_rate: format_ratio(m.round_win_rate, 1),
        }
    }
}

/// Statistics with ratios rendered at fixed precision.
#[derive(Debug, Serialize)]
pub struct StatsView {
    pub puuid: Puuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub total_matches: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub totals: StatTotals,
    pub kd: String,
    pub win_rate: String,
    pub headshot_percentage: String,
    pub avg_kills: String,
    pub avg_deaths: String,
    pub avg_assists: String,
    pub avg_score: String,
    pub kills_per_round: String,
    pub most_played_agent: Option<String>,
    pub agents: BTreeMap<String, BreakdownView>,
    pub maps: BTreeMap<String, MapBreakdownView>,
    pub recent_matches: Vec<MatchSummary>,
}

impl StatsView {
    pub fn new(s: &StatisticsSnapshot, updated_at: Option<DateTime<Utc>>) -> Self {
        Self {
            puuid: s.puuid.clone(),
            updated_at,
            total_matches: s.total_matches,
            wins: s.wins,
            losses: s.losses,
            draws: s.draws,
            totals: s.totals.clone(),
            kd: format_ratio(s.kd, 2),
            win_rate: format_ratio(s.win_rate, 1),
            headshot_percentage: format_ratio(s.headshot_percentage, 1),
            avg_kills: format_ratio(s.avg_kills, 1),
            avg_deaths: format_ratio(s.avg_deaths, 1),
            avg_assists: format_ratio(s.avg_assists, 1),
            avg_score: format_ratio(s.avg_score, 0),
            kills_per_round: format_ratio(s.kills_per_round(), 2),
            most_played_agent: s.most_played_agent().map(String::from),
            agents: s.agents.iter().map(|(k, v)| (k.clone(), v.into())).collect(),
            maps: s.maps.iter().map(|(k, v)| (k.clone(), v.into())).collect(),
            recent_matches: s.recent_matches.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub identity: PlayerIdentity,
    pub rank: Option<RankSnapshot>,
    pub statistics: StatsView,
    pub last_updated: DateTime<Utc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl From<PlayerProfile> for ProfileResponse {
    fn from(p: PlayerProfile) -> Self {
        Self {
            statistics: StatsView::new(&p.statistics, None),
            identity: p.identity,
            rank: p.rank,
            last_updated: p.last_updated,
            warnings: p.warnings,
        }
    }
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path((name, tag)): Path<(String, String)>,
    Query(params): Query<RegionParams>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let riot_id = RiotId::from_parts(&name, &tag)?;
    let region = state.region(params.region.as_deref())?;

    let profile = state
        .assembler
        .build_profile(&riot_id.game_name, &riot_id.tag_line, region)
        .await?;

    Ok(Json(profile.into()))
}

/// A stored match without its raw payload.
#[derive(Debug, Serialize)]
pub struct MatchRow {
    pub match_id: MatchId,
    pub map: String,
    pub mode: String,
    pub started_at: DateTime<Utc>,
    pub duration_secs: u64,
    pub agent: String,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub score: u32,
    pub headshot_percentage: String,
    pub outcome: Outcome,
    pub rounds_won: u32,
    pub rounds_lost: u32,
}

impl From<MatchRecord> for MatchRow {
    fn from(r: MatchRecord) -> Self {
        let hs = calculate_headshot_percentage(
            r.stats.headshots,
            r.stats.bodyshots,
            r.stats.legshots,
        );
        Self {
            match_id: r.match_id,
            map: r.map,
            mode: r.mode,
            started_at: r.started_at,
            duration_secs: r.duration_secs,
            agent: r.agent,
            kills: r.stats.kills,
            deaths: r.stats.deaths,
            assists: r.stats.assists,
            score: r.stats.score,
            headshot_percentage: format_ratio(hs, 1),
            outcome: r.outcome,
            rounds_won: r.rounds_won,
            rounds_lost: r.rounds_lost,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MatchListResponse {
    pub puuid: Puuid,
    pub matches: Vec<MatchRow>,
}

pub async fn list_matches(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<LimitParams>,
) -> Result<Json<MatchListResponse>, ApiError> {
    let puuid = Puuid::new(id);
    let records = state
        .store
        .matches_for(&puuid, page_limit(params.limit, 20))
        .await?;

    Ok(Json(MatchListResponse {
        puuid,
        matches: records.into_iter().map(MatchRow::from).collect(),
    }))
}

pub async fn get_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatsView>, ApiError> {
    let puuid = Puuid::new(id);
    let stored = state
        .store
        .snapshot(&puuid)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No statistics for player {}", puuid)))?;

    Ok(Json(StatsView::new(&stored.snapshot, Some(stored.updated_at))))
}

pub async fn get_rank(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RankSample>, ApiError> {
    let puuid = Puuid::new(id);
    let sample = state
        .store
        .latest_rank(&puuid)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No rank recorded for player {}", puuid)))?;

    Ok(Json(sample))
}

#[derive(Debug, Serialize)]
pub struct RankHistoryResponse {
    pub puuid: Puuid,
    pub samples: Vec<RankSample>,
}

pub async fn rank_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<LimitParams>,
) -> Result<Json<RankHistoryResponse>, ApiError> {
    let puuid = Puuid::new(id);
    let samples = state
        .store
        .rank_history(&puuid, page_limit(params.limit, 20))
        .await?;

    Ok(Json(RankHistoryResponse { puuid, samples }))
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub players: Vec<PlayerIdentity>,
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = params.q.unwrap_or_default().trim().to_string();
    if query.is_empty() {
        return Err(ApiError::BadRequest("query parameter 'q' is required".to_string()));
    }

    let players = state
        .store
        .search_identities(&query, page_limit(params.limit, 10))
        .await?;

    Ok(Json(SearchResponse { query, players }))
}
