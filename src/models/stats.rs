//! Derived statistics models.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MatchId, Outcome, Puuid};
use crate::calculate::{calculate_kd, calculate_percentage, round_to};

/// Ratios for a slice of matches played on one agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Breakdown {
    pub matches: u32,
    pub wins: u32,
    pub kills: u32,
    pub deaths: u32,

    /// Kills per death, 2 dp
    pub kd: f64,

    /// Percentage of matches won, 1 dp
    pub win_rate: f64,
}

impl Breakdown {
    pub fn new(matches: u32, wins: u32, kills: u32, deaths: u32) -> Self {
        Self {
            matches,
            wins,
            kills,
            deaths,
            kd: calculate_kd(kills, deaths),
            win_rate: calculate_percentage(wins, matches),
        }
    }
}

/// Ratios for a slice of matches played on one map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapBreakdown {
    pub matches: u32,
    pub wins: u32,
    pub kills: u32,
    pub deaths: u32,
    pub rounds_won: u32,
    pub rounds_lost: u32,
    pub kd: f64,
    pub win_rate: f64,

    /// Percentage of rounds won, 1 dp
    pub round_win_rate: f64,
}

impl MapBreakdown {
    pub fn new(
        matches: u32,
        wins: u32,
        kills: u32,
        deaths: u32,
        rounds_won: u32,
        rounds_lost: u32,
    ) -> Self {
        Self {
            matches,
            wins,
            kills,
            deaths,
            rounds_won,
            rounds_lost,
            kd: calculate_kd(kills, deaths),
            win_rate: calculate_percentage(wins, matches),
            round_win_rate: calculate_percentage(rounds_won, rounds_won + rounds_lost),
        }
    }
}

/// Raw running totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatTotals {
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub score: u64,
    pub rounds_won: u32,
    pub rounds_lost: u32,
    pub headshots: u32,
    pub bodyshots: u32,
    pub legshots: u32,
}

impl StatTotals {
    pub fn rounds_played(&self) -> u32 {
        self.rounds_won + self.rounds_lost
    }
}

/// Display row for one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub match_id: MatchId,
    pub map: String,
    pub mode: String,
    pub started_at: DateTime<Utc>,
    pub agent: String,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub score: u32,
    pub outcome: Outcome,
    pub rounds_won: u32,
    pub rounds_lost: u32,
}

/// Aggregate performance for one player over a match set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub puuid: Puuid,

    pub total_matches: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,

    pub totals: StatTotals,

    /// Kills per death, 2 dp. Equals kills when there are no deaths.
    pub kd: f64,

    /// Percentage of matches won, 1 dp
    pub win_rate: f64,

    /// Headshots as a percentage of all hits, 1 dp
    pub headshot_percentage: f64,

    pub avg_kills: f64,
    pub avg_deaths: f64,
    pub avg_assists: f64,

    /// Nearest whole number
    pub avg_score: f64,

    /// Per-agent breakdown keyed by agent name
    pub agents: BTreeMap<String, Breakdown>,

    /// Per-map breakdown keyed by map name
    pub maps: BTreeMap<String, MapBreakdown>,

    /// Most recent matches first, in input order
    pub recent_matches: Vec<MatchSummary>,
}

impl StatisticsSnapshot {
    /// All-zero snapshot for a player with no usable matches.
    pub fn empty(puuid: Puuid) -> Self {
        Self {
            puuid,
            total_matches: 0,
            wins: 0,
            losses: 0,
            draws: 0,
            totals: StatTotals::default(),
            kd: 0.0,
            win_rate: 0.0,
            headshot_percentage: 0.0,
            avg_kills: 0.0,
            avg_deaths: 0.0,
            avg_assists: 0.0,
            avg_score: 0.0,
            agents: BTreeMap::new(),
            maps: BTreeMap::new(),
            recent_matches: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_matches == 0
    }

    /// Get an agent breakdown by name (case-insensitive).
    pub fn agent(&self, name: &str) -> Option<&Breakdown> {
        self.agents
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// Get a map breakdown by name (case-insensitive).
    pub fn map(&self, name: &str) -> Option<&MapBreakdown> {
        self.maps
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// Agent with the most matches; ties go to the alphabetically first.
    pub fn most_played_agent(&self) -> Option<&str> {
        self.agents
            .iter()
            .max_by(|a, b| a.1.matches.cmp(&b.1.matches).then_with(|| b.0.cmp(a.0)))
            .map(|(name, _)| name.as_str())
    }

    /// Kills per round over the whole match set, 2 dp.
    pub fn kills_per_round(&self) -> f64 {
        let rounds = self.totals.rounds_played();
        if rounds == 0 {
            0.0
        } else {
            round_to(self.totals.kills as f64 / rounds as f64, 2)
        }
    }
}

/// A snapshot as persisted, with the time it was computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSnapshot {
    pub snapshot: StatisticsSnapshot,
    pub updated_at: DateTime<Utc>,
}

impl StoredSnapshot {
    pub fn new(snapshot: StatisticsSnapshot) -> Self {
        Self {
            snapshot,
            updated_at: Utc::now(),
        }
    }

    pub fn puuid(&self) -> &Puuid {
        &self.snapshot.puuid
    }
}
