//! Statistics aggregation engine.
//!
//! Folds a player's matches into a [`StatisticsSnapshot`]:
//! - Totals (kills, deaths, assists, score, rounds, shot placement)
//! - Win/loss/draw classification
//! - Derived ratios (kd, win rate, headshot percentage, per-match averages)
//! - Per-agent and per-map breakdowns
//!
//! Everything here is pure and synchronous. The same input always yields
//! the same snapshot.

use std::collections::BTreeMap;

use crate::models::{
    Breakdown, MapBreakdown, Match, MatchSummary, Outcome, Puuid, StatTotals,
    StatisticsSnapshot,
};

/// Maximum number of per-match rows carried on a snapshot.
pub const MAX_MATCH_SUMMARIES: usize = 20;

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Kills per death, 2 dp. With no deaths the ratio is the kill count.
pub fn calculate_kd(kills: u32, deaths: u32) -> f64 {
    if deaths > 0 {
        round_to(kills as f64 / deaths as f64, 2)
    } else {
        kills as f64
    }
}

/// `100 * part / whole`, 1 dp, or 0 when `whole` is 0.
pub fn calculate_percentage(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round_to(100.0 * part as f64 / whole as f64, 1)
    }
}

/// Win rate as a percentage of all matches.
pub fn calculate_win_rate(wins: u32, losses: u32, draws: u32) -> f64 {
    calculate_percentage(wins, wins + losses + draws)
}

/// Headshots as a percentage of all hits.
pub fn calculate_headshot_percentage(headshots: u32, bodyshots: u32, legshots: u32) -> f64 {
    calculate_percentage(headshots, headshots + bodyshots + legshots)
}

/// Per-match average.
pub fn calculate_average(total: u64, matches: u32, places: i32) -> f64 {
    if matches == 0 {
        0.0
    } else {
        round_to(total as f64 / matches as f64, places)
    }
}

/// Render a ratio with fixed precision for display.
pub fn format_ratio(value: f64, places: usize) -> String {
    format!("{:.*}", places, value)
}

#[derive(Debug, Default)]
struct SliceCounter {
    matches: u32,
    wins: u32,
    kills: u32,
    deaths: u32,
    rounds_won: u32,
    rounds_lost: u32,
}

impl SliceCounter {
    fn add(&mut self, won: bool, kills: u32, deaths: u32, rounds_won: u32, rounds_lost: u32) {
        self.matches += 1;
        if won {
            self.wins += 1;
        }
        self.kills += kills;
        self.deaths += deaths;
        self.rounds_won += rounds_won;
        self.rounds_lost += rounds_lost;
    }
}

/// Fold `matches` into a snapshot for `subject`.
///
/// Matches the subject did not take part in are skipped. Empty input gives
/// an all-zero snapshot.
pub fn aggregate(matches: &[Match], subject: &Puuid) -> StatisticsSnapshot {
    let mut totals = StatTotals::default();
    let (mut wins, mut losses, mut draws) = (0u32, 0u32, 0u32);
    let mut agents: BTreeMap<String, SliceCounter> = BTreeMap::new();
    let mut maps: BTreeMap<String, SliceCounter> = BTreeMap::new();
    let mut recent_matches = Vec::new();

    for m in matches {
        let Some(player) = m.participant(subject) else {
            continue;
        };

        let stats = &player.stats;
        let team = m.team(&player.team).cloned().unwrap_or_default();
        let outcome = m.outcome_for(player);

        totals.kills += stats.kills;
        totals.deaths += stats.deaths;
        totals.assists += stats.assists;
        totals.score += stats.score as u64;
        totals.rounds_won += team.rounds_won;
        totals.rounds_lost += team.rounds_lost;
        totals.headshots += stats.headshots;
        totals.bodyshots += stats.bodyshots;
        totals.legshots += stats.legshots;

        match outcome {
            Outcome::Win => wins += 1,
            Outcome::Loss => losses += 1,
            Outcome::Draw => draws += 1,
        }
        let won = outcome == Outcome::Win;

        agents.entry(player.agent.clone()).or_default().add(
            won,
            stats.kills,
            stats.deaths,
            0,
            0,
        );
        maps.entry(m.metadata.map.clone()).or_default().add(
            won,
            stats.kills,
            stats.deaths,
            team.rounds_won,
            team.rounds_lost,
        );

        if recent_matches.len() < MAX_MATCH_SUMMARIES {
            recent_matches.push(MatchSummary {
                match_id: m.metadata.match_id.clone(),
                map: m.metadata.map.clone(),
                mode: m.metadata.mode.clone(),
                started_at: m.metadata.started_at,
                agent: player.agent.clone(),
                kills: stats.kills,
                deaths: stats.deaths,
                assists: stats.assists,
                score: stats.score,
                outcome,
                rounds_won: team.rounds_won,
                rounds_lost: team.rounds_lost,
            });
        }
    }

    let total_matches = wins + losses + draws;

    StatisticsSnapshot {
        puuid: subject.clone(),
        total_matches,
        wins,
        losses,
        draws,
        kd: calculate_kd(totals.kills, totals.deaths),
        win_rate: calculate_win_rate(wins, losses, draws),
        headshot_percentage: calculate_headshot_percentage(
            totals.headshots,
            totals.bodyshots,
            totals.legshots,
        ),
        avg_kills: calculate_average(totals.kills as u64, total_matches, 1),
        avg_deaths: calculate_average(totals.deaths as u64, total_matches, 1),
        avg_assists: calculate_average(totals.assists as u64, total_matches, 1),
        avg_score: calculate_average(totals.score, total_matches, 0),
        agents: agents
            .into_iter()
            .map(|(name, c)| (name, Breakdown::new(c.matches, c.wins, c.kills, c.deaths)))
            .collect(),
        maps: maps
            .into_iter()
            .map(|(name, c)| {
                (
                    name,
                    MapBreakdown::new(
                        c.matches,
                        c.wins,
                        c.kills,
                        c.deaths,
                        c.rounds_won,
                        c.rounds_lost,
                    ),
                )
            })
            .collect(),
        totals,
        recent_matches,
    }
}
