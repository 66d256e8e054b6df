//! Match models.
//!
//! [`Match`] is the parsed upstream match payload with every participant;
//! [`MatchRecord`] is one player's participation in it, which is what gets
//! persisted.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{MatchId, Puuid};

/// Result of a match from one team's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Loss,
    Draw,
}

impl Outcome {
    /// Classify a match for the team `own`.
    ///
    /// The won flag always wins over the round comparison: a draw requires
    /// that no team is flagged as the winner and that every team finished on
    /// the same number of rounds won.
    pub fn classify(own: Option<&TeamResult>, teams: &BTreeMap<String, TeamResult>) -> Self {
        if own.is_some_and(|t| t.has_won) {
            return Outcome::Win;
        }

        let nobody_won = teams.values().all(|t| !t.has_won);
        let mut rounds = teams.values().map(|t| t.rounds_won);
        let level = match rounds.next() {
            Some(first) => teams.len() >= 2 && rounds.all(|r| r == first),
            None => false,
        };

        if nobody_won && level {
            Outcome::Draw
        } else {
            Outcome::Loss
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            Outcome::Win => "win",
            Outcome::Loss => "loss",
            Outcome::Draw => "draw",
        })
    }
}

/// Per-team result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamResult {
    pub has_won: bool,
    pub rounds_won: u32,
    pub rounds_lost: u32,
}

/// Match-level metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchMetadata {
    pub match_id: MatchId,
    pub map: String,
    pub mode: String,
    pub started_at: DateTime<Utc>,
    pub duration_secs: u64,
    pub rounds_played: u32,
    pub region: Option<String>,
}

/// Scoreboard line for a single player.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub score: u32,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub headshots: u32,
    pub bodyshots: u32,
    pub legshots: u32,
}

/// One participant in a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPlayer {
    pub puuid: Puuid,
    pub name: String,
    pub tag: String,
    /// Team key, lowercased (e.g. "red", "blue")
    pub team: String,
    pub agent: String,
    pub stats: PlayerStats,
}

/// A completed match with every participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub metadata: MatchMetadata,
    pub players: Vec<MatchPlayer>,
    /// Team results keyed by lowercased team name
    pub teams: BTreeMap<String, TeamResult>,
    /// Upstream payload as received
    pub raw: Value,
}

// Wire shapes of the provider's match payload. Fields that the provider
// leaves null for some modes (deathmatch has no teams) default to zero.

#[derive(Debug, Deserialize)]
struct WireMatch {
    metadata: WireMetadata,
    #[serde(default)]
    players: Option<WirePlayers>,
    #[serde(default)]
    teams: Option<BTreeMap<String, Option<WireTeam>>>,
}

#[derive(Debug, Deserialize)]
struct WireMetadata {
    matchid: String,
    #[serde(default)]
    map: Option<String>,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    game_start: i64,
    /// Milliseconds
    #[serde(default)]
    game_length: u64,
    #[serde(default)]
    rounds_played: u32,
    #[serde(default)]
    region: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WirePlayers {
    #[serde(default)]
    all_players: Vec<WirePlayer>,
}

#[derive(Debug, Deserialize)]
struct WirePlayer {
    puuid: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    tag: String,
    #[serde(default)]
    team: String,
    #[serde(default)]
    character: String,
    #[serde(default)]
    stats: WireStats,
}

#[derive(Debug, Default, Deserialize)]
struct WireStats {
    #[serde(default)]
    score: Option<u32>,
    #[serde(default)]
    kills: Option<u32>,
    #[serde(default)]
    deaths: Option<u32>,
    #[serde(default)]
    assists: Option<u32>,
    #[serde(default)]
    headshots: Option<u32>,
    #[serde(default)]
    bodyshots: Option<u32>,
    #[serde(default)]
    legshots: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WireTeam {
    #[serde(default)]
    has_won: Option<bool>,
    #[serde(default)]
    rounds_won: Option<u32>,
    #[serde(default)]
    rounds_lost: Option<u32>,
}

impl Match {
    /// Parse the provider's match payload (the `data` object of the
    /// match-detail response).
    pub fn from_upstream(data: &Value) -> Result<Self, serde_json::Error> {
        let wire = WireMatch::deserialize(data)?;

        let started_at = Utc
            .timestamp_opt(wire.metadata.game_start, 0)
            .single()
            .unwrap_or_default();

        let metadata = MatchMetadata {
            match_id: MatchId::new(wire.metadata.matchid),
            map: wire.metadata.map.unwrap_or_else(|| "Unknown".to_string()),
            mode: wire.metadata.mode.unwrap_or_else(|| "Unknown".to_string()),
            started_at,
            duration_secs: wire.metadata.game_length / 1000,
            rounds_played: wire.metadata.rounds_played,
            region: wire.metadata.region,
        };

        let players = wire
            .players
            .map(|p| p.all_players)
            .unwrap_or_default()
            .into_iter()
            .map(|p| MatchPlayer {
                puuid: Puuid::new(p.puuid),
                name: p.name,
                tag: p.tag,
                team: p.team.to_lowercase(),
                agent: p.character,
                stats: PlayerStats {
                    score: p.stats.score.unwrap_or(0),
                    kills: p.stats.kills.unwrap_or(0),
                    deaths: p.stats.deaths.unwrap_or(0),
                    assists: p.stats.assists.unwrap_or(0),
                    headshots: p.stats.headshots.unwrap_or(0),
                    bodyshots: p.stats.bodyshots.unwrap_or(0),
                    legshots: p.stats.legshots.unwrap_or(0),
                },
            })
            .collect();

        let teams = wire
            .teams
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(name, team)| {
                let team = team?;
                Some((
                    name.to_lowercase(),
                    TeamResult {
                        has_won: team.has_won.unwrap_or(false),
                        rounds_won: team.rounds_won.unwrap_or(0),
                        rounds_lost: team.rounds_lost.unwrap_or(0),
                    },
                ))
            })
            .collect();

        Ok(Self {
            metadata,
            players,
            teams,
            raw: data.clone(),
        })
    }

    pub fn id(&self) -> &MatchId {
        &self.metadata.match_id
    }

    /// Find a player's scoreboard line.
    pub fn participant(&self, puuid: &Puuid) -> Option<&MatchPlayer> {
        self.players.iter().find(|p| &p.puuid == puuid)
    }

    pub fn team(&self, name: &str) -> Option<&TeamResult> {
        self.teams.get(&name.to_lowercase())
    }

    /// Outcome from the given player's perspective.
    pub fn outcome_for(&self, player: &MatchPlayer) -> Outcome {
        Outcome::classify(self.team(&player.team), &self.teams)
    }

    /// Extract one player's participation, or `None` if they did not play.
    pub fn record_for(&self, puuid: &Puuid) -> Option<MatchRecord> {
        let player = self.participant(puuid)?;
        let team = self.team(&player.team).cloned().unwrap_or_default();

        Some(MatchRecord {
            match_id: self.metadata.match_id.clone(),
            puuid: puuid.clone(),
            map: self.metadata.map.clone(),
            mode: self.metadata.mode.clone(),
            started_at: self.metadata.started_at,
            duration_secs: self.metadata.duration_secs,
            agent: player.agent.clone(),
            stats: player.stats.clone(),
            outcome: self.outcome_for(player),
            rounds_won: team.rounds_won,
            rounds_lost: team.rounds_lost,
            raw: self.raw.clone(),
        })
    }
}

/// One player's recorded participation in one completed match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub match_id: MatchId,
    pub puuid: Puuid,
    pub map: String,
    pub mode: String,
    pub started_at: DateTime<Utc>,
    pub duration_secs: u64,
    pub agent: String,
    pub stats: PlayerStats,
    pub outcome: Outcome,
    pub rounds_won: u32,
    pub rounds_lost: u32,
    /// Full upstream payload, kept for replay and debugging
    pub raw: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::MatchFixture;

    fn teams(entries: &[(&str, bool, u32)]) -> BTreeMap<String, TeamResult> {
        entries
            .iter()
            .map(|(name, won, rounds)| {
                (
                    name.to_string(),
                    TeamResult {
                        has_won: *won,
                        rounds_won: *rounds,
                        rounds_lost: 0,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_classify_win_flag_beats_equal_rounds() {
        let t = teams(&[("red", true, 12), ("blue", false, 12)]);
        assert_eq!(Outcome::classify(t.get("red"), &t), Outcome::Win);
        assert_eq!(Outcome::classify(t.get("blue"), &t), Outcome::Loss);
    }

    #[test]
    fn test_classify_draw() {
        let t = teams(&[("red", false, 12), ("blue", false, 12)]);
        assert_eq!(Outcome::classify(t.get("red"), &t), Outcome::Draw);
    }

    #[test]
    fn test_classify_loss_without_flag() {
        let t = teams(&[("red", false, 10), ("blue", false, 13)]);
        assert_eq!(Outcome::classify(t.get("red"), &t), Outcome::Loss);
    }

    #[test]
    fn test_classify_without_teams_is_loss() {
        let t = BTreeMap::new();
        assert_eq!(Outcome::classify(None, &t), Outcome::Loss);
    }

    #[test]
    fn test_from_upstream_parses_payload() {
        let json = MatchFixture::new("m1", "me")
            .agent("Jett")
            .map("Ascent")
            .kills_deaths(20, 10)
            .won(true)
            .into_json();

        let m = Match::from_upstream(&json).unwrap();
        assert_eq!(m.id().as_str(), "m1");
        assert_eq!(m.metadata.map, "Ascent");
        assert_eq!(m.metadata.duration_secs, 1800);
        assert_eq!(m.players.len(), 2);
        assert!(m.team("Red").unwrap().has_won);
        assert_eq!(m.raw, json);
    }

    #[test]
    fn test_from_upstream_tolerates_missing_teams() {
        let json = serde_json::json!({
            "metadata": { "matchid": "dm-1", "map": "Bind", "mode": "Deathmatch", "game_start": 1700000000 },
            "players": { "all_players": [
                { "puuid": "me", "team": "Neutral", "character": "Reyna",
                  "stats": { "kills": 40, "deaths": 21, "score": null } }
            ]},
            "teams": { "red": null, "blue": null }
        });

        let m = Match::from_upstream(&json).unwrap();
        assert!(m.teams.is_empty());
        let record = m.record_for(&Puuid::from("me")).unwrap();
        assert_eq!(record.stats.kills, 40);
        assert_eq!(record.stats.score, 0);
        assert_eq!(record.outcome, Outcome::Loss);
    }

    #[test]
    fn test_from_upstream_rejects_missing_match_id() {
        let json = serde_json::json!({ "metadata": { "map": "Bind" } });
        assert!(Match::from_upstream(&json).is_err());
    }

    #[test]
    fn test_record_for_absent_player() {
        let json = MatchFixture::new("m1", "me").into_json();
        let m = Match::from_upstream(&json).unwrap();
        assert!(m.record_for(&Puuid::from("someone-else")).is_none());
    }

    #[test]
    fn test_record_for_carries_team_rounds() {
        let json = MatchFixture::new("m1", "me").rounds(13, 7).won(true).into_json();
        let m = Match::from_upstream(&json).unwrap();
        let record = m.record_for(&Puuid::from("me")).unwrap();
        assert_eq!(record.outcome, Outcome::Win);
        assert_eq!(record.rounds_won, 13);
        assert_eq!(record.rounds_lost, 7);
    }
}
