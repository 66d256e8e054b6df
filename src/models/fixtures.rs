//! Match payload builders for tests.

use serde_json::{json, Value};

/// Builds a provider-shaped match payload with the subject on the red team
/// and a single opponent on blue.
#[derive(Debug, Clone)]
pub struct MatchFixture {
    match_id: String,
    subject: String,
    agent: String,
    map: String,
    mode: String,
    game_start: i64,
    kills: u32,
    deaths: u32,
    assists: u32,
    score: u32,
    shots: (u32, u32, u32),
    /// `None` means neither team is flagged as the winner
    won: Option<bool>,
    rounds: (u32, u32),
}

impl MatchFixture {
    pub fn new(match_id: &str, subject: &str) -> Self {
        Self {
            match_id: match_id.to_string(),
            subject: subject.to_string(),
            agent: "Jett".to_string(),
            map: "Ascent".to_string(),
            mode: "Competitive".to_string(),
            game_start: 1_700_000_000,
            kills: 10,
            deaths: 10,
            assists: 3,
            score: 4000,
            shots: (10, 20, 2),
            won: Some(false),
            rounds: (11, 13),
        }
    }

    pub fn agent(mut self, agent: &str) -> Self {
        self.agent = agent.to_string();
        self
    }

    pub fn map(mut self, map: &str) -> Self {
        self.map = map.to_string();
        self
    }

    pub fn started_at(mut self, unix_secs: i64) -> Self {
        self.game_start = unix_secs;
        self
    }

    pub fn kills_deaths(mut self, kills: u32, deaths: u32) -> Self {
        self.kills = kills;
        self.deaths = deaths;
        self
    }

    pub fn assists(mut self, assists: u32) -> Self {
        self.assists = assists;
        self
    }

    pub fn score(mut self, score: u32) -> Self {
        self.score = score;
        self
    }

    pub fn shots(mut self, headshots: u32, bodyshots: u32, legshots: u32) -> Self {
        self.shots = (headshots, bodyshots, legshots);
        self
    }

    pub fn won(mut self, won: bool) -> Self {
        self.won = Some(won);
        self
    }

    pub fn rounds(mut self, won: u32, lost: u32) -> Self {
        self.rounds = (won, lost);
        self
    }

    /// Nobody flagged as winner, level on rounds.
    pub fn draw(mut self) -> Self {
        self.won = None;
        self.rounds = (12, 12);
        self
    }

    /// The `data` object of a match-detail response.
    pub fn into_json(self) -> Value {
        let (headshots, bodyshots, legshots) = self.shots;
        let (rounds_won, rounds_lost) = self.rounds;
        let red_won = self.won == Some(true);
        let blue_won = self.won == Some(false);

        json!({
            "metadata": {
                "matchid": self.match_id,
                "map": self.map,
                "mode": self.mode,
                "game_start": self.game_start,
                "game_length": 1_800_000,
                "rounds_played": rounds_won + rounds_lost,
                "region": "eu"
            },
            "players": {
                "all_players": [
                    {
                        "puuid": self.subject,
                        "name": "Subject",
                        "tag": "TEST",
                        "team": "Red",
                        "character": self.agent,
                        "stats": {
                            "score": self.score,
                            "kills": self.kills,
                            "deaths": self.deaths,
                            "assists": self.assists,
                            "headshots": headshots,
                            "bodyshots": bodyshots,
                            "legshots": legshots
                        }
                    },
                    {
                        "puuid": format!("opponent-{}", self.match_id),
                        "name": "Opponent",
                        "tag": "TEST",
                        "team": "Blue",
                        "character": "Sova",
                        "stats": {
                            "score": 3000, "kills": 8, "deaths": 12, "assists": 4,
                            "headshots": 5, "bodyshots": 30, "legshots": 5
                        }
                    }
                ]
            },
            "teams": {
                "red": { "has_won": red_won, "rounds_won": rounds_won, "rounds_lost": rounds_lost },
                "blue": { "has_won": blue_won, "rounds_won": rounds_lost, "rounds_lost": rounds_won }
            }
        })
    }
}
