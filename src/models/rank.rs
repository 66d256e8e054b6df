//! Competitive rank observations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Puuid;

/// Point-in-time competitive standing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankSnapshot {
    /// Numeric tier (0 = unranked)
    pub tier: u32,

    /// Display name of the tier (e.g. "Diamond 2")
    pub tier_name: String,

    /// Rating within the tier
    pub rating: u32,

    pub leaderboard_position: Option<u32>,

    pub season: String,
}

/// An immutable, append-only rank observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankSample {
    pub id: Uuid,
    pub puuid: Puuid,
    #[serde(flatten)]
    pub rank: RankSnapshot,
    pub observed_at: DateTime<Utc>,
}

impl RankSample {
    pub fn new(puuid: Puuid, rank: RankSnapshot) -> Self {
        Self {
            id: Uuid::new_v4(),
            puuid,
            rank,
            observed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> RankSnapshot {
        RankSnapshot {
            tier: 19,
            tier_name: "Diamond 2".to_string(),
            rating: 45,
            leaderboard_position: None,
            season: "e9a1".to_string(),
        }
    }

    #[test]
    fn test_samples_get_distinct_ids() {
        let a = RankSample::new(Puuid::from("p1"), diamond());
        let b = RankSample::new(Puuid::from("p1"), diamond());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_sample_serializes_flat() {
        let sample = RankSample::new(Puuid::from("p1"), diamond());
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["tier_name"], "Diamond 2");
        assert_eq!(json["puuid"], "p1");

        let parsed: RankSample = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, sample);
    }
}
