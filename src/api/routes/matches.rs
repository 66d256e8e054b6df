use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Serialize;

use crate::api::routes::players::RegionParams;
use crate::api::state::AppState;
use crate::api::ApiError;
use crate::models::{MatchId, MatchMetadata, MatchPlayer, Outcome, TeamResult};

#[derive(Debug, Serialize)]
pub struct PlayerLine {
    #[serde(flatten)]
    pub player: MatchPlayer,
    pub outcome: Outcome,
}

#[derive(Debug, Serialize)]
pub struct MatchDetailResponse {
    pub metadata: MatchMetadata,
    pub teams: BTreeMap<String, TeamResult>,
    pub players: Vec<PlayerLine>,
}

pub async fn get_match(
    State(state): State<AppState>,
    Path(match_id): Path<String>,
    Query(params): Query<RegionParams>,
) -> Result<Json<MatchDetailResponse>, ApiError> {
    if match_id.trim().is_empty() {
        return Err(ApiError::BadRequest("match id is empty".to_string()));
    }
    let region = state.region(params.region.as_deref())?;

    let detail = state
        .client
        .fetch_match_detail(&MatchId::new(match_id), region)
        .await?;

    let players = detail
        .players
        .iter()
        .map(|player| PlayerLine {
            outcome: detail.outcome_for(player),
            player: player.clone(),
        })
        .collect();

    Ok(Json(MatchDetailResponse {
        metadata: detail.metadata.clone(),
        teams: detail.teams.clone(),
        players,
    }))
}

#[cfg(test)]
mod tests {
    use crate::api::build_router;
    use crate::api::test_support::{get_json, state_with};
    use crate::fetch::source::MockMatchSource;
    use crate::models::fixtures::MatchFixture;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_get_match() {
        let source = MockMatchSource::new().with_match(
            "p1",
            MatchFixture::new("m1", "p1").map("Bind").won(true).into_json(),
        );
        let (state, _) = state_with(source);
        let (status, json) = get_json(build_router(state), "/api/matches/m1").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["metadata"]["map"], "Bind");
        assert_eq!(json["metadata"]["match_id"], "m1");

        let players = json["players"].as_array().unwrap();
        assert_eq!(players.len(), 2);
        let me = players.iter().find(|p| p["puuid"] == "p1").unwrap();
        assert_eq!(me["outcome"], "win");
        assert_eq!(me["stats"]["kills"], 10);
        assert!(json.get("raw").is_none());
    }

    #[tokio::test]
    async fn test_get_unknown_match() {
        let (state, _) = state_with(MockMatchSource::new());
        let (status, json) = get_json(build_router(state), "/api/matches/nope").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_get_match_upstream_failure() {
        let source = MockMatchSource::new().with_failing_match("p1", "broken");
        let (state, _) = state_with(source);
        let (status, json) = get_json(build_router(state), "/api/matches/broken").await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json["error"]["code"], "UPSTREAM_ERROR");
    }
}
