use axum::extract::{Path, State};
use axum::Json;
use serde_json::Value;

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::models::Region;

/// Regional leaderboard, passed through from the provider.
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Path(region): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let region: Region = region.parse()?;
    let board = state.client.leaderboard(region).await?;
    Ok(Json(board))
}

#[cfg(test)]
mod tests {
    use crate::api::build_router;
    use crate::api::test_support::{get_json, state_with};
    use crate::fetch::source::MockMatchSource;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_get_leaderboard() {
        let (state, _) = state_with(MockMatchSource::new());
        let (status, json) = get_json(build_router(state), "/api/leaderboard/NA").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json[0]["region"], "na");
        assert_eq!(json[0]["leaderboardRank"], 1);
    }

    #[tokio::test]
    async fn test_get_leaderboard_unknown_region() {
        let (state, _) = state_with(MockMatchSource::new());
        let (status, json) = get_json(build_router(state), "/api/leaderboard/moon").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"]["message"].as_str().unwrap().contains("moon"));
    }
}
