use super::game::{service_error, success_response};
use crate::service::GameService;
use gemstone_engine::state::PlayerId;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::Response;

#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Career totals for one player.
///
/// - **Method**: GET
/// - **Path**: `/api/stats/users/{id}`
/// - **Success (200 OK)**: `{"stats": {...}}`
/// - **Error (404)**: `stats_not_found` until the player finishes a game
pub async fn player_stats(service: Arc<GameService>, player_id: PlayerId) -> Response {
    match service.player_stats(player_id).await {
        Ok(stats) => success_response(StatusCode::OK, json!({ "stats": stats })),
        Err(err) => service_error(err),
    }
}

/// Players ranked by win rate, then total wins.
///
/// - **Method**: GET
/// - **Path**: `/api/stats/leaderboard?limit=10&offset=0`
/// - **Success (200 OK)**: `{"leaderboard": [...]}`, empty past the end
pub async fn leaderboard(service: Arc<GameService>, query: LeaderboardQuery) -> Response {
    match service
        .leaderboard(query.limit.unwrap_or(0), query.offset.unwrap_or(0))
        .await
    {
        Ok(entries) => success_response(StatusCode::OK, json!({ "leaderboard": entries })),
        Err(err) => service_error(err),
    }
}
