pub mod game;
pub mod health;
pub mod sse;
pub mod stats;

pub use game::{
    create_game, game_details, game_state, join_game, leave_game, list_games, purchase_card,
    reserve_card, start_game, take_gems, CreateGameRequest, GameDetailsResponse,
    JoinGameRequest, JoinGameResponse, ListGamesQuery, PlayerRequest, PurchaseRequest,
    ReserveRequest, StateQuery, TakeGemsRequest,
};
pub use health::health;
pub use sse::{stream_events, EventsQuery};
pub use stats::{leaderboard, player_stats, LeaderboardQuery};

use crate::errors::ErrorResponse;
use std::convert::Infallible;
use warp::filters::body::BodyDeserializeError;
use warp::http::StatusCode;
use warp::reject::{
    InvalidQuery, LengthRequired, MethodNotAllowed, PayloadTooLarge, UnsupportedMediaType,
};
use warp::reply::Response;
use warp::Rejection;

/// Turns filter rejections into the same JSON error body handlers use.
pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (status, body) = if err.is_not_found() {
        (
            StatusCode::NOT_FOUND,
            ErrorResponse::new("not_found", "No such route"),
        )
    } else if let Some(cause) = err.find::<BodyDeserializeError>() {
        (
            StatusCode::BAD_REQUEST,
            ErrorResponse::new("invalid_request", cause.to_string()),
        )
    } else if let Some(cause) = err.find::<InvalidQuery>() {
        (
            StatusCode::BAD_REQUEST,
            ErrorResponse::new("invalid_request", cause.to_string()),
        )
    } else if err.find::<LengthRequired>().is_some() {
        (
            StatusCode::LENGTH_REQUIRED,
            ErrorResponse::new("length_required", "Content-Length header is required"),
        )
    } else if err.find::<PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            ErrorResponse::new("payload_too_large", "Request body is too large"),
        )
    } else if err.find::<UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ErrorResponse::new("unsupported_media_type", "Expected a JSON body"),
        )
    } else if err.find::<MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            ErrorResponse::new("method_not_allowed", "Method not allowed"),
        )
    } else {
        tracing::error!(rejection = ?err, "unhandled rejection");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorResponse::new("internal_error", "Internal server error"),
        )
    };

    Ok(body.into_response(status))
}
