use crate::errors::{ErrorResponse, IntoErrorResponse};
use crate::service::{GameService, ServiceError};
use gemstone_engine::cards::{CardId, Tier};
use gemstone_engine::engine::{PurchaseSource, ReserveTarget};
use gemstone_engine::lobby::DEFAULT_LIST_LIMIT;
use gemstone_engine::rules::GemRequest;
use gemstone_engine::state::{Game, GameId, GamePlayer, GameStatus, PlayerId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::{self, Response};
use warp::Reply;

#[derive(Debug, Deserialize)]
pub struct CreateGameRequest {
    pub player_id: PlayerId,
    pub player_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct JoinGameRequest {
    pub room_code: String,
    pub player_id: PlayerId,
}

/// Body of requests that only identify the caller.
#[derive(Debug, Deserialize)]
pub struct PlayerRequest {
    pub player_id: PlayerId,
}

#[derive(Debug, Deserialize)]
pub struct TakeGemsRequest {
    pub player_id: PlayerId,
    pub gems: GemRequest,
}

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub player_id: PlayerId,
    pub card_id: CardId,
    #[serde(default)]
    pub from_reserve: bool,
}

/// Either `card_id` for a face-up card or `tier` for a blind draw.
#[derive(Debug, Deserialize)]
pub struct ReserveRequest {
    pub player_id: PlayerId,
    pub card_id: Option<CardId>,
    pub tier: Option<Tier>,
}

impl ReserveRequest {
    fn target(&self) -> Result<ReserveTarget, ErrorResponse> {
        match (self.card_id, self.tier) {
            (Some(card), None) => Ok(ReserveTarget::Visible(card)),
            (None, Some(tier)) => Ok(ReserveTarget::Deck(tier)),
            _ => Err(ErrorResponse::new(
                "invalid_request",
                "exactly one of `card_id` or `tier` is required",
            )),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListGamesQuery {
    pub status: Option<GameStatus>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Whose eyes the state is rendered for.
#[derive(Debug, Default, Deserialize)]
pub struct StateQuery {
    pub player_id: Option<PlayerId>,
}

#[derive(Debug, Serialize)]
pub struct GameDetailsResponse {
    pub game: Game,
    pub players: Vec<GamePlayer>,
}

#[derive(Debug, Serialize)]
pub struct JoinGameResponse {
    pub game: Game,
    pub seat: GamePlayer,
}

/// Opens a waiting room.
///
/// - **Method**: POST
/// - **Path**: `/api/games`
/// - **Body**: `{"player_id": 1, "player_count": 3}`
/// - **Success (201 Created)**: the new game, including its room code
/// - **Error (400)**: `invalid_player_count`
pub async fn create_game(service: Arc<GameService>, request: CreateGameRequest) -> Response {
    match service
        .create_game(request.player_id, request.player_count)
        .await
    {
        Ok(game) => success_response(StatusCode::CREATED, game),
        Err(err) => service_error(err),
    }
}

/// Takes the next free seat in the room with the given code.
///
/// - **Method**: POST
/// - **Path**: `/api/games/join`
/// - **Body**: `{"room_code": "a1b2c3", "player_id": 2}`
/// - **Error (404)**: `room_not_found`; **(409)**: `game_full`,
///   `already_joined`, `wrong_game_status`
pub async fn join_game(service: Arc<GameService>, request: JoinGameRequest) -> Response {
    match service
        .join_game(request.room_code, request.player_id)
        .await
    {
        Ok((game, seat)) => success_response(StatusCode::OK, JoinGameResponse { game, seat }),
        Err(err) => service_error(err),
    }
}

pub async fn leave_game(
    service: Arc<GameService>,
    game_id: GameId,
    request: PlayerRequest,
) -> Response {
    match service.leave_game(game_id, request.player_id).await {
        Ok(game) => success_response(StatusCode::OK, game),
        Err(err) => service_error(err),
    }
}

/// Deals the board and hands the first turn to seat 0. Creator only.
pub async fn start_game(
    service: Arc<GameService>,
    game_id: GameId,
    request: PlayerRequest,
) -> Response {
    match service.start_game(game_id, request.player_id).await {
        Ok(game) => success_response(StatusCode::OK, game),
        Err(err) => service_error(err),
    }
}

pub async fn list_games(service: Arc<GameService>, query: ListGamesQuery) -> Response {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    match service
        .list_games(query.status, limit, query.offset.unwrap_or(0))
        .await
    {
        Ok(list) => success_response(StatusCode::OK, list),
        Err(err) => service_error(err),
    }
}

/// The game record and its seats.
///
/// - **Method**: GET
/// - **Path**: `/api/games/{id}`
/// - **Success (200 OK)**: `{"game": {...}, "players": [...]}`
/// - **Error (404)**: `game_not_found`
pub async fn game_details(service: Arc<GameService>, game_id: GameId) -> Response {
    match service.game_details(game_id).await {
        Ok((game, players)) => {
            success_response(StatusCode::OK, GameDetailsResponse { game, players })
        }
        Err(err) => service_error(err),
    }
}

/// Board (piles reduced to sizes), roster and every player's state.
/// Cards other players reserved blind show only as tiers unless
/// `?player_id=` names their owner.
pub async fn game_state(
    service: Arc<GameService>,
    game_id: GameId,
    query: StateQuery,
) -> Response {
    match service.full_state(game_id, query.player_id).await {
        Ok(state) => success_response(StatusCode::OK, state),
        Err(err) => service_error(err),
    }
}

/// Takes three gems of distinct colors or two of one color.
///
/// - **Method**: POST
/// - **Path**: `/api/games/{id}/gems`
/// - **Body**: `{"player_id": 1, "gems": {"ruby": 1, "onyx": 1, "emerald": 1}}`
/// - **Success (200 OK)**: the action outcome, with the next turn holder
/// - **Error (409)**: `not_your_turn`; **(422)**: `invalid_gem_request`,
///   `insufficient_bank_supply`, `gem_limit_exceeded`
pub async fn take_gems(
    service: Arc<GameService>,
    game_id: GameId,
    request: TakeGemsRequest,
) -> Response {
    match service
        .take_gems(game_id, request.player_id, request.gems)
        .await
    {
        Ok(outcome) => success_response(StatusCode::OK, outcome),
        Err(err) => service_error(err),
    }
}

pub async fn purchase_card(
    service: Arc<GameService>,
    game_id: GameId,
    request: PurchaseRequest,
) -> Response {
    let source = if request.from_reserve {
        PurchaseSource::Reserve
    } else {
        PurchaseSource::Board
    };
    match service
        .purchase_card(game_id, request.player_id, request.card_id, source)
        .await
    {
        Ok(outcome) => success_response(StatusCode::OK, outcome),
        Err(err) => service_error(err),
    }
}

pub async fn reserve_card(
    service: Arc<GameService>,
    game_id: GameId,
    request: ReserveRequest,
) -> Response {
    let target = match request.target() {
        Ok(target) => target,
        Err(body) => return body.into_response(StatusCode::BAD_REQUEST),
    };
    match service
        .reserve_card(game_id, request.player_id, target)
        .await
    {
        Ok(outcome) => success_response(StatusCode::OK, outcome),
        Err(err) => service_error(err),
    }
}

pub(crate) fn success_response<T>(status: StatusCode, body: T) -> Response
where
    T: Serialize,
{
    reply::with_status(reply::json(&body), status).into_response()
}

pub(crate) fn service_error(err: ServiceError) -> Response {
    err.into_http_response()
}
