use gemstone_engine::cards::{DevelopmentCard, Tier};
use gemstone_engine::catalog::StaticCatalog;
use gemstone_engine::engine::GameEngine;
use gemstone_engine::gems::{GemKind, GemSet};
use gemstone_engine::store::{ChangeSet, InMemoryStore};
use gemstone_web::{AppContext, GameService, Hub, HubConfig, ServerConfig, WebServer};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::reply::Response;

struct Api {
    routes: BoxedFilter<(Response,)>,
}

impl Api {
    fn new() -> Self {
        let context = AppContext::new_for_tests();
        Self {
            routes: WebServer::routes(&context),
        }
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let response = warp::test::request()
            .method("GET")
            .path(path)
            .reply(&self.routes)
            .await;
        (response.status(), parse(response.body()))
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let response = warp::test::request()
            .method("POST")
            .path(path)
            .json(&body)
            .reply(&self.routes)
            .await;
        (response.status(), parse(response.body()))
    }

    /// Creates a game for players 1 and 2 and starts it; returns its id.
    async fn started_game(&self) -> i64 {
        let (status, game) = self
            .post("/api/games", json!({ "player_id": 1, "player_count": 2 }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{game}");
        let id = game["id"].as_i64().expect("game id");
        let code = game["room_code"].as_str().expect("room code").to_string();

        let (status, _) = self
            .post("/api/games/join", json!({ "room_code": code, "player_id": 2 }))
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, started) = self
            .post(&format!("/api/games/{id}/start"), json!({ "player_id": 1 }))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(started["status"], "in_progress");
        id
    }
}

fn parse(body: &[u8]) -> Value {
    serde_json::from_slice(body).expect("json body")
}

#[tokio::test]
async fn health_reports_ok() {
    let api = Api::new();
    let (status, body) = api.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["rooms"], 0);
}

#[tokio::test]
async fn lobby_flow_seats_players_in_order() {
    let api = Api::new();
    let (_, game) = api
        .post("/api/games", json!({ "player_id": 7, "player_count": 3 }))
        .await;
    let code = game["room_code"].as_str().expect("room code").to_string();
    assert_eq!(game["status"], "waiting");

    let (status, joined) = api
        .post("/api/games/join", json!({ "room_code": code, "player_id": 8 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(joined["seat"]["seat"], 1);

    let (status, err) = api
        .post("/api/games/join", json!({ "room_code": code, "player_id": 8 }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], "already_joined");

    let (status, err) = api
        .post("/api/games/join", json!({ "room_code": "zzzzzz", "player_id": 9 }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"], "room_not_found");

    let (status, list) = api.get("/api/games?status=waiting&limit=5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["total"], 1);
}

#[tokio::test]
async fn only_the_creator_may_start() {
    let api = Api::new();
    let (_, game) = api
        .post("/api/games", json!({ "player_id": 1, "player_count": 2 }))
        .await;
    let id = game["id"].as_i64().expect("id");

    let (status, err) = api
        .post(&format!("/api/games/{id}/start"), json!({ "player_id": 1 }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(err["error"], "not_enough_players");

    let code = game["room_code"].as_str().expect("code").to_string();
    api.post("/api/games/join", json!({ "room_code": code, "player_id": 2 }))
        .await;
    let (status, err) = api
        .post(&format!("/api/games/{id}/start"), json!({ "player_id": 2 }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(err["error"], "not_game_creator");
}

#[tokio::test]
async fn turn_order_is_enforced_over_http() {
    let api = Api::new();
    let id = api.started_game().await;
    let gems = format!("/api/games/{id}/gems");

    let (status, err) = api
        .post(&gems, json!({ "player_id": 2, "gems": { "ruby": 2 } }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], "not_your_turn");

    let (status, outcome) = api
        .post(
            &gems,
            json!({ "player_id": 1, "gems": { "ruby": 1, "onyx": 1, "emerald": 1 } }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["game"]["current_turn"], 2);
    assert_eq!(outcome["detail"]["action"], "gems_taken");

    let (_, state) = api.get(&format!("/api/games/{id}/state")).await;
    assert_eq!(state["player_states"]["1"]["gems"]["onyx"], 1);
    assert_eq!(state["board"]["bank"]["onyx"], 3);
}

#[tokio::test]
async fn rule_violations_carry_details() {
    let api = Api::new();
    let id = api.started_game().await;

    let (status, err) = api
        .post(
            &format!("/api/games/{id}/gems"),
            json!({ "player_id": 1, "gems": { "ruby": 1, "onyx": 2 } }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(err["error"], "invalid_gem_request");

    let (status, err) = api
        .post(
            &format!("/api/games/{id}/purchase"),
            json!({ "player_id": 1, "card_id": 999 }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"], "card_not_found");
}

#[tokio::test]
async fn blind_reservation_grants_gold() {
    let api = Api::new();
    let id = api.started_game().await;

    let (status, outcome) = api
        .post(
            &format!("/api/games/{id}/reserve"),
            json!({ "player_id": 1, "tier": 3 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["detail"]["gold_granted"], true);

    let (_, state) = api.get(&format!("/api/games/{id}/state")).await;
    assert_eq!(state["player_states"]["1"]["gems"]["gold"], 1);
    assert_eq!(state["board"]["pile_sizes"][2], 15);

    let (_, seen_by_2) = api.get(&format!("/api/games/{id}/state?player_id=2")).await;
    assert_eq!(seen_by_2["player_states"]["1"]["reserved"], json!([]));
    assert_eq!(seen_by_2["player_states"]["1"]["concealed_reserved"], json!([3]));
    assert!(seen_by_2["player_states"]["1"].get("blind_reserved").is_none());

    let (_, seen_by_1) = api.get(&format!("/api/games/{id}/state?player_id=1")).await;
    let reserved = seen_by_1["player_states"]["1"]["reserved"]
        .as_array()
        .expect("reserved cards");
    assert_eq!(reserved.len(), 1);
    assert_eq!(reserved[0]["tier"], 3);
}

#[tokio::test]
async fn game_details_list_the_seats() {
    let api = Api::new();
    let id = api.started_game().await;

    let (status, body) = api.get(&format!("/api/games/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["game"]["id"], id);
    assert_eq!(body["game"]["status"], "in_progress");
    let seats: Vec<(i64, i64)> = body["players"]
        .as_array()
        .expect("players")
        .iter()
        .map(|seat| (seat["player_id"].as_i64().unwrap(), seat["seat"].as_i64().unwrap()))
        .collect();
    assert_eq!(seats, vec![(1, 0), (2, 1)]);

    let (status, err) = api.get("/api/games/404").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"], "game_not_found");
}

#[tokio::test]
async fn stats_are_missing_until_a_game_completes() {
    let api = Api::new();
    api.started_game().await;

    let (status, err) = api.get("/api/stats/users/1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"], "stats_not_found");

    let (status, body) = api.get("/api/stats/leaderboard").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["leaderboard"], json!([]));
}

#[tokio::test]
async fn malformed_requests_get_json_errors() {
    let api = Api::new();
    let id = api.started_game().await;

    let (status, err) = api
        .post(&format!("/api/games/{id}/reserve"), json!({ "player_id": 1 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "invalid_request");

    let (status, err) = api
        .post("/api/games", json!({ "player_id": "one" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "invalid_request");

    let (status, err) = api.get("/api/games/404/state").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"], "game_not_found");

    let (status, err) = api.get("/api/nothing-here").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"], "not_found");
}

#[tokio::test]
async fn completed_game_feeds_stats_and_leaderboard() {
    let engine = Arc::new(
        GameEngine::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(StaticCatalog::standard()),
        )
        .with_seed(3),
    );
    let game = engine.create_game(1, 2).expect("create");
    engine.join_game(&game.room_code, 2).expect("join");
    let game = engine.start_game(game.id, 1).expect("start");

    let mut roster = engine.store().load_roster(game.id).expect("roster");
    roster[0].victory_points = 14;
    roster[1].victory_points = 9;
    let mut board = engine
        .store()
        .load_board(game.id)
        .expect("load")
        .expect("board");
    board.row_mut(Tier::One).visible[0] = DevelopmentCard {
        id: 900,
        tier: Tier::One,
        gem: GemKind::Ruby,
        points: 1,
        cost: GemSet::default(),
    };
    engine
        .store()
        .commit(ChangeSet::new(game.clone()).with_roster(roster).with_board(board))
        .expect("stage the win");

    let (hub, _actor) = Hub::spawn(HubConfig::default());
    let service = GameService::new(Arc::clone(&engine), hub, Duration::from_secs(2));
    let context = AppContext::new_with_dependencies(ServerConfig::for_tests(), Arc::new(service));
    let api = Api {
        routes: WebServer::routes(&context),
    };

    let (status, outcome) = api
        .post(
            &format!("/api/games/{}/purchase", game.id),
            json!({ "player_id": 1, "card_id": 900 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{outcome}");
    assert_eq!(outcome["game"]["status"], "completed");

    let (status, body) = api.get("/api/stats/users/2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["total_games"], 1);
    assert_eq!(body["stats"]["total_losses"], 1);
    assert_eq!(body["stats"]["average_points"], 9.0);

    let (status, body) = api.get("/api/stats/leaderboard?limit=1").await;
    assert_eq!(status, StatusCode::OK);
    let entries = body["leaderboard"].as_array().expect("entries");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["rank"], 1);
    assert_eq!(entries[0]["player_id"], 1);
    assert_eq!(entries[0]["win_rate"], 1.0);
}
