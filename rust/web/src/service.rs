//! Async front of the game engine.
//!
//! Engine calls are synchronous and may block on storage, so each one runs
//! on the blocking pool under the configured storage timeout. After a
//! successful commit the matching events are serialized and handed to the
//! hub for the game's room. A call that misses the timeout is not
//! abandoned: if it commits later, its events are still broadcast.

use crate::events::GameEvent;
use crate::hub::{ConnectionId, Hub, HubError, Payload};
use gemstone_engine::cards::CardId;
use gemstone_engine::engine::{ActionOutcome, GameEngine, PurchaseSource, ReserveTarget};
use gemstone_engine::errors::GameError;
use gemstone_engine::lobby::GameList;
use gemstone_engine::rules::GemRequest;
use gemstone_engine::state::{FullGameState, Game, GameId, GamePlayer, GameStatus, PlayerId};
use gemstone_engine::stats::{LeaderboardEntry, PlayerStats};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio_stream::Stream;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Game(#[from] GameError),
    #[error("{operation} timed out after {timeout_ms} ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },
    #[error("{operation} task failed: {message}")]
    Join {
        operation: &'static str,
        message: String,
    },
    #[error(transparent)]
    Hub(#[from] HubError),
}

/// A registered connection's stream of payloads.
///
/// Dropping the subscription unregisters the connection from its room.
#[derive(Debug)]
pub struct Subscription {
    game_id: GameId,
    connection_id: ConnectionId,
    player_id: Option<PlayerId>,
    receiver: mpsc::Receiver<Payload>,
    hub: Hub,
}

impl Subscription {
    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn player_id(&self) -> Option<PlayerId> {
        self.player_id
    }
}

impl Stream for Subscription {
    type Item = Payload;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Payload>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.release(self.game_id, self.connection_id);
    }
}

#[derive(Debug, Clone)]
pub struct GameService {
    engine: Arc<GameEngine>,
    hub: Hub,
    timeout: Duration,
}

impl GameService {
    pub fn new(engine: Arc<GameEngine>, hub: Hub, timeout: Duration) -> Self {
        Self {
            engine,
            hub,
            timeout,
        }
    }

    pub fn engine(&self) -> &Arc<GameEngine> {
        &self.engine
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    pub async fn create_game(
        &self,
        creator: PlayerId,
        player_count: usize,
    ) -> Result<Game, ServiceError> {
        self.run("create_game", move |engine| {
            engine.create_game(creator, player_count)
        })
        .await
    }

    pub async fn join_game(
        &self,
        room_code: String,
        player: PlayerId,
    ) -> Result<(Game, GamePlayer), ServiceError> {
        self.commit(
            "join_game",
            move |engine| engine.join_game(&room_code, player),
            |(game, seat)| vec![GameEvent::player_joined(game, seat)],
        )
        .await
    }

    pub async fn leave_game(&self, game_id: GameId, player: PlayerId) -> Result<Game, ServiceError> {
        self.commit(
            "leave_game",
            move |engine| engine.leave_game(game_id, player),
            move |game| vec![GameEvent::player_left(game, player)],
        )
        .await
    }

    pub async fn start_game(
        &self,
        game_id: GameId,
        requester: PlayerId,
    ) -> Result<Game, ServiceError> {
        let (game, _) = self
            .commit(
                "start_game",
                move |engine| {
                    let game = engine.start_game(game_id, requester)?;
                    let roster = engine.store().load_roster(game_id)?;
                    Ok((game, roster))
                },
                |(game, roster)| vec![GameEvent::game_started(game, roster)],
            )
            .await?;
        Ok(game)
    }

    pub async fn take_gems(
        &self,
        game_id: GameId,
        player: PlayerId,
        request: GemRequest,
    ) -> Result<ActionOutcome, ServiceError> {
        self.commit(
            "take_gems",
            move |engine| engine.take_gems(game_id, player, &request),
            GameEvent::from_outcome,
        )
        .await
    }

    pub async fn purchase_card(
        &self,
        game_id: GameId,
        player: PlayerId,
        card: CardId,
        source: PurchaseSource,
    ) -> Result<ActionOutcome, ServiceError> {
        self.commit(
            "purchase_card",
            move |engine| engine.purchase_card(game_id, player, card, source),
            GameEvent::from_outcome,
        )
        .await
    }

    pub async fn reserve_card(
        &self,
        game_id: GameId,
        player: PlayerId,
        target: ReserveTarget,
    ) -> Result<ActionOutcome, ServiceError> {
        self.commit(
            "reserve_card",
            move |engine| engine.reserve_card(game_id, player, target),
            GameEvent::from_outcome,
        )
        .await
    }

    /// Game state as `viewer` may see it: other players' blind
    /// reservations are reduced to their tiers. `None` conceals them all.
    pub async fn full_state(
        &self,
        game_id: GameId,
        viewer: Option<PlayerId>,
    ) -> Result<FullGameState, ServiceError> {
        self.run("full_state", move |engine| {
            Ok(engine.full_state(game_id)?.concealed_for(viewer))
        })
        .await
    }

    /// The game record with its seats in order.
    pub async fn game_details(
        &self,
        game_id: GameId,
    ) -> Result<(Game, Vec<GamePlayer>), ServiceError> {
        self.run("game_details", move |engine| {
            let game = engine.game(game_id)?;
            let roster = engine.store().load_roster(game_id)?;
            Ok((game, roster))
        })
        .await
    }

    pub async fn player_stats(&self, player_id: PlayerId) -> Result<PlayerStats, ServiceError> {
        self.run("player_stats", move |engine| engine.player_stats(player_id))
            .await
    }

    pub async fn leaderboard(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LeaderboardEntry>, ServiceError> {
        self.run("leaderboard", move |engine| engine.leaderboard(limit, offset))
            .await
    }

    pub async fn list_games(
        &self,
        status: Option<GameStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<GameList, ServiceError> {
        self.run("list_games", move |engine| {
            engine.list_games(status, limit, offset)
        })
        .await
    }

    /// Registers a new connection for an existing game. The `connected`
    /// welcome is queued before registration so it precedes any broadcast.
    pub async fn subscribe(
        &self,
        game_id: GameId,
        player_id: Option<PlayerId>,
    ) -> Result<Subscription, ServiceError> {
        let game = self
            .run("load_game", move |engine| engine.game(game_id))
            .await?;

        let (connection, receiver) = self.hub.connect(game_id, player_id);
        let connection_id = connection.id();
        let room_size = self.hub.room_member_count(game_id) + 1;
        match GameEvent::connected(&game, player_id, room_size).to_payload() {
            Ok(payload) => {
                connection.queue(payload);
            }
            Err(err) => {
                tracing::warn!(game_id, error = %err, "failed to serialize welcome event");
            }
        }
        self.hub.register(connection).await?;

        Ok(Subscription {
            game_id,
            connection_id,
            player_id,
            receiver,
            hub: self.hub.clone(),
        })
    }

    /// Runs one engine call on the blocking pool. A call that outlives the
    /// timeout keeps running in the background and its result is dropped.
    async fn run<T, F>(&self, operation: &'static str, call: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&GameEngine) -> Result<T, GameError> + Send + 'static,
        T: Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        let task = tokio::task::spawn_blocking(move || call(&engine));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(joined) => settle(operation, joined),
            Err(_) => Err(self.timed_out(operation)),
        }
    }

    /// Like [`run`](Self::run) for calls that change a game: the events
    /// built from a successful result are broadcast even when the call only
    /// completes after the caller was told it timed out.
    async fn commit<T, F, E>(
        &self,
        operation: &'static str,
        call: F,
        events: E,
    ) -> Result<T, ServiceError>
    where
        F: FnOnce(&GameEngine) -> Result<T, GameError> + Send + 'static,
        E: FnOnce(&T) -> Vec<GameEvent> + Send + 'static,
        T: Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        let mut task = tokio::task::spawn_blocking(move || call(&engine));

        match tokio::time::timeout(self.timeout, &mut task).await {
            Ok(joined) => {
                let value = settle(operation, joined)?;
                publish(&self.hub, events(&value)).await;
                Ok(value)
            }
            Err(_) => {
                let hub = self.hub.clone();
                tokio::spawn(async move {
                    if let Ok(Ok(value)) = task.await {
                        tracing::info!(operation, "late commit, broadcasting its events");
                        publish(&hub, events(&value)).await;
                    }
                });
                Err(self.timed_out(operation))
            }
        }
    }

    fn timed_out(&self, operation: &'static str) -> ServiceError {
        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        tracing::warn!(operation, timeout_ms, "engine call timed out");
        ServiceError::Timeout {
            operation,
            timeout_ms,
        }
    }
}

fn settle<T>(
    operation: &'static str,
    joined: Result<Result<T, GameError>, JoinError>,
) -> Result<T, ServiceError> {
    match joined {
        Ok(result) => result.map_err(ServiceError::from),
        Err(err) => {
            tracing::error!(operation, error = %err, "engine task failed");
            Err(ServiceError::Join {
                operation,
                message: err.to_string(),
            })
        }
    }
}

async fn publish(hub: &Hub, events: Vec<GameEvent>) {
    for event in events {
        match event.to_payload() {
            Ok(payload) => {
                tracing::debug!(
                    game_id = event.game_id,
                    event_type = ?event.kind,
                    room_size = hub.room_member_count(event.game_id),
                    "broadcasting game event"
                );
                hub.broadcast_to_room(event.game_id, payload).await;
            }
            Err(err) => {
                tracing::error!(
                    game_id = event.game_id,
                    event_type = ?event.kind,
                    error = %err,
                    "failed to serialize game event"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::HubConfig;
    use gemstone_engine::catalog::StaticCatalog;
    use gemstone_engine::gems::GemKind;
    use gemstone_engine::store::InMemoryStore;
    use tokio_stream::StreamExt;

    fn service() -> GameService {
        let engine = GameEngine::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(StaticCatalog::standard()),
        )
        .with_seed(5);
        let (hub, _task) = Hub::spawn(HubConfig::default());
        GameService::new(Arc::new(engine), hub, Duration::from_secs(2))
    }

    fn event(payload: Payload) -> serde_json::Value {
        serde_json::from_str(&payload).unwrap()
    }

    #[tokio::test]
    async fn subscriber_sees_welcome_then_room_events() {
        let service = service();
        let game = service.create_game(1, 2).await.unwrap();
        let mut sub = service.subscribe(game.id, Some(1)).await.unwrap();

        service.join_game(game.room_code.clone(), 2).await.unwrap();
        service.start_game(game.id, 1).await.unwrap();

        let welcome = event(sub.next().await.unwrap());
        assert_eq!(welcome["type"], "connected");
        assert_eq!(welcome["details"]["status"], "waiting");
        assert_eq!(event(sub.next().await.unwrap())["type"], "player_joined");
        let started = event(sub.next().await.unwrap());
        assert_eq!(started["type"], "game_started");
        assert_eq!(started["details"]["players"], serde_json::json!([1, 2]));
    }

    #[tokio::test]
    async fn rejected_action_publishes_nothing() {
        let service = service();
        let game = service.create_game(1, 2).await.unwrap();
        service.join_game(game.room_code.clone(), 2).await.unwrap();
        service.start_game(game.id, 1).await.unwrap();

        let mut sub = service.subscribe(game.id, None).await.unwrap();
        assert_eq!(event(sub.next().await.unwrap())["type"], "connected");

        let request = GemRequest::from([(GemKind::Ruby, 2)]);
        let err = service.take_gems(game.id, 2, request.clone()).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Game(GameError::NotYourTurn { player: 2 })
        ));

        service.take_gems(game.id, 1, request).await.unwrap();
        let taken = event(sub.next().await.unwrap());
        assert_eq!(taken["type"], "gems_taken");
        assert_eq!(taken["actor_id"], 1);
        assert_eq!(taken["details"]["gems"]["ruby"], 2);
        assert_eq!(taken["details"]["next_turn"], 2);
    }

    #[tokio::test]
    async fn dropping_subscription_leaves_the_room() {
        let service = service();
        let game = service.create_game(1, 2).await.unwrap();
        let sub = service.subscribe(game.id, Some(1)).await.unwrap();
        assert_eq!(service.hub().room_member_count(game.id), 1);

        drop(sub);
        service.hub().flush().await.unwrap();
        assert_eq!(service.hub().room_member_count(game.id), 0);
    }

    #[tokio::test]
    async fn unknown_game_cannot_be_subscribed() {
        let service = service();
        let err = service.subscribe(404, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Game(GameError::GameNotFound(404))));
        assert_eq!(service.hub().room_count(), 0);
    }
}
