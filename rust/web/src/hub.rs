//! Per-game fan-out of serialized events to live connections.
//!
//! Every change to the room registry goes through a single actor task that
//! consumes commands in arrival order. Producers only wait for room in the
//! actor's intake queue. Delivery to a connection is a non-blocking push
//! onto its bounded outbound queue; a connection whose queue is full or
//! closed is dropped from its room so one stalled client never holds up the
//! others. Room sizes are read directly from the registry under a shared
//! lock, without a round trip through the actor.

use gemstone_engine::state::{GameId, PlayerId};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

pub type ConnectionId = Uuid;

/// A serialized event, shared by every member it is delivered to.
pub type Payload = Arc<str>;

pub const DEFAULT_INTAKE_CAPACITY: usize = 1024;
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubConfig {
    /// Commands that may queue up in front of the actor
    pub intake_capacity: usize,
    /// Payloads that may queue up for one connection before it is dropped
    pub outbound_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            intake_capacity: DEFAULT_INTAKE_CAPACITY,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HubError {
    #[error("broadcast hub has stopped")]
    Stopped,
}

/// One client's sending half, created by [`Hub::connect`] and handed to the
/// hub with [`Hub::register`].
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    game_id: GameId,
    player_id: Option<PlayerId>,
    outbound: mpsc::Sender<Payload>,
}

impl Connection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    pub fn player_id(&self) -> Option<PlayerId> {
        self.player_id
    }

    /// Pushes a payload directly onto this connection's queue, ahead of
    /// anything the hub delivers after registration. Returns `false` if
    /// the queue is full or the reader is gone.
    pub fn queue(&self, payload: impl Into<Payload>) -> bool {
        self.outbound.try_send(payload.into()).is_ok()
    }
}

#[derive(Debug)]
struct Member {
    player_id: Option<PlayerId>,
    outbound: mpsc::Sender<Payload>,
}

type Rooms = HashMap<GameId, HashMap<ConnectionId, Member>>;

#[derive(Debug)]
enum Command {
    Register {
        connection: Connection,
        ack: oneshot::Sender<usize>,
    },
    Unregister {
        game_id: GameId,
        connection_id: ConnectionId,
        ack: Option<oneshot::Sender<bool>>,
    },
    Broadcast {
        game_id: GameId,
        payload: Payload,
    },
    Flush {
        ack: oneshot::Sender<()>,
    },
}

/// Cloneable handle to the hub actor.
///
/// The actor runs until every handle is dropped; it then closes all
/// remaining outbound queues.
#[derive(Debug, Clone)]
pub struct Hub {
    intake: mpsc::Sender<Command>,
    rooms: Arc<RwLock<Rooms>>,
    outbound_capacity: usize,
}

impl Hub {
    /// Starts the actor on the current tokio runtime.
    pub fn spawn(config: HubConfig) -> (Self, JoinHandle<()>) {
        let (intake, commands) = mpsc::channel(config.intake_capacity.max(1));
        let rooms = Arc::new(RwLock::new(Rooms::new()));
        let actor = HubActor {
            commands,
            rooms: Arc::clone(&rooms),
        };
        let task = tokio::spawn(actor.run());

        let hub = Self {
            intake,
            rooms,
            outbound_capacity: config.outbound_capacity.max(1),
        };
        (hub, task)
    }

    /// Creates a connection in the connecting state together with the
    /// receiver its writer drains.
    pub fn connect(
        &self,
        game_id: GameId,
        player_id: Option<PlayerId>,
    ) -> (Connection, mpsc::Receiver<Payload>) {
        let (outbound, receiver) = mpsc::channel(self.outbound_capacity);
        let connection = Connection {
            id: Uuid::new_v4(),
            game_id,
            player_id,
            outbound,
        };
        (connection, receiver)
    }

    /// Adds the connection to its game's room, creating the room if needed.
    /// Registering the same connection id twice leaves one entry.
    ///
    /// Returns the room size once the actor has applied the change.
    pub async fn register(&self, connection: Connection) -> Result<usize, HubError> {
        let (ack, done) = oneshot::channel();
        self.send(Command::Register { connection, ack }).await?;
        done.await.map_err(|_| HubError::Stopped)
    }

    /// Removes the connection and closes its outbound queue. A room left
    /// empty is deleted. Returns whether the connection was registered.
    pub async fn unregister(
        &self,
        game_id: GameId,
        connection_id: ConnectionId,
    ) -> Result<bool, HubError> {
        let (ack, done) = oneshot::channel();
        self.send(Command::Unregister {
            game_id,
            connection_id,
            ack: Some(ack),
        })
        .await?;
        done.await.map_err(|_| HubError::Stopped)
    }

    /// Fire-and-forget [`Hub::unregister`] usable from synchronous code such
    /// as `Drop`.
    pub fn release(&self, game_id: GameId, connection_id: ConnectionId) {
        let command = Command::Unregister {
            game_id,
            connection_id,
            ack: None,
        };
        match self.intake.try_send(command) {
            Ok(()) => {}
            Err(TrySendError::Full(command)) => {
                // The next broadcast evicts the closed queue anyway if no
                // runtime is around to deliver the command.
                if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                    let intake = self.intake.clone();
                    runtime.spawn(async move {
                        let _ = intake.send(command).await;
                    });
                }
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }

    /// Queues `payload` for every member of the game's room.
    ///
    /// Delivery is best effort and never reported back: an empty or unknown
    /// room drops the payload, and a stopped hub is only logged.
    pub async fn broadcast_to_room(&self, game_id: GameId, payload: impl Into<Payload>) {
        let command = Command::Broadcast {
            game_id,
            payload: payload.into(),
        };
        if self.send(command).await.is_err() {
            tracing::warn!(game_id, "broadcast dropped, hub has stopped");
        }
    }

    pub fn room_member_count(&self, game_id: GameId) -> usize {
        read_rooms(&self.rooms)
            .get(&game_id)
            .map_or(0, HashMap::len)
    }

    pub fn room_count(&self) -> usize {
        read_rooms(&self.rooms).len()
    }

    /// Players with at least one registered connection in the room.
    pub fn room_players(&self, game_id: GameId) -> Vec<PlayerId> {
        let rooms = read_rooms(&self.rooms);
        let mut players: Vec<PlayerId> = rooms
            .get(&game_id)
            .map(|room| room.values().filter_map(|m| m.player_id).collect())
            .unwrap_or_default();
        players.sort_unstable();
        players.dedup();
        players
    }

    /// Resolves once every command sent before it has been applied.
    pub async fn flush(&self) -> Result<(), HubError> {
        let (ack, done) = oneshot::channel();
        self.send(Command::Flush { ack }).await?;
        done.await.map_err(|_| HubError::Stopped)
    }

    async fn send(&self, command: Command) -> Result<(), HubError> {
        self.intake.send(command).await.map_err(|_| HubError::Stopped)
    }
}

struct HubActor {
    commands: mpsc::Receiver<Command>,
    rooms: Arc<RwLock<Rooms>>,
}

impl HubActor {
    async fn run(mut self) {
        tracing::debug!("broadcast hub started");
        while let Some(command) = self.commands.recv().await {
            match command {
                Command::Register { connection, ack } => {
                    let size = self.register(connection);
                    let _ = ack.send(size);
                }
                Command::Unregister {
                    game_id,
                    connection_id,
                    ack,
                } => {
                    let removed = self.unregister(game_id, connection_id);
                    if let Some(ack) = ack {
                        let _ = ack.send(removed);
                    }
                }
                Command::Broadcast { game_id, payload } => self.broadcast(game_id, payload),
                Command::Flush { ack } => {
                    let _ = ack.send(());
                }
            }
        }
        write_rooms(&self.rooms).clear();
        tracing::debug!("broadcast hub stopped");
    }

    fn register(&self, connection: Connection) -> usize {
        let mut rooms = write_rooms(&self.rooms);
        let room = rooms.entry(connection.game_id).or_default();
        if room.contains_key(&connection.id) {
            return room.len();
        }

        room.insert(
            connection.id,
            Member {
                player_id: connection.player_id,
                outbound: connection.outbound,
            },
        );
        tracing::info!(
            game_id = connection.game_id,
            connection_id = %connection.id,
            player_id = ?connection.player_id,
            room_size = room.len(),
            "connection registered"
        );
        room.len()
    }

    fn unregister(&self, game_id: GameId, connection_id: ConnectionId) -> bool {
        let mut rooms = write_rooms(&self.rooms);
        let Some(room) = rooms.get_mut(&game_id) else {
            return false;
        };
        let removed = room.remove(&connection_id).is_some();
        let room_size = room.len();
        if room_size == 0 {
            rooms.remove(&game_id);
        }
        if removed {
            tracing::info!(
                game_id,
                connection_id = %connection_id,
                room_size,
                "connection unregistered"
            );
        }
        removed
    }

    fn broadcast(&self, game_id: GameId, payload: Payload) {
        let mut rooms = write_rooms(&self.rooms);
        let Some(room) = rooms.get_mut(&game_id) else {
            tracing::debug!(game_id, "no connections in room");
            return;
        };

        let mut evicted = Vec::new();
        for (id, member) in room.iter() {
            match member.outbound.try_send(Arc::clone(&payload)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        game_id,
                        connection_id = %id,
                        player_id = ?member.player_id,
                        "outbound queue full, dropping connection"
                    );
                    evicted.push(*id);
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(game_id, connection_id = %id, "connection already closed");
                    evicted.push(*id);
                }
            }
        }

        for id in &evicted {
            room.remove(id);
        }
        tracing::trace!(
            game_id,
            delivered = room.len(),
            evicted = evicted.len(),
            "payload fanned out"
        );
        if room.is_empty() {
            rooms.remove(&game_id);
        }
    }
}

fn read_rooms(rooms: &RwLock<Rooms>) -> RwLockReadGuard<'_, Rooms> {
    rooms.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_rooms(rooms: &RwLock<Rooms>) -> RwLockWriteGuard<'_, Rooms> {
    rooms.write().unwrap_or_else(PoisonError::into_inner)
}
