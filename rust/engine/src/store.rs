//! Storage contract used by the engine and lobby, plus an in-memory store.
//!
//! Reads are individual; writes go through [`GameStore::commit`], which
//! applies a whole [`ChangeSet`] or nothing. Every change set carries the
//! version of the game it was built from, and the store refuses it if the
//! game moved on in the meantime.

use crate::errors::GameError;
use crate::state::{BoardState, Game, GameId, GamePlayer, GameStatus, PlayerId, PlayerState};
use crate::stats::{leaderboard_order, PlayerResult, PlayerStats};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("game {0} not found")]
    GameNotFound(GameId),
    #[error("game {game} changed concurrently (expected version {expected}, found {found})")]
    VersionConflict {
        game: GameId,
        expected: u64,
        found: u64,
    },
    #[error("room code `{0}` is already in use")]
    RoomCodeTaken(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for GameError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::GameNotFound(id) => GameError::GameNotFound(id),
            StoreError::VersionConflict { game, .. } => GameError::Conflict(game),
            StoreError::RoomCodeTaken(code) => {
                GameError::Storage(format!("room code `{code}` is already in use"))
            }
            StoreError::Unavailable(msg) => GameError::Storage(msg),
        }
    }
}

/// Fields of a game that is about to be created. The creator is seated at 0
/// in the same write.
#[derive(Debug, Clone)]
pub struct NewGame {
    pub room_code: String,
    pub created_by: PlayerId,
    pub player_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Writes that must become visible together.
#[derive(Debug, Clone)]
pub struct ChangeSet {
    /// Updated game record; its `version` is the one the change was built on
    pub game: Game,
    /// Replaces the whole roster when present
    pub roster: Option<Vec<GamePlayer>>,
    pub board: Option<BoardState>,
    pub player_states: Vec<PlayerState>,
    /// Final results folded into each player's statistics
    pub results: Vec<PlayerResult>,
}

impl ChangeSet {
    pub fn new(game: Game) -> Self {
        Self {
            game,
            roster: None,
            board: None,
            player_states: Vec::new(),
            results: Vec::new(),
        }
    }

    pub fn with_roster(mut self, roster: Vec<GamePlayer>) -> Self {
        self.roster = Some(roster);
        self
    }

    pub fn with_board(mut self, board: BoardState) -> Self {
        self.board = Some(board);
        self
    }

    pub fn with_player_state(mut self, state: PlayerState) -> Self {
        self.player_states.push(state);
        self
    }

    pub fn with_player_states(mut self, states: impl IntoIterator<Item = PlayerState>) -> Self {
        self.player_states.extend(states);
        self
    }

    pub fn with_results(mut self, results: impl IntoIterator<Item = PlayerResult>) -> Self {
        self.results.extend(results);
        self
    }
}

pub trait GameStore: Send + Sync {
    /// Fails with [`StoreError::RoomCodeTaken`] when the code is in use.
    fn create_game(&self, new_game: NewGame) -> Result<Game, StoreError>;
    fn load_game(&self, game_id: GameId) -> Result<Game, StoreError>;
    fn find_game_by_code(&self, room_code: &str) -> Result<Option<Game>, StoreError>;
    /// Games newest first, optionally filtered by status.
    fn list_games(&self, status: Option<GameStatus>) -> Result<Vec<Game>, StoreError>;
    /// Seats ordered by seat position.
    fn load_roster(&self, game_id: GameId) -> Result<Vec<GamePlayer>, StoreError>;
    fn load_board(&self, game_id: GameId) -> Result<Option<BoardState>, StoreError>;
    fn load_player_state(
        &self,
        game_id: GameId,
        player_id: PlayerId,
    ) -> Result<Option<PlayerState>, StoreError>;
    /// Applies every write in `changes` atomically and returns the stored
    /// game with its new version. Results are added to the players'
    /// running statistics in the same write.
    fn commit(&self, changes: ChangeSet) -> Result<Game, StoreError>;
    fn load_player_stats(&self, player_id: PlayerId) -> Result<Option<PlayerStats>, StoreError>;
    /// Players with at least one completed game, in leaderboard order.
    fn leaderboard(&self, limit: usize, offset: usize) -> Result<Vec<PlayerStats>, StoreError>;
}

#[derive(Debug, Default)]
struct Tables {
    next_game_id: GameId,
    games: BTreeMap<GameId, Game>,
    rosters: HashMap<GameId, Vec<GamePlayer>>,
    boards: HashMap<GameId, BoardState>,
    player_states: HashMap<(GameId, PlayerId), PlayerState>,
    stats: HashMap<PlayerId, PlayerStats>,
}

/// Process-local store. One lock guards all tables, which makes every
/// commit trivially atomic.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn game_count(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.games.len())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))
    }
}

impl GameStore for InMemoryStore {
    fn create_game(&self, new_game: NewGame) -> Result<Game, StoreError> {
        let mut tables = self.write()?;
        if tables
            .games
            .values()
            .any(|game| game.room_code == new_game.room_code)
        {
            return Err(StoreError::RoomCodeTaken(new_game.room_code));
        }
        tables.next_game_id += 1;
        let id = tables.next_game_id;

        let game = Game {
            id,
            room_code: new_game.room_code,
            status: GameStatus::Waiting,
            created_by: new_game.created_by,
            current_turn: None,
            turn_number: 0,
            winner: None,
            player_count: new_game.player_count,
            created_at: new_game.created_at,
            started_at: None,
            completed_at: None,
            version: 0,
        };
        let creator = GamePlayer {
            game_id: id,
            player_id: new_game.created_by,
            seat: 0,
            victory_points: 0,
            active: true,
            joined_at: new_game.created_at,
        };

        tables.games.insert(id, game.clone());
        tables.rosters.insert(id, vec![creator]);
        Ok(game)
    }

    fn load_game(&self, game_id: GameId) -> Result<Game, StoreError> {
        self.read()?
            .games
            .get(&game_id)
            .cloned()
            .ok_or(StoreError::GameNotFound(game_id))
    }

    fn find_game_by_code(&self, room_code: &str) -> Result<Option<Game>, StoreError> {
        Ok(self
            .read()?
            .games
            .values()
            .find(|game| game.room_code == room_code)
            .cloned())
    }

    fn list_games(&self, status: Option<GameStatus>) -> Result<Vec<Game>, StoreError> {
        Ok(self
            .read()?
            .games
            .values()
            .rev()
            .filter(|game| status.map_or(true, |wanted| game.status == wanted))
            .cloned()
            .collect())
    }

    fn load_roster(&self, game_id: GameId) -> Result<Vec<GamePlayer>, StoreError> {
        let tables = self.read()?;
        if !tables.games.contains_key(&game_id) {
            return Err(StoreError::GameNotFound(game_id));
        }
        let mut roster = tables.rosters.get(&game_id).cloned().unwrap_or_default();
        roster.sort_by_key(|seat| seat.seat);
        Ok(roster)
    }

    fn load_board(&self, game_id: GameId) -> Result<Option<BoardState>, StoreError> {
        Ok(self.read()?.boards.get(&game_id).cloned())
    }

    fn load_player_state(
        &self,
        game_id: GameId,
        player_id: PlayerId,
    ) -> Result<Option<PlayerState>, StoreError> {
        Ok(self
            .read()?
            .player_states
            .get(&(game_id, player_id))
            .cloned())
    }

    fn commit(&self, changes: ChangeSet) -> Result<Game, StoreError> {
        let mut tables = self.write()?;
        let game_id = changes.game.id;
        let stored_version = tables
            .games
            .get(&game_id)
            .map(|game| game.version)
            .ok_or(StoreError::GameNotFound(game_id))?;
        if stored_version != changes.game.version {
            return Err(StoreError::VersionConflict {
                game: game_id,
                expected: changes.game.version,
                found: stored_version,
            });
        }

        let mut game = changes.game;
        game.version += 1;
        tables.games.insert(game_id, game.clone());
        if let Some(roster) = changes.roster {
            tables.rosters.insert(game_id, roster);
        }
        if let Some(board) = changes.board {
            tables.boards.insert(game_id, board);
        }
        for state in changes.player_states {
            tables
                .player_states
                .insert((game_id, state.player_id), state);
        }
        let now = Utc::now();
        for result in &changes.results {
            tables
                .stats
                .entry(result.player_id)
                .or_insert_with(|| PlayerStats::new(result.player_id, now))
                .record(result, now);
        }
        Ok(game)
    }

    fn load_player_stats(&self, player_id: PlayerId) -> Result<Option<PlayerStats>, StoreError> {
        Ok(self.read()?.stats.get(&player_id).cloned())
    }

    fn leaderboard(&self, limit: usize, offset: usize) -> Result<Vec<PlayerStats>, StoreError> {
        let tables = self.read()?;
        let mut ranked: Vec<&PlayerStats> = tables
            .stats
            .values()
            .filter(|stats| stats.total_games > 0)
            .collect();
        ranked.sort_by(|a, b| leaderboard_order(a, b));
        Ok(ranked
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}
