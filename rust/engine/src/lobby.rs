//! Room lifecycle before play: creating, joining, leaving and starting games.

use crate::engine::GameEngine;
use crate::errors::GameError;
use crate::state::{Game, GameId, GamePlayer, GameStatus, PlayerId};
use crate::store::{ChangeSet, NewGame, StoreError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::PoisonError;

pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 4;
/// Attempts at drawing an unused room code before giving up.
pub const ROOM_CODE_ATTEMPTS: usize = 10;
pub const DEFAULT_LIST_LIMIT: usize = 20;
pub const MAX_LIST_LIMIT: usize = 100;

/// One page of games.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameList {
    pub games: Vec<Game>,
    /// Matching games before paging
    pub total: usize,
}

/// Six lowercase hex characters.
pub fn generate_room_code() -> String {
    let bytes: [u8; 3] = rand::random();
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

impl GameEngine {
    /// Opens a waiting room for `player_count` seats with the creator at seat 0.
    pub fn create_game(&self, creator: PlayerId, player_count: usize) -> Result<Game, GameError> {
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&player_count) {
            return Err(GameError::InvalidPlayerCount {
                count: player_count,
            });
        }

        for _ in 0..ROOM_CODE_ATTEMPTS {
            let new_game = NewGame {
                room_code: generate_room_code(),
                created_by: creator,
                player_count,
                created_at: Utc::now(),
            };
            match self.store.create_game(new_game) {
                Ok(game) => {
                    tracing::info!(
                        game_id = game.id,
                        room_code = %game.room_code,
                        creator,
                        player_count,
                        "game created"
                    );
                    return Ok(game);
                }
                Err(StoreError::RoomCodeTaken(code)) => {
                    tracing::debug!(room_code = %code, "room code collision");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(GameError::RoomCodeExhausted)
    }

    pub fn find_by_room_code(&self, room_code: &str) -> Result<Game, GameError> {
        self.store
            .find_game_by_code(room_code)?
            .ok_or_else(|| GameError::RoomNotFound(room_code.to_string()))
    }

    /// Games newest first. `limit` defaults to [`DEFAULT_LIST_LIMIT`] when zero
    /// and is capped at [`MAX_LIST_LIMIT`].
    pub fn list_games(
        &self,
        status: Option<GameStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<GameList, GameError> {
        let limit = match limit {
            0 => DEFAULT_LIST_LIMIT,
            n => n.min(MAX_LIST_LIMIT),
        };
        let all = self.store.list_games(status)?;
        let total = all.len();
        let games = all.into_iter().skip(offset).take(limit).collect();
        Ok(GameList { games, total })
    }

    /// Seats `player` at the next free seat of a waiting room.
    pub fn join_game(
        &self,
        room_code: &str,
        player: PlayerId,
    ) -> Result<(Game, GamePlayer), GameError> {
        let game_id = self.find_by_room_code(room_code)?.id;
        let lock = self.locks.handle(game_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let game = self.store.load_game(game_id)?;
        ensure_waiting(&game)?;
        let mut roster = self.store.load_roster(game_id)?;
        if roster.iter().any(|seat| seat.player_id == player) {
            return Err(GameError::AlreadyJoined {
                game: game_id,
                player,
            });
        }
        if roster.len() >= game.player_count {
            return Err(GameError::GameFull { game: game_id });
        }

        let seat = GamePlayer {
            game_id,
            player_id: player,
            seat: roster.len(),
            victory_points: 0,
            active: true,
            joined_at: Utc::now(),
        };
        roster.push(seat.clone());
        let game = self
            .store
            .commit(ChangeSet::new(game).with_roster(roster))?;

        tracing::info!(game_id, player_id = player, seat = seat.seat, "player joined");
        Ok((game, seat))
    }

    /// Removes `player` from a waiting room; later seats move up by one.
    pub fn leave_game(&self, game_id: GameId, player: PlayerId) -> Result<Game, GameError> {
        let lock = self.locks.handle(game_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let game = self.store.load_game(game_id)?;
        ensure_waiting(&game)?;
        let mut roster = self.store.load_roster(game_id)?;
        let index = roster
            .iter()
            .position(|seat| seat.player_id == player)
            .ok_or(GameError::PlayerNotFound {
                game: game_id,
                player,
            })?;
        roster.remove(index);
        for (position, seat) in roster.iter_mut().enumerate() {
            seat.seat = position;
        }

        let game = self
            .store
            .commit(ChangeSet::new(game).with_roster(roster))?;
        tracing::info!(game_id, player_id = player, "player left");
        Ok(game)
    }

    /// Starts a waiting game on behalf of its creator.
    ///
    /// The status change, the dealt board and every player's empty state are
    /// committed together; seat 0 takes the first turn.
    pub fn start_game(&self, game_id: GameId, requester: PlayerId) -> Result<Game, GameError> {
        let lock = self.locks.handle(game_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let game = self.store.load_game(game_id)?;
        if game.created_by != requester {
            return Err(GameError::NotGameCreator { game: game_id });
        }
        ensure_waiting(&game)?;
        let roster = self.store.load_roster(game_id)?;
        if roster.len() < MIN_PLAYERS {
            return Err(GameError::NotEnoughPlayers {
                game: game_id,
                count: roster.len(),
            });
        }
        self.begin(game, &roster)
    }
}

fn ensure_waiting(game: &Game) -> Result<(), GameError> {
    if game.status == GameStatus::Waiting {
        Ok(())
    } else {
        Err(GameError::WrongStatus {
            game: game.id,
            status: game.status,
            expected: GameStatus::Waiting,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_codes_are_six_hex_chars() {
        for _ in 0..50 {
            let code = generate_room_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }
    }
}
