use crate::cards::{CardId, Tier};
use crate::gems::GemKind;
use crate::state::{GameId, GameStatus, PlayerId};
use thiserror::Error;

/// Broad classification of a [`GameError`], used by callers to decide how
/// to surface it.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorKind {
    /// The request broke a game rule. Safe to show verbatim; nothing changed.
    Precondition,
    /// An unknown game, card or player was referenced.
    NotFound,
    /// Storage or catalog failure. Logged, shown generically.
    Integrity,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("It's not player {player}'s turn")]
    NotYourTurn { player: PlayerId },
    #[error("Invalid gem request: {reason}")]
    InvalidGemRequest { reason: String },
    #[error("Not enough {gem} in the bank (available: {available}, needed: {needed})")]
    InsufficientBankSupply {
        gem: GemKind,
        available: u32,
        needed: u32,
    },
    #[error("Too many gems: holding {held}, taking {taking} would exceed {limit}")]
    GemLimitExceeded { held: u32, taking: u32, limit: u32 },
    #[error("Cannot afford card {card}: {gold_needed} gold needed, {gold_held} held")]
    CannotAfford {
        card: CardId,
        gold_needed: u32,
        gold_held: u32,
    },
    #[error("Too many reserved cards (max {limit})")]
    ReserveLimitExceeded { limit: usize },
    #[error("No cards left in {tier}")]
    EmptyDeck { tier: Tier },
    #[error("Game {game} is {status}, expected {expected}")]
    WrongStatus {
        game: GameId,
        status: GameStatus,
        expected: GameStatus,
    },
    #[error("Player count must be between 2 and 4 (got {count})")]
    InvalidPlayerCount { count: usize },
    #[error("Game {game} is full")]
    GameFull { game: GameId },
    #[error("Player {player} already joined game {game}")]
    AlreadyJoined { game: GameId, player: PlayerId },
    #[error("Only the game creator can start game {game}")]
    NotGameCreator { game: GameId },
    #[error("Game {game} needs at least 2 players to start (has {count})")]
    NotEnoughPlayers { game: GameId, count: usize },

    #[error("Game {0} not found")]
    GameNotFound(GameId),
    #[error("No game with room code `{0}`")]
    RoomNotFound(String),
    #[error("Card {0} not found")]
    CardNotFound(CardId),
    #[error("Player {player} is not seated in game {game}")]
    PlayerNotFound { game: GameId, player: PlayerId },
    #[error("No statistics recorded for player {0}")]
    StatsNotFound(PlayerId),

    #[error("Game {0} already has a board")]
    AlreadyInitialized(GameId),
    #[error("Could not allocate a unique room code")]
    RoomCodeExhausted,
    #[error("Catalog error: {0}")]
    Catalog(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Concurrent update to game {0}")]
    Conflict(GameId),
}

impl GameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::NotYourTurn { .. }
            | GameError::InvalidGemRequest { .. }
            | GameError::InsufficientBankSupply { .. }
            | GameError::GemLimitExceeded { .. }
            | GameError::CannotAfford { .. }
            | GameError::ReserveLimitExceeded { .. }
            | GameError::EmptyDeck { .. }
            | GameError::WrongStatus { .. }
            | GameError::InvalidPlayerCount { .. }
            | GameError::GameFull { .. }
            | GameError::AlreadyJoined { .. }
            | GameError::NotGameCreator { .. }
            | GameError::NotEnoughPlayers { .. } => ErrorKind::Precondition,
            GameError::GameNotFound(_)
            | GameError::RoomNotFound(_)
            | GameError::CardNotFound(_)
            | GameError::PlayerNotFound { .. }
            | GameError::StatsNotFound(_) => ErrorKind::NotFound,
            GameError::AlreadyInitialized(_)
            | GameError::RoomCodeExhausted
            | GameError::Catalog(_)
            | GameError::Storage(_)
            | GameError::Conflict(_) => ErrorKind::Integrity,
        }
    }

    /// Stable machine-readable name, used in event and error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            GameError::NotYourTurn { .. } => "not_your_turn",
            GameError::InvalidGemRequest { .. } => "invalid_gem_request",
            GameError::InsufficientBankSupply { .. } => "insufficient_bank_supply",
            GameError::GemLimitExceeded { .. } => "gem_limit_exceeded",
            GameError::CannotAfford { .. } => "cannot_afford",
            GameError::ReserveLimitExceeded { .. } => "reserve_limit_exceeded",
            GameError::EmptyDeck { .. } => "empty_deck",
            GameError::WrongStatus { .. } => "wrong_game_status",
            GameError::InvalidPlayerCount { .. } => "invalid_player_count",
            GameError::GameFull { .. } => "game_full",
            GameError::AlreadyJoined { .. } => "already_joined",
            GameError::NotGameCreator { .. } => "not_game_creator",
            GameError::NotEnoughPlayers { .. } => "not_enough_players",
            GameError::GameNotFound(_) => "game_not_found",
            GameError::RoomNotFound(_) => "room_not_found",
            GameError::CardNotFound(_) => "card_not_found",
            GameError::PlayerNotFound { .. } => "player_not_found",
            GameError::StatsNotFound(_) => "stats_not_found",
            GameError::AlreadyInitialized(_) => "already_initialized",
            GameError::RoomCodeExhausted => "room_code_exhausted",
            GameError::Catalog(_) => "catalog_error",
            GameError::Storage(_) => "storage_error",
            GameError::Conflict(_) => "conflict",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_violations_are_preconditions() {
        let err = GameError::EmptyDeck { tier: Tier::Two };
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert_eq!(err.to_string(), "No cards left in tier 2");
    }

    #[test]
    fn storage_failures_are_integrity_errors() {
        assert_eq!(
            GameError::Storage("disk full".into()).kind(),
            ErrorKind::Integrity
        );
        assert_eq!(GameError::Conflict(3).kind(), ErrorKind::Integrity);
        assert_eq!(GameError::CardNotFound(9).kind(), ErrorKind::NotFound);
        assert_eq!(GameError::StatsNotFound(4).kind(), ErrorKind::NotFound);
    }
}
