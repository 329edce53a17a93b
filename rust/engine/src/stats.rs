//! Career statistics per player and the leaderboard built from them.
//!
//! Statistics change only when a game completes: every seated player's
//! [`PlayerResult`] travels in the same [`ChangeSet`](crate::store::ChangeSet)
//! that marks the game completed, and the store folds it into that player's
//! running totals.

use crate::engine::GameEngine;
use crate::errors::GameError;
use crate::state::{GamePlayer, PlayerId, PlayerState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const DEFAULT_LEADERBOARD_LIMIT: usize = 100;
pub const MAX_LEADERBOARD_LIMIT: usize = 100;

/// How one player finished one game.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct PlayerResult {
    pub player_id: PlayerId,
    pub won: bool,
    pub points: u32,
    pub nobles: u32,
    pub cards_purchased: u32,
}

impl PlayerResult {
    pub fn new(seat: &GamePlayer, state: Option<&PlayerState>, winner: PlayerId) -> Self {
        Self {
            player_id: seat.player_id,
            won: seat.player_id == winner,
            points: seat.victory_points,
            nobles: state.map_or(0, |state| state.nobles.len() as u32),
            cards_purchased: state.map_or(0, |state| state.purchased.len() as u32),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub player_id: PlayerId,
    pub total_games: u32,
    pub total_wins: u32,
    pub total_losses: u32,
    /// Mean final victory points over completed games
    pub average_points: f64,
    pub total_nobles_earned: u32,
    pub total_cards_purchased: u32,
    pub updated_at: DateTime<Utc>,
}

impl PlayerStats {
    pub fn new(player_id: PlayerId, at: DateTime<Utc>) -> Self {
        Self {
            player_id,
            total_games: 0,
            total_wins: 0,
            total_losses: 0,
            average_points: 0.0,
            total_nobles_earned: 0,
            total_cards_purchased: 0,
            updated_at: at,
        }
    }

    pub fn record(&mut self, result: &PlayerResult, at: DateTime<Utc>) {
        let previous = f64::from(self.total_games);
        self.total_games += 1;
        if result.won {
            self.total_wins += 1;
        } else {
            self.total_losses += 1;
        }
        self.average_points = (self.average_points * previous + f64::from(result.points))
            / f64::from(self.total_games);
        self.total_nobles_earned += result.nobles;
        self.total_cards_purchased += result.cards_purchased;
        self.updated_at = at;
    }

    pub fn win_rate(&self) -> f64 {
        if self.total_games == 0 {
            0.0
        } else {
            f64::from(self.total_wins) / f64::from(self.total_games)
        }
    }
}

/// Leaderboard order: win rate, then wins, both descending; player id
/// breaks remaining ties.
pub fn leaderboard_order(a: &PlayerStats, b: &PlayerStats) -> Ordering {
    b.win_rate()
        .total_cmp(&a.win_rate())
        .then_with(|| b.total_wins.cmp(&a.total_wins))
        .then_with(|| a.player_id.cmp(&b.player_id))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// 1-based position over the whole board, not the page
    pub rank: usize,
    pub player_id: PlayerId,
    pub total_games: u32,
    pub total_wins: u32,
    pub average_points: f64,
    pub win_rate: f64,
}

impl GameEngine {
    pub fn player_stats(&self, player_id: PlayerId) -> Result<PlayerStats, GameError> {
        self.store
            .load_player_stats(player_id)?
            .ok_or(GameError::StatsNotFound(player_id))
    }

    /// One page of players with at least one completed game, best first.
    /// `limit` defaults to [`DEFAULT_LEADERBOARD_LIMIT`] when zero.
    pub fn leaderboard(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LeaderboardEntry>, GameError> {
        let limit = match limit {
            0 => DEFAULT_LEADERBOARD_LIMIT,
            n => n.min(MAX_LEADERBOARD_LIMIT),
        };
        let page = self.store.leaderboard(limit, offset)?;
        Ok(page
            .into_iter()
            .enumerate()
            .map(|(index, stats)| LeaderboardEntry {
                rank: offset + index + 1,
                player_id: stats.player_id,
                total_games: stats.total_games,
                total_wins: stats.total_wins,
                average_points: stats.average_points,
                win_rate: stats.win_rate(),
            })
            .collect())
    }
}
