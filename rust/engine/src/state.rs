use crate::cards::{CardId, DevelopmentCard, Noble, Tier, ALL_TIERS};
use crate::gems::GemSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub type GameId = i64;
pub type PlayerId = i64;

/// Number of face-up cards dealt per tier.
pub const VISIBLE_PER_TIER: usize = 4;
/// Most gems a player may hold at the end of a turn.
pub const MAX_HELD_GEMS: u32 = 10;
/// Most cards a player may keep reserved.
pub const MAX_RESERVED: usize = 3;
/// Points that end the game.
pub const VICTORY_POINTS: u32 = 15;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Waiting,
    InProgress,
    Completed,
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GameStatus::Waiting => "waiting",
            GameStatus::InProgress => "in_progress",
            GameStatus::Completed => "completed",
        };
        f.write_str(label)
    }
}

/// A game room and its turn bookkeeping.
///
/// `current_turn` is set exactly while the game is in progress and `winner`
/// exactly once it has completed.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub room_code: String,
    pub status: GameStatus,
    pub created_by: PlayerId,
    pub current_turn: Option<PlayerId>,
    pub turn_number: u32,
    pub winner: Option<PlayerId>,
    /// Seats available (2-4)
    pub player_count: usize,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Bumped by the store on every committed change
    pub version: u64,
}

impl Game {
    pub fn is_in_progress(&self) -> bool {
        self.status == GameStatus::InProgress
    }
}

/// A player's seat in a game.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct GamePlayer {
    pub game_id: GameId,
    pub player_id: PlayerId,
    /// 0-based, assigned in join order
    pub seat: usize,
    pub victory_points: u32,
    pub active: bool,
    pub joined_at: DateTime<Utc>,
}

/// One tier's face-up row and face-down pile.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TierRow {
    pub visible: Vec<DevelopmentCard>,
    /// Top of the pile is index 0
    pub pile: Vec<DevelopmentCard>,
}

impl TierRow {
    pub fn remaining(&self) -> usize {
        self.visible.len() + self.pile.len()
    }
}

/// Shared table state of a running game.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct BoardState {
    pub game_id: GameId,
    pub bank: GemSet,
    pub tiers: [TierRow; 3],
    pub nobles: Vec<Noble>,
}

impl BoardState {
    pub fn row(&self, tier: Tier) -> &TierRow {
        &self.tiers[tier.index()]
    }

    pub fn row_mut(&mut self, tier: Tier) -> &mut TierRow {
        &mut self.tiers[tier.index()]
    }

    pub fn find_visible(&self, card_id: CardId) -> Option<&DevelopmentCard> {
        self.tiers
            .iter()
            .flat_map(|row| row.visible.iter())
            .find(|card| card.id == card_id)
    }

    /// Removes a face-up card and refills its slot from the same tier's
    /// pile. When the pile is exhausted the slot disappears for good.
    ///
    /// Returns the taken card and the id of its replacement, if any.
    pub fn take_visible(&mut self, card_id: CardId) -> Option<(DevelopmentCard, Option<CardId>)> {
        for row in &mut self.tiers {
            let Some(slot) = row.visible.iter().position(|card| card.id == card_id) else {
                continue;
            };
            if row.pile.is_empty() {
                return Some((row.visible.remove(slot), None));
            }
            let replacement = row.pile.remove(0);
            let replacement_id = replacement.id;
            let taken = std::mem::replace(&mut row.visible[slot], replacement);
            return Some((taken, Some(replacement_id)));
        }
        None
    }

    /// Draws the top card of a tier's pile.
    pub fn draw_from_pile(&mut self, tier: Tier) -> Option<DevelopmentCard> {
        let row = self.row_mut(tier);
        if row.pile.is_empty() {
            None
        } else {
            Some(row.pile.remove(0))
        }
    }

    /// Client-facing view; draw piles are reduced to their sizes.
    pub fn view(&self) -> BoardView {
        BoardView {
            game_id: self.game_id,
            bank: self.bank,
            visible: ALL_TIERS.map(|tier| self.row(tier).visible.clone()),
            pile_sizes: ALL_TIERS.map(|tier| self.row(tier).pile.len()),
            nobles: self.nobles.clone(),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct BoardView {
    pub game_id: GameId,
    pub bank: GemSet,
    pub visible: [Vec<DevelopmentCard>; 3],
    pub pile_sizes: [usize; 3],
    pub nobles: Vec<Noble>,
}

/// Everything one seated player owns.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub game_id: GameId,
    pub player_id: PlayerId,
    /// Spendable gems, including gold
    pub gems: GemSet,
    /// One per purchased card, by produced kind
    pub bonuses: GemSet,
    pub purchased: Vec<DevelopmentCard>,
    pub reserved: Vec<DevelopmentCard>,
    pub nobles: Vec<Noble>,
    /// Reserved cards drawn face down from a pile
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub blind_reserved: BTreeSet<CardId>,
    /// Tiers of blind reservations withheld from this view
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub concealed_reserved: Vec<Tier>,
}

impl PlayerState {
    pub fn new(game_id: GameId, player_id: PlayerId) -> Self {
        Self {
            game_id,
            player_id,
            gems: GemSet::default(),
            bonuses: GemSet::default(),
            purchased: Vec::new(),
            reserved: Vec::new(),
            nobles: Vec::new(),
            blind_reserved: BTreeSet::new(),
            concealed_reserved: Vec::new(),
        }
    }

    pub fn held_total(&self) -> u32 {
        self.gems.total()
    }

    pub fn find_reserved(&self, card_id: CardId) -> Option<&DevelopmentCard> {
        self.reserved.iter().find(|card| card.id == card_id)
    }

    pub fn take_reserved(&mut self, card_id: CardId) -> Option<DevelopmentCard> {
        let index = self.reserved.iter().position(|card| card.id == card_id)?;
        self.blind_reserved.remove(&card_id);
        Some(self.reserved.remove(index))
    }

    /// Replaces blind reservations with their tiers, as other players see
    /// them.
    fn conceal_blind_reservations(&mut self) {
        let blind = std::mem::take(&mut self.blind_reserved);
        let (hidden, shown): (Vec<_>, Vec<_>) = std::mem::take(&mut self.reserved)
            .into_iter()
            .partition(|card| blind.contains(&card.id));
        self.reserved = shown;
        self.concealed_reserved.extend(hidden.iter().map(|card| card.tier));
    }
}

/// Board, roster and every player's state for one game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullGameState {
    pub game: Game,
    pub roster: Vec<GamePlayer>,
    pub board: Option<BoardView>,
    pub player_states: BTreeMap<PlayerId, PlayerState>,
}

impl FullGameState {
    /// The state as `viewer` may see it: other players' blind reservations
    /// are reduced to their tiers. Without a viewer every one is hidden.
    pub fn concealed_for(mut self, viewer: Option<PlayerId>) -> Self {
        for (player_id, state) in &mut self.player_states {
            if Some(*player_id) != viewer {
                state.conceal_blind_reservations();
            }
        }
        self
    }
}
