//! Stateless rule checks over snapshots of game, board and player state.
//!
//! Nothing here performs I/O or mutates its inputs; the engine calls these
//! before touching any state so a rejected action leaves no trace.

use crate::cards::{DevelopmentCard, Noble};
use crate::errors::GameError;
use crate::gems::{GemKind, GemSet, COLORED};
use crate::state::{
    BoardState, Game, GamePlayer, PlayerId, PlayerState, MAX_HELD_GEMS, MAX_RESERVED,
    VICTORY_POINTS,
};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

/// Requested gem counts as received from a client. Counts are signed so
/// malformed requests can be rejected instead of silently clamped.
pub type GemRequest = BTreeMap<GemKind, i32>;

/// Bank level a color needs before two of it may be taken at once.
pub const DOUBLE_TAKE_MIN_SUPPLY: u32 = 4;

/// Fails with [`GameError::NotYourTurn`] unless `player` holds the turn.
pub fn validate_turn(game: &Game, player: PlayerId) -> Result<(), GameError> {
    if game.current_turn == Some(player) {
        Ok(())
    } else {
        Err(GameError::NotYourTurn { player })
    }
}

/// Validates a take-gems request and returns the normalized draw.
///
/// Two shapes are legal: one each of three different colors, or two of a
/// single color whose bank count is at least [`DOUBLE_TAKE_MIN_SUPPLY`].
/// Gold can never be requested. The player's holdings after the draw must
/// not exceed [`MAX_HELD_GEMS`].
///
/// # Errors
///
/// - [`GameError::InvalidGemRequest`] for gold, negative counts or any other shape
/// - [`GameError::InsufficientBankSupply`] when the bank cannot back the draw
/// - [`GameError::GemLimitExceeded`] when the draw would overflow the hand
///
/// # Examples
///
/// ```
/// use gemstone_engine::gems::{GemKind, GemSet};
/// use gemstone_engine::rules::{validate_take_gems, GemRequest};
/// use gemstone_engine::state::{BoardState, PlayerState};
///
/// let board = BoardState {
///     game_id: 1,
///     bank: GemSet::uniform(4, 5),
///     tiers: Default::default(),
///     nobles: vec![],
/// };
/// let player = PlayerState::new(1, 7);
///
/// let request = GemRequest::from([(GemKind::Ruby, 2)]);
/// let draw = validate_take_gems(&board, &player, &request).unwrap();
/// assert_eq!(draw.get(GemKind::Ruby), 2);
/// ```
pub fn validate_take_gems(
    board: &BoardState,
    player: &PlayerState,
    request: &GemRequest,
) -> Result<GemSet, GameError> {
    let mut draw = GemSet::default();
    let mut doubled = None;

    for (&kind, &count) in request {
        if count < 0 {
            return Err(invalid_request(format!("negative count for {kind}")));
        }
        if count == 0 {
            continue;
        }
        if kind == GemKind::Gold {
            return Err(invalid_request("gold cannot be taken directly"));
        }
        if count == 2 {
            doubled = Some(kind);
        }
        draw.add(kind, count.unsigned_abs());
    }

    let kinds = draw.iter().count();
    match (kinds, draw.total(), doubled) {
        (3, 3, None) => {
            for (kind, needed) in draw.iter() {
                let available = board.bank.get(kind);
                if available < needed {
                    return Err(GameError::InsufficientBankSupply {
                        gem: kind,
                        available,
                        needed,
                    });
                }
            }
        }
        (1, 2, Some(kind)) => {
            let available = board.bank.get(kind);
            if available < DOUBLE_TAKE_MIN_SUPPLY {
                return Err(GameError::InsufficientBankSupply {
                    gem: kind,
                    available,
                    needed: DOUBLE_TAKE_MIN_SUPPLY,
                });
            }
        }
        _ => {
            return Err(invalid_request(
                "take one each of three colors or two of one color",
            ))
        }
    }

    let held = player.held_total();
    if held + draw.total() > MAX_HELD_GEMS {
        return Err(GameError::GemLimitExceeded {
            held,
            taking: draw.total(),
            limit: MAX_HELD_GEMS,
        });
    }

    Ok(draw)
}

/// How a player would pay for a card: colored gems from their hand plus a
/// number of gold wildcards covering whatever is still missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Settlement {
    from_held: GemSet,
    gold: u32,
}

/// Shared shortfall accounting for affordability and payment.
///
/// Per colored kind the player owes `cost - bonus` (floored at zero), pays
/// as much as they hold, and the remainder is the shortfall.
fn settle(card: &DevelopmentCard, player: &PlayerState) -> Settlement {
    let mut from_held = GemSet::default();
    let mut gold = 0;
    for kind in COLORED {
        let owed = card.cost.get(kind).saturating_sub(player.bonuses.get(kind));
        let paid = owed.min(player.gems.get(kind));
        from_held.add(kind, paid);
        gold += owed - paid;
    }
    Settlement { from_held, gold }
}

/// Checks that `card` is on offer to the player and that they can pay for it.
///
/// A card is on offer when it is face up on the board or in the player's
/// reserve.
pub fn validate_purchase(
    board: &BoardState,
    player: &PlayerState,
    card: &DevelopmentCard,
) -> Result<(), GameError> {
    if board.find_visible(card.id).is_none() && player.find_reserved(card.id).is_none() {
        return Err(GameError::CardNotFound(card.id));
    }

    let settlement = settle(card, player);
    let gold_held = player.gems.get(GemKind::Gold);
    if settlement.gold > gold_held {
        return Err(GameError::CannotAfford {
            card: card.id,
            gold_needed: settlement.gold,
            gold_held,
        });
    }
    Ok(())
}

/// Gems the player actually hands over for `card`, gold included only when
/// non-zero. Only meaningful after [`validate_purchase`] succeeded.
pub fn compute_actual_cost(card: &DevelopmentCard, player: &PlayerState) -> GemSet {
    let settlement = settle(card, player);
    let mut cost = settlement.from_held;
    cost.add(GemKind::Gold, settlement.gold);
    cost
}

pub fn validate_reserve(player: &PlayerState) -> Result<(), GameError> {
    if player.reserved.len() >= MAX_RESERVED {
        return Err(GameError::ReserveLimitExceeded {
            limit: MAX_RESERVED,
        });
    }
    Ok(())
}

/// True when the player's permanent bonuses meet every requirement of `noble`.
pub fn check_noble_visit(player: &PlayerState, noble: &Noble) -> bool {
    COLORED
        .iter()
        .all(|&kind| player.bonuses.get(kind) >= noble.requirement.get(kind))
}

pub fn check_victory(players: &[GamePlayer]) -> bool {
    players.iter().any(|p| p.victory_points >= VICTORY_POINTS)
}

/// Picks the winner: most points, then fewest purchased cards, then the
/// lowest seat. Players without a known state rank last on card count.
pub fn determine_winner<'a>(
    players: &'a [GamePlayer],
    states: &HashMap<PlayerId, PlayerState>,
) -> Option<&'a GamePlayer> {
    players.iter().min_by_key(|player| {
        let cards = states
            .get(&player.player_id)
            .map_or(usize::MAX, |state| state.purchased.len());
        (Reverse(player.victory_points), cards, player.seat)
    })
}

fn invalid_request(reason: impl Into<String>) -> GameError {
    GameError::InvalidGemRequest {
        reason: reason.into(),
    }
}
