use crate::cards::{CardId, DevelopmentCard, Noble, Tier};
use crate::catalog::Catalog;
use crate::deck::Dealer;
use crate::errors::{ErrorKind, GameError};
use crate::gems::{GemKind, GemSet};
use crate::rules::{
    check_noble_visit, check_victory, compute_actual_cost, determine_winner, validate_purchase,
    validate_reserve, validate_take_gems, validate_turn, GemRequest,
};
use crate::setup::{deal_session, SessionSetup};
use crate::state::{
    BoardState, FullGameState, Game, GameId, GamePlayer, GameStatus, PlayerId, PlayerState,
    MAX_HELD_GEMS,
};
use crate::stats::PlayerResult;
use crate::store::{ChangeSet, GameStore};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Where a purchased card comes from.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseSource {
    /// A face-up card, refilled from its tier's pile
    Board,
    /// One of the buyer's reserved cards, not refilled
    Reserve,
}

/// What a reservation takes.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReserveTarget {
    Visible(CardId),
    /// Blind draw from the top of a tier's pile
    Deck(Tier),
}

/// The mutation a successful action applied.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionDetail {
    GemsTaken {
        gems: GemSet,
    },
    CardPurchased {
        card: DevelopmentCard,
        source: PurchaseSource,
        paid: GemSet,
        replacement: Option<CardId>,
    },
    CardReserved {
        card: DevelopmentCard,
        target: ReserveTarget,
        replacement: Option<CardId>,
        gold_granted: bool,
    },
}

impl ActionDetail {
    /// Victory points the action itself is worth, nobles excluded.
    pub fn points(&self) -> u32 {
        match self {
            ActionDetail::CardPurchased { card, .. } => card.points,
            ActionDetail::GemsTaken { .. } | ActionDetail::CardReserved { .. } => 0,
        }
    }
}

/// Result of one committed action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Game record as committed, including the next turn or the winner
    pub game: Game,
    pub actor: PlayerId,
    pub detail: ActionDetail,
    /// Noble that visited the actor this turn
    pub noble: Option<Noble>,
    /// Actor's victory points after the action
    pub points: u32,
}

impl ActionOutcome {
    pub fn ended_game(&self) -> bool {
        self.game.status == GameStatus::Completed
    }
}

/// One mutex per game id. Every read-modify-commit sequence for a game runs
/// while holding its mutex.
///
/// Only weak references are kept, so an entry lives as long as some caller
/// holds its handle. Dead entries are pruned whenever a new one is added.
#[derive(Debug, Default)]
pub(crate) struct GameLocks {
    inner: Mutex<HashMap<GameId, Weak<Mutex<()>>>>,
}

impl GameLocks {
    pub(crate) fn handle(&self, game_id: GameId) -> Arc<Mutex<()>> {
        let mut locks = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(lock) = locks.get(&game_id).and_then(Weak::upgrade) {
            return lock;
        }
        locks.retain(|_, lock| lock.strong_count() > 0);
        let lock = Arc::new(Mutex::new(()));
        locks.insert(game_id, Arc::downgrade(&lock));
        lock
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// State loaded for the player whose turn it is.
struct Turn {
    game: Game,
    roster: Vec<GamePlayer>,
    board: BoardState,
    player: PlayerState,
}

/// Runs game actions against a [`GameStore`].
///
/// Each action loads the game, checks the turn, validates, applies the
/// change in memory, resolves noble visits and victory, and commits
/// everything in one [`ChangeSet`]. A failed action commits nothing.
/// Calls for the same game are serialized through a per-game mutex, so
/// concurrent callers always validate against the latest turn holder.
///
/// # Examples
///
/// ```
/// use gemstone_engine::catalog::StaticCatalog;
/// use gemstone_engine::engine::GameEngine;
/// use gemstone_engine::gems::GemKind;
/// use gemstone_engine::rules::GemRequest;
/// use gemstone_engine::store::InMemoryStore;
/// use std::sync::Arc;
///
/// let engine = GameEngine::new(
///     Arc::new(InMemoryStore::new()),
///     Arc::new(StaticCatalog::standard()),
/// )
/// .with_seed(7);
///
/// let game = engine.create_game(1, 2).unwrap();
/// engine.join_game(&game.room_code, 2).unwrap();
/// engine.start_game(game.id, 1).unwrap();
///
/// let request = GemRequest::from([
///     (GemKind::Diamond, 1),
///     (GemKind::Sapphire, 1),
///     (GemKind::Emerald, 1),
/// ]);
/// let outcome = engine.take_gems(game.id, 1, &request).unwrap();
/// assert_eq!(outcome.game.current_turn, Some(2));
/// ```
pub struct GameEngine {
    pub(crate) store: Arc<dyn GameStore>,
    catalog: Arc<dyn Catalog>,
    pub(crate) locks: GameLocks,
    seed: Option<u64>,
}

impl std::fmt::Debug for GameEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameEngine")
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

impl GameEngine {
    pub fn new(store: Arc<dyn GameStore>, catalog: Arc<dyn Catalog>) -> Self {
        Self {
            store,
            catalog,
            locks: GameLocks::default(),
            seed: None,
        }
    }

    /// Deals every game from a seed derived from `seed` and the game id
    /// instead of fresh entropy.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn store(&self) -> &Arc<dyn GameStore> {
        &self.store
    }

    pub fn game(&self, game_id: GameId) -> Result<Game, GameError> {
        Ok(self.store.load_game(game_id)?)
    }

    /// Deals the board and empty player states for the game's current roster.
    ///
    /// A waiting game moves into play in the same commit, with seat 0 to act.
    /// [`GameEngine::start_game`] is the creator-checked way to do this; this
    /// entry point skips the creator check and also deals an in-progress
    /// game that has no board yet.
    pub fn initialize_game(&self, game_id: GameId) -> Result<Game, GameError> {
        let lock = self.locks.handle(game_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let game = self.store.load_game(game_id)?;
        let roster = self.store.load_roster(game_id)?;
        self.begin(game, &roster)
    }

    /// Deals and commits the opening position. The caller holds the lock.
    pub(crate) fn begin(&self, mut game: Game, roster: &[GamePlayer]) -> Result<Game, GameError> {
        let game_id = game.id;
        if game.status == GameStatus::Completed {
            return Err(GameError::WrongStatus {
                game: game_id,
                status: game.status,
                expected: GameStatus::Waiting,
            });
        }
        if self.store.load_board(game_id)?.is_some() {
            return Err(GameError::AlreadyInitialized(game_id));
        }

        let setup = self.deal(game_id, roster)?;
        if game.status == GameStatus::Waiting {
            game.status = GameStatus::InProgress;
            game.started_at = Some(Utc::now());
        }
        if game.current_turn.is_none() {
            game.current_turn = roster.first().map(|seat| seat.player_id);
        }

        let game = self.store.commit(
            ChangeSet::new(game)
                .with_board(setup.board)
                .with_player_states(setup.player_states),
        )?;
        tracing::info!(game_id, players = roster.len(), "game started");
        Ok(game)
    }

    pub(crate) fn deal(
        &self,
        game_id: GameId,
        roster: &[GamePlayer],
    ) -> Result<SessionSetup, GameError> {
        if roster.len() < 2 {
            return Err(GameError::NotEnoughPlayers {
                game: game_id,
                count: roster.len(),
            });
        }
        let mut dealer = match self.seed {
            Some(seed) => Dealer::new_with_seed(seed.wrapping_add(game_id as u64)),
            None => Dealer::new(),
        };
        deal_session(game_id, roster, self.catalog.as_ref(), &mut dealer)
    }

    /// Takes three different colors or two of one color from the bank.
    pub fn take_gems(
        &self,
        game_id: GameId,
        player_id: PlayerId,
        request: &GemRequest,
    ) -> Result<ActionOutcome, GameError> {
        self.run_turn(game_id, player_id, |turn| {
            let draw = validate_take_gems(&turn.board, &turn.player, request)?;
            turn.board
                .bank
                .withdraw(&draw)
                .map_err(|gem| GameError::InsufficientBankSupply {
                    gem,
                    available: turn.board.bank.get(gem),
                    needed: draw.get(gem),
                })?;
            turn.player.gems.deposit(&draw);
            Ok(ActionDetail::GemsTaken { gems: draw })
        })
    }

    /// Buys a face-up or reserved card, paying with bonuses, gems and gold.
    pub fn purchase_card(
        &self,
        game_id: GameId,
        player_id: PlayerId,
        card_id: CardId,
        source: PurchaseSource,
    ) -> Result<ActionOutcome, GameError> {
        self.run_turn(game_id, player_id, |turn| {
            let card = match source {
                PurchaseSource::Board => turn.board.find_visible(card_id),
                PurchaseSource::Reserve => turn.player.find_reserved(card_id),
            }
            .cloned()
            .ok_or(GameError::CardNotFound(card_id))?;

            validate_purchase(&turn.board, &turn.player, &card)?;
            let paid = compute_actual_cost(&card, &turn.player);
            turn.player
                .gems
                .withdraw(&paid)
                .map_err(|_| GameError::CannotAfford {
                    card: card_id,
                    gold_needed: paid.get(GemKind::Gold),
                    gold_held: turn.player.gems.get(GemKind::Gold),
                })?;
            turn.board.bank.deposit(&paid);

            let replacement = match source {
                PurchaseSource::Board => turn
                    .board
                    .take_visible(card_id)
                    .and_then(|(_, replacement)| replacement),
                PurchaseSource::Reserve => {
                    turn.player.take_reserved(card_id);
                    None
                }
            };

            turn.player.bonuses.add(card.gem, 1);
            turn.player.purchased.push(card.clone());
            Ok(ActionDetail::CardPurchased {
                card,
                source,
                paid,
                replacement,
            })
        })
    }

    /// Reserves a face-up card or the top card of a tier's pile.
    ///
    /// One gold comes with the reservation while the bank has any and the
    /// player holds fewer than the hand limit; otherwise it is skipped
    /// without error. This departs from the table rule, which always hands
    /// out the gold and has the player discard down to the limit: there is
    /// no discard step here, so a player already at the limit gets nothing.
    pub fn reserve_card(
        &self,
        game_id: GameId,
        player_id: PlayerId,
        target: ReserveTarget,
    ) -> Result<ActionOutcome, GameError> {
        self.run_turn(game_id, player_id, |turn| {
            validate_reserve(&turn.player)?;
            let (card, replacement) = match target {
                ReserveTarget::Visible(card_id) => turn
                    .board
                    .take_visible(card_id)
                    .ok_or(GameError::CardNotFound(card_id))?,
                ReserveTarget::Deck(tier) => {
                    let card = turn
                        .board
                        .draw_from_pile(tier)
                        .ok_or(GameError::EmptyDeck { tier })?;
                    turn.player.blind_reserved.insert(card.id);
                    (card, None)
                }
            };
            turn.player.reserved.push(card.clone());

            let gold_granted = turn.player.held_total() < MAX_HELD_GEMS
                && turn.board.bank.remove(GemKind::Gold, 1).is_ok();
            if gold_granted {
                turn.player.gems.add(GemKind::Gold, 1);
            }

            Ok(ActionDetail::CardReserved {
                card,
                target,
                replacement,
                gold_granted,
            })
        })
    }

    /// Board, roster and every player's state, read under the game's lock.
    ///
    /// Nothing is hidden here; use [`FullGameState::concealed_for`] before
    /// handing the state to a player.
    pub fn full_state(&self, game_id: GameId) -> Result<FullGameState, GameError> {
        let lock = self.locks.handle(game_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let game = self.store.load_game(game_id)?;
        let roster = self.store.load_roster(game_id)?;
        let board = self.store.load_board(game_id)?.map(|board| board.view());

        let mut player_states = BTreeMap::new();
        for seat in &roster {
            match self.store.load_player_state(game_id, seat.player_id)? {
                Some(state) => {
                    player_states.insert(seat.player_id, state);
                }
                None if game.status == GameStatus::Waiting => {}
                None => return Err(missing_player_state(game_id, seat.player_id)),
            }
        }

        Ok(FullGameState {
            game,
            roster,
            board,
            player_states,
        })
    }

    fn run_turn<F>(
        &self,
        game_id: GameId,
        player_id: PlayerId,
        apply: F,
    ) -> Result<ActionOutcome, GameError>
    where
        F: FnOnce(&mut Turn) -> Result<ActionDetail, GameError>,
    {
        let lock = self.locks.handle(game_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let result = self
            .load_turn(game_id, player_id)
            .and_then(|mut turn| {
                let detail = apply(&mut turn)?;
                Ok((turn, detail))
            })
            .and_then(|(turn, detail)| self.finish_turn(turn, detail));

        match &result {
            Ok(outcome) => tracing::debug!(
                game_id,
                player_id,
                turn = outcome.game.turn_number,
                points = outcome.points,
                "action applied"
            ),
            Err(err) if err.kind() == ErrorKind::Integrity => {
                tracing::error!(game_id, player_id, error = %err, "action failed")
            }
            Err(err) => {
                tracing::warn!(game_id, player_id, code = err.code(), "action rejected")
            }
        }
        result
    }

    fn load_turn(&self, game_id: GameId, player_id: PlayerId) -> Result<Turn, GameError> {
        let game = self.store.load_game(game_id)?;
        if !game.is_in_progress() {
            return Err(GameError::WrongStatus {
                game: game_id,
                status: game.status,
                expected: GameStatus::InProgress,
            });
        }
        validate_turn(&game, player_id)?;

        let roster = self.store.load_roster(game_id)?;
        if !roster.iter().any(|seat| seat.player_id == player_id) {
            return Err(GameError::PlayerNotFound {
                game: game_id,
                player: player_id,
            });
        }
        let board = self
            .store
            .load_board(game_id)?
            .ok_or_else(|| GameError::Storage(format!("game {game_id} has no board")))?;
        let player = self
            .store
            .load_player_state(game_id, player_id)?
            .ok_or_else(|| missing_player_state(game_id, player_id))?;

        Ok(Turn {
            game,
            roster,
            board,
            player,
        })
    }

    fn finish_turn(&self, turn: Turn, detail: ActionDetail) -> Result<ActionOutcome, GameError> {
        let Turn {
            mut game,
            mut roster,
            mut board,
            mut player,
        } = turn;
        let game_id = game.id;
        let actor = player.player_id;

        let noble = award_noble(&mut board, &mut player);
        let gained = detail.points() + noble.as_ref().map_or(0, |noble| noble.points);

        let seat = roster
            .iter_mut()
            .find(|seat| seat.player_id == actor)
            .ok_or(GameError::PlayerNotFound {
                game: game_id,
                player: actor,
            })?;
        seat.victory_points += gained;
        let points = seat.victory_points;

        let mut results = Vec::new();
        if check_victory(&roster) {
            let mut states = HashMap::with_capacity(roster.len());
            for seat in roster.iter().filter(|seat| seat.player_id != actor) {
                if let Some(state) = self.store.load_player_state(game_id, seat.player_id)? {
                    states.insert(seat.player_id, state);
                }
            }
            states.insert(actor, player.clone());
            let winner = determine_winner(&roster, &states)
                .map(|seat| seat.player_id)
                .ok_or_else(|| GameError::Storage(format!("game {game_id} has no players")))?;

            results = roster
                .iter()
                .map(|seat| PlayerResult::new(seat, states.get(&seat.player_id), winner))
                .collect();

            game.status = GameStatus::Completed;
            game.current_turn = None;
            game.winner = Some(winner);
            game.completed_at = Some(Utc::now());
        } else {
            game.current_turn = Some(next_turn(game_id, &roster, actor)?);
            game.turn_number += 1;
        }

        let game = self.store.commit(
            ChangeSet::new(game)
                .with_roster(roster)
                .with_board(board)
                .with_player_state(player)
                .with_results(results),
        )?;

        if let Some(noble) = &noble {
            tracing::debug!(game_id, player_id = actor, noble = noble.id, "noble visit");
        }
        if game.status == GameStatus::Completed {
            tracing::info!(game_id, winner = ?game.winner, "game completed");
        }

        Ok(ActionOutcome {
            game,
            actor,
            detail,
            noble,
            points,
        })
    }
}

/// Awards the first noble on the board the player qualifies for, if any.
fn award_noble(board: &mut BoardState, player: &mut PlayerState) -> Option<Noble> {
    let index = board
        .nobles
        .iter()
        .position(|noble| check_noble_visit(player, noble))?;
    let noble = board.nobles.remove(index);
    player.nobles.push(noble.clone());
    Some(noble)
}

/// Next active seat after `current`, wrapping around.
fn next_turn(
    game_id: GameId,
    roster: &[GamePlayer],
    current: PlayerId,
) -> Result<PlayerId, GameError> {
    let active: Vec<&GamePlayer> = roster.iter().filter(|seat| seat.active).collect();
    let position = active
        .iter()
        .position(|seat| seat.player_id == current)
        .ok_or(GameError::PlayerNotFound {
            game: game_id,
            player: current,
        })?;
    Ok(active[(position + 1) % active.len()].player_id)
}

fn missing_player_state(game_id: GameId, player_id: PlayerId) -> GameError {
    GameError::Storage(format!(
        "no state for player {player_id} in game {game_id}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seat(player_id: PlayerId, seat: usize, active: bool) -> GamePlayer {
        GamePlayer {
            game_id: 1,
            player_id,
            seat,
            victory_points: 0,
            active,
            joined_at: Utc::now(),
        }
    }

    #[test]
    fn next_turn_wraps_around_the_table() {
        let roster = vec![seat(10, 0, true), seat(20, 1, true), seat(30, 2, true)];
        assert_eq!(next_turn(1, &roster, 10), Ok(20));
        assert_eq!(next_turn(1, &roster, 20), Ok(30));
        assert_eq!(next_turn(1, &roster, 30), Ok(10));
    }

    #[test]
    fn next_turn_skips_inactive_seats() {
        let roster = vec![seat(10, 0, true), seat(20, 1, false), seat(30, 2, true)];
        assert_eq!(next_turn(1, &roster, 10), Ok(30));
    }

    #[test]
    fn lock_entries_do_not_outlive_their_callers() {
        let engine = GameEngine::new(
            Arc::new(crate::store::InMemoryStore::new()),
            Arc::new(crate::catalog::StaticCatalog::standard()),
        );
        for game_id in 1000..11_000 {
            assert!(engine.full_state(game_id).is_err());
        }
        assert!(engine.locks.tracked() <= 1);

        let game = engine.create_game(1, 2).expect("create");
        engine.join_game(&game.room_code, 2).expect("join");
        engine.start_game(game.id, 1).expect("start");
        assert!(engine.locks.tracked() <= 1);
    }

    #[test]
    fn concurrent_callers_share_one_lock() {
        let locks = GameLocks::default();
        let first = locks.handle(7);
        let second = locks.handle(7);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &locks.handle(8)));

        drop((first, second));
        locks.handle(9);
        assert_eq!(locks.tracked(), 1);
    }

    #[test]
    fn award_noble_takes_only_the_first_match() {
        let noble = |id| Noble {
            id,
            name: format!("noble {id}"),
            points: 3,
            requirement: GemSet::from_counts([(GemKind::Ruby, 1)]),
        };
        let mut board = BoardState {
            game_id: 1,
            bank: GemSet::default(),
            tiers: Default::default(),
            nobles: vec![noble(1), noble(2)],
        };
        let mut player = PlayerState::new(1, 10);
        player.bonuses.add(GemKind::Ruby, 1);

        let awarded = award_noble(&mut board, &mut player).expect("noble");
        assert_eq!(awarded.id, 1);
        assert_eq!(board.nobles.len(), 1);
        assert_eq!(player.nobles.len(), 1);
    }
}
