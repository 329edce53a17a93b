#![allow(dead_code)]

use gemstone_engine::cards::{CardId, DevelopmentCard, Tier};
use gemstone_engine::catalog::StaticCatalog;
use gemstone_engine::engine::GameEngine;
use gemstone_engine::gems::{GemKind, GemSet, ALL_KINDS};
use gemstone_engine::state::{BoardState, Game, GameId, GamePlayer, PlayerId, PlayerState};
use gemstone_engine::store::{ChangeSet, InMemoryStore};
use std::sync::Arc;

pub fn engine() -> GameEngine {
    GameEngine::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(StaticCatalog::standard()),
    )
    .with_seed(42)
}

/// Creates, fills and starts a game; `players[0]` is the creator.
pub fn started_game(engine: &GameEngine, players: &[PlayerId]) -> Game {
    let game = engine
        .create_game(players[0], players.len())
        .expect("create game");
    for &player in &players[1..] {
        engine.join_game(&game.room_code, player).expect("join game");
    }
    engine.start_game(game.id, players[0]).expect("start game")
}

pub fn card(id: CardId, tier: Tier, gem: GemKind, points: u32, cost: GemSet) -> DevelopmentCard {
    DevelopmentCard {
        id,
        tier,
        gem,
        points,
        cost,
    }
}

pub fn board(engine: &GameEngine, game_id: GameId) -> BoardState {
    engine
        .store()
        .load_board(game_id)
        .expect("load board")
        .expect("board exists")
}

pub fn player_state(engine: &GameEngine, game_id: GameId, player_id: PlayerId) -> PlayerState {
    engine
        .store()
        .load_player_state(game_id, player_id)
        .expect("load player state")
        .expect("player state exists")
}

pub fn edit_board(engine: &GameEngine, game_id: GameId, edit: impl FnOnce(&mut BoardState)) {
    let game = engine.game(game_id).expect("game");
    let mut board = board(engine, game_id);
    edit(&mut board);
    engine
        .store()
        .commit(ChangeSet::new(game).with_board(board))
        .expect("commit board");
}

pub fn edit_player(
    engine: &GameEngine,
    game_id: GameId,
    player_id: PlayerId,
    edit: impl FnOnce(&mut PlayerState),
) {
    let game = engine.game(game_id).expect("game");
    let mut state = player_state(engine, game_id, player_id);
    edit(&mut state);
    engine
        .store()
        .commit(ChangeSet::new(game).with_player_state(state))
        .expect("commit player state");
}

pub fn edit_roster(engine: &GameEngine, game_id: GameId, edit: impl FnOnce(&mut Vec<GamePlayer>)) {
    let game = engine.game(game_id).expect("game");
    let mut roster = engine.store().load_roster(game_id).expect("roster");
    edit(&mut roster);
    engine
        .store()
        .commit(ChangeSet::new(game).with_roster(roster))
        .expect("commit roster");
}

/// Puts `card` face up in the first slot of its tier.
pub fn place_visible(engine: &GameEngine, game_id: GameId, card: DevelopmentCard) {
    edit_board(engine, game_id, |board| {
        let tier = card.tier;
        board.row_mut(tier).visible[0] = card;
    });
}

/// Bank plus every player's holdings, per kind.
pub fn gems_in_circulation(engine: &GameEngine, game_id: GameId) -> GemSet {
    let state = engine.full_state(game_id).expect("full state");
    let mut total = state.board.expect("board").bank;
    for player in state.player_states.values() {
        total.deposit(&player.gems);
    }
    total
}

pub fn assert_same_counts(left: &GemSet, right: &GemSet) {
    for kind in ALL_KINDS {
        assert_eq!(left.get(kind), right.get(kind), "{kind} count differs");
    }
}
