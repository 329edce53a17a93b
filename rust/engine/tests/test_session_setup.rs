use gemstone_engine::cards::{DevelopmentCard, Noble, Tier, ALL_TIERS};
use gemstone_engine::catalog::{Catalog, StaticCatalog};
use gemstone_engine::deck::Dealer;
use gemstone_engine::engine::GameEngine;
use gemstone_engine::errors::{ErrorKind, GameError};
use gemstone_engine::gems::{GemKind, GemSet, COLORED};
use gemstone_engine::setup::{deal_session, starting_bank};
use gemstone_engine::state::{GamePlayer, GameStatus};
use gemstone_engine::store::InMemoryStore;
use chrono::Utc;
use std::sync::Arc;

mod common;
use common::card;

fn roster(count: usize) -> Vec<GamePlayer> {
    (0..count)
        .map(|seat| GamePlayer {
            game_id: 1,
            player_id: seat as i64 + 100,
            seat,
            victory_points: 0,
            active: true,
            joined_at: Utc::now(),
        })
        .collect()
}

#[test]
fn bank_size_depends_on_player_count() {
    for (players, colored) in [(2, 4), (3, 5), (4, 7), (1, 7), (6, 7)] {
        let bank = starting_bank(players);
        for kind in COLORED {
            assert_eq!(bank.get(kind), colored, "{players} players, {kind}");
        }
        assert_eq!(bank.get(GemKind::Gold), 5);
    }
}

#[test]
fn deals_four_per_tier_and_one_noble_more_than_players() {
    let catalog = StaticCatalog::standard();
    for players in 2..=4 {
        let setup = deal_session(1, &roster(players), &catalog, &mut Dealer::new_with_seed(3))
            .expect("deal");
        let board = &setup.board;
        for (tier, pile) in ALL_TIERS.into_iter().zip([36, 26, 16]) {
            assert_eq!(board.row(tier).visible.len(), 4);
            assert_eq!(board.row(tier).pile.len(), pile);
            assert!(board.row(tier).visible.iter().all(|c| c.tier == tier));
        }
        assert_eq!(board.nobles.len(), players + 1);
        assert_eq!(setup.player_states.len(), players);
        assert!(setup
            .player_states
            .iter()
            .all(|p| p.gems.is_empty() && p.bonuses.is_empty() && p.nobles.is_empty()));
    }
}

#[test]
fn seeds_control_the_shuffle() {
    let catalog = StaticCatalog::standard();
    let deal = |seed| {
        deal_session(1, &roster(2), &catalog, &mut Dealer::new_with_seed(seed))
            .expect("deal")
            .board
    };
    assert_eq!(deal(9), deal(9));
    assert_ne!(deal(9).tiers, deal(10).tiers);
}

#[test]
fn small_catalogs_deal_what_they_have() {
    let cards = vec![
        card(1, Tier::One, GemKind::Ruby, 0, GemSet::default()),
        card(2, Tier::One, GemKind::Onyx, 0, GemSet::default()),
        card(3, Tier::Three, GemKind::Diamond, 4, GemSet::default()),
    ];
    let nobles = vec![Noble {
        id: 1,
        name: "Francis I".into(),
        points: 3,
        requirement: GemSet::from_counts([(GemKind::Ruby, 3)]),
    }];
    let catalog = StaticCatalog::new(cards, nobles).expect("catalog");

    let setup =
        deal_session(1, &roster(4), &catalog, &mut Dealer::new_with_seed(1)).expect("deal");
    assert_eq!(setup.board.row(Tier::One).visible.len(), 2);
    assert!(setup.board.row(Tier::One).pile.is_empty());
    assert!(setup.board.row(Tier::Two).visible.is_empty());
    assert_eq!(setup.board.row(Tier::Three).visible.len(), 1);
    assert_eq!(setup.board.nobles.len(), 1);
}

struct BrokenCatalog;

impl Catalog for BrokenCatalog {
    fn development_cards(&self) -> Result<Vec<DevelopmentCard>, GameError> {
        Err(GameError::Catalog("card table unreachable".into()))
    }

    fn nobles(&self) -> Result<Vec<Noble>, GameError> {
        Ok(Vec::new())
    }
}

#[test]
fn catalog_failure_leaves_game_waiting_without_board() {
    let engine = GameEngine::new(Arc::new(InMemoryStore::new()), Arc::new(BrokenCatalog));
    let game = engine.create_game(1, 2).expect("create");
    engine.join_game(&game.room_code, 2).expect("join");

    let err = engine.start_game(game.id, 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);

    let state = engine.full_state(game.id).expect("state");
    assert_eq!(state.game.status, GameStatus::Waiting);
    assert!(state.board.is_none());
    assert!(state.player_states.is_empty());
}
