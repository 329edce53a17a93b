//! # gemstone-engine: Gem Trading Board Game Core
//!
//! Rules, state and turn handling for a two to four player gem trading game
//! in the style of Splendor. Players take gems from a shared bank, buy or
//! reserve development cards that grant permanent bonuses, attract nobles,
//! and race to 15 victory points.
//!
//! ## Core Modules
//!
//! - [`gems`] - The six gem kinds and per-kind counts ([`gems::GemSet`])
//! - [`cards`] - Development cards, nobles and tiers
//! - [`catalog`] - Card and noble reference data, built in or loaded from JSON
//! - [`state`] - Game, roster, board and player state records
//! - [`rules`] - Stateless validation and cost computation
//! - [`deck`] - Shuffling with ChaCha20 RNG
//! - [`setup`] - Dealing the initial board for a started game
//! - [`store`] - Storage contract with atomic change sets
//! - [`engine`] - Action execution, noble visits, victory and turn order
//! - [`lobby`] - Creating, joining, leaving and starting games
//! - [`stats`] - Per-player career statistics and the leaderboard
//! - [`errors`] - Error types and their classification
//!
//! ## Quick Start
//!
//! ```rust
//! use gemstone_engine::catalog::StaticCatalog;
//! use gemstone_engine::engine::{GameEngine, ReserveTarget};
//! use gemstone_engine::cards::Tier;
//! use gemstone_engine::store::InMemoryStore;
//! use std::sync::Arc;
//!
//! let engine = GameEngine::new(
//!     Arc::new(InMemoryStore::new()),
//!     Arc::new(StaticCatalog::standard()),
//! );
//! let game = engine.create_game(10, 2).unwrap();
//! engine.join_game(&game.room_code, 20).unwrap();
//! engine.start_game(game.id, 10).unwrap();
//!
//! let outcome = engine
//!     .reserve_card(game.id, 10, ReserveTarget::Deck(Tier::One))
//!     .unwrap();
//! assert_eq!(outcome.game.current_turn, Some(20));
//!
//! let state = engine.full_state(game.id).unwrap();
//! assert_eq!(state.player_states[&10].reserved.len(), 1);
//! ```
//!
//! ## Deterministic Dealing
//!
//! Boards are shuffled from fresh entropy by default. A seeded engine deals
//! the same board for the same game id:
//!
//! ```rust
//! use gemstone_engine::deck::Dealer;
//!
//! let mut a = vec![1, 2, 3, 4, 5];
//! let mut b = a.clone();
//! Dealer::new_with_seed(42).shuffle(&mut a);
//! Dealer::new_with_seed(42).shuffle(&mut b);
//! assert_eq!(a, b);
//! ```

pub mod cards;
pub mod catalog;
pub mod deck;
pub mod engine;
pub mod errors;
pub mod gems;
pub mod lobby;
pub mod rules;
pub mod setup;
pub mod state;
pub mod stats;
pub mod store;
