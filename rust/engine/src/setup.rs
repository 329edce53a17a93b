use crate::cards::{DevelopmentCard, ALL_TIERS};
use crate::catalog::Catalog;
use crate::deck::Dealer;
use crate::errors::GameError;
use crate::gems::GemSet;
use crate::state::{BoardState, GameId, GamePlayer, PlayerState, TierRow, VISIBLE_PER_TIER};

/// Gold wildcards in the bank regardless of player count.
pub const GOLD_SUPPLY: u32 = 5;

/// Starting bank for `players` seats: 4 of each color for two players,
/// 5 for three, 7 otherwise; always [`GOLD_SUPPLY`] gold.
pub fn starting_bank(players: usize) -> GemSet {
    let colored = match players {
        2 => 4,
        3 => 5,
        _ => 7,
    };
    GemSet::uniform(colored, GOLD_SUPPLY)
}

/// Initial board and one empty state per seated player.
#[derive(Debug, Clone)]
pub struct SessionSetup {
    pub board: BoardState,
    pub player_states: Vec<PlayerState>,
}

/// Deals a fresh board for `roster` from the catalog.
///
/// Each tier is shuffled independently; the first four cards go face up
/// and the rest form the pile. `roster.len() + 1` nobles are drawn (fewer
/// when the catalog runs short). Nothing is written here, so a catalog
/// failure leaves no trace.
pub fn deal_session(
    game_id: GameId,
    roster: &[GamePlayer],
    catalog: &dyn Catalog,
    dealer: &mut Dealer,
) -> Result<SessionSetup, GameError> {
    let cards = catalog.development_cards()?;
    let mut nobles = catalog.nobles()?;

    let mut tiers: [TierRow; 3] = Default::default();
    for tier in ALL_TIERS {
        let mut deck: Vec<DevelopmentCard> =
            cards.iter().filter(|c| c.tier == tier).cloned().collect();
        dealer.shuffle(&mut deck);
        let split = deck.len().min(VISIBLE_PER_TIER);
        let pile = deck.split_off(split);
        tiers[tier.index()] = TierRow {
            visible: deck,
            pile,
        };
    }

    dealer.shuffle(&mut nobles);
    nobles.truncate(roster.len() + 1);

    let board = BoardState {
        game_id,
        bank: starting_bank(roster.len()),
        tiers,
        nobles,
    };

    let player_states = roster
        .iter()
        .map(|seat| PlayerState::new(game_id, seat.player_id))
        .collect();

    tracing::debug!(
        game_id,
        players = roster.len(),
        nobles = board.nobles.len(),
        "dealt session board"
    );

    Ok(SessionSetup {
        board,
        player_states,
    })
}
