use crate::cards::{DevelopmentCard, Noble, Tier};
use crate::errors::GameError;
use crate::gems::{GemKind, GemSet, COLORED};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Read-only source of every development card and noble in the game.
pub trait Catalog: Send + Sync {
    fn development_cards(&self) -> Result<Vec<DevelopmentCard>, GameError>;
    fn nobles(&self) -> Result<Vec<Noble>, GameError>;
}

/// Catalog held in memory, either built in or loaded from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticCatalog {
    cards: Vec<DevelopmentCard>,
    nobles: Vec<Noble>,
}

impl StaticCatalog {
    pub fn new(cards: Vec<DevelopmentCard>, nobles: Vec<Noble>) -> Result<Self, GameError> {
        let catalog = Self { cards, nobles };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parses `{"cards": [...], "nobles": [...]}`.
    pub fn from_json(json: &str) -> Result<Self, GameError> {
        let parsed: StaticCatalog = serde_json::from_str(json)
            .map_err(|err| GameError::Catalog(format!("invalid catalog JSON: {err}")))?;
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, GameError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|err| {
            GameError::Catalog(format!("failed to read {}: {err}", path.display()))
        })?;
        Self::from_json(&json)
    }

    /// The built-in 90-card, 10-noble catalog.
    ///
    /// Every colored kind gets the same cost shapes, expressed relative to
    /// its position in [`COLORED`], so no color is favoured.
    pub fn standard() -> Self {
        let mut cards = Vec::with_capacity(90);
        let mut next_id = 1;
        for (tier, shapes) in [
            (Tier::One, TIER_ONE_SHAPES),
            (Tier::Two, TIER_TWO_SHAPES),
            (Tier::Three, TIER_THREE_SHAPES),
        ] {
            for (color_index, &gem) in COLORED.iter().enumerate() {
                for &(points, cost) in shapes {
                    cards.push(DevelopmentCard {
                        id: next_id,
                        tier,
                        gem,
                        points,
                        cost: relative_set(color_index, cost),
                    });
                    next_id += 1;
                }
            }
        }

        let nobles = NOBLE_NAMES
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let start = i % COLORED.len();
                let requirement = if i < COLORED.len() {
                    relative_set(start, &[(0, 4), (1, 4)])
                } else {
                    relative_set(start, &[(0, 3), (1, 3), (2, 3)])
                };
                Noble {
                    id: i as i64 + 1,
                    name: (*name).to_string(),
                    points: 3,
                    requirement,
                }
            })
            .collect();

        Self { cards, nobles }
    }

    fn validate(&self) -> Result<(), GameError> {
        let mut ids = HashSet::new();
        for card in &self.cards {
            if !ids.insert(card.id) {
                return Err(GameError::Catalog(format!("duplicate card id {}", card.id)));
            }
            if !card.gem.is_colored() {
                return Err(GameError::Catalog(format!(
                    "card {} produces gold",
                    card.id
                )));
            }
            if card.cost.get(GemKind::Gold) != 0 {
                return Err(GameError::Catalog(format!(
                    "card {} has a gold cost",
                    card.id
                )));
            }
        }

        let mut noble_ids = HashSet::new();
        for noble in &self.nobles {
            if !noble_ids.insert(noble.id) {
                return Err(GameError::Catalog(format!(
                    "duplicate noble id {}",
                    noble.id
                )));
            }
            if noble.requirement.get(GemKind::Gold) != 0 {
                return Err(GameError::Catalog(format!(
                    "noble {} requires gold",
                    noble.id
                )));
            }
        }
        Ok(())
    }
}

impl Catalog for StaticCatalog {
    fn development_cards(&self) -> Result<Vec<DevelopmentCard>, GameError> {
        Ok(self.cards.clone())
    }

    fn nobles(&self) -> Result<Vec<Noble>, GameError> {
        Ok(self.nobles.clone())
    }
}

/// `(points, [(offset from the card's own color, count)])`
type Shape = (u32, &'static [(usize, u32)]);

const TIER_ONE_SHAPES: &[Shape] = &[
    (0, &[(1, 1), (2, 1), (3, 1), (4, 1)]),
    (0, &[(1, 1), (2, 2), (3, 1), (4, 1)]),
    (0, &[(1, 2), (2, 2), (4, 1)]),
    (0, &[(0, 1), (1, 3), (3, 1)]),
    (0, &[(2, 2), (3, 1)]),
    (0, &[(1, 2), (3, 2)]),
    (0, &[(4, 3)]),
    (1, &[(2, 4)]),
];

const TIER_TWO_SHAPES: &[Shape] = &[
    (1, &[(1, 2), (2, 2), (3, 3)]),
    (1, &[(0, 2), (1, 3), (4, 3)]),
    (2, &[(3, 5)]),
    (2, &[(1, 5), (2, 3)]),
    (2, &[(2, 4), (3, 2), (4, 1)]),
    (3, &[(0, 6)]),
];

const TIER_THREE_SHAPES: &[Shape] = &[
    (3, &[(1, 3), (2, 3), (3, 5), (4, 3)]),
    (4, &[(4, 7)]),
    (4, &[(0, 3), (3, 6), (4, 3)]),
    (5, &[(0, 3), (4, 7)]),
];

const NOBLE_NAMES: [&str; 10] = [
    "Anne of Brittany",
    "Catherine de' Medici",
    "Charles V",
    "Elisabeth of Austria",
    "Francis I",
    "Henry VIII",
    "Isabella I of Castile",
    "Mary Stuart",
    "Niccolo Machiavelli",
    "Suleiman the Magnificent",
];

fn relative_set(base: usize, counts: &[(usize, u32)]) -> GemSet {
    counts
        .iter()
        .map(|&(offset, count)| (COLORED[(base + offset) % COLORED.len()], count))
        .collect()
}
