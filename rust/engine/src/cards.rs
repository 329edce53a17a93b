use crate::gems::{GemKind, GemSet};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type CardId = i64;
pub type NobleId = i64;

/// Card strength band. Each tier has its own visible row and draw pile.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Tier {
    One = 1,
    Two = 2,
    Three = 3,
}

pub const ALL_TIERS: [Tier; 3] = [Tier::One, Tier::Two, Tier::Three];

impl Tier {
    pub fn number(self) -> u8 {
        self as u8
    }

    /// Zero-based position of the tier in per-tier arrays.
    pub fn index(self) -> usize {
        self as usize - 1
    }

    pub fn from_number(n: u8) -> Option<Tier> {
        match n {
            1 => Some(Tier::One),
            2 => Some(Tier::Two),
            3 => Some(Tier::Three),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Tier {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Tier::from_number(value).ok_or_else(|| format!("tier must be 1, 2 or 3 (got {value})"))
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> Self {
        tier.number()
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier {}", self.number())
    }
}

/// A development card. Buying one grants a permanent bonus of `gem` and
/// `points` victory points.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct DevelopmentCard {
    pub id: CardId,
    pub tier: Tier,
    /// Colored kind produced as a permanent bonus
    pub gem: GemKind,
    pub points: u32,
    /// Colored cost; the gold entry is always zero
    pub cost: GemSet,
}

/// A noble visits the first player whose permanent bonuses cover its
/// requirement.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Noble {
    pub id: NobleId,
    pub name: String,
    pub points: u32,
    pub requirement: GemSet,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_serializes_as_number() {
        let json = serde_json::to_string(&Tier::Two).expect("serialize");
        assert_eq!(json, "2");
        let tier: Tier = serde_json::from_str("3").expect("parse");
        assert_eq!(tier, Tier::Three);
        assert!(serde_json::from_str::<Tier>("4").is_err());
    }

    #[test]
    fn tier_index_is_zero_based() {
        let indexes: Vec<usize> = ALL_TIERS.iter().map(|t| t.index()).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
    }
}
