use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the six gem kinds in circulation.
///
/// The five colored kinds can be produced by cards and required by costs and
/// nobles. [`GemKind::Gold`] is the wildcard: it is only obtained by
/// reserving a card and can stand in for any colored shortfall.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GemKind {
    Diamond,
    Sapphire,
    Emerald,
    Ruby,
    Onyx,
    /// Wildcard
    Gold,
}

/// The colored kinds, in canonical order.
pub const COLORED: [GemKind; 5] = [
    GemKind::Diamond,
    GemKind::Sapphire,
    GemKind::Emerald,
    GemKind::Ruby,
    GemKind::Onyx,
];

/// Every kind, colored kinds first, wildcard last.
pub const ALL_KINDS: [GemKind; 6] = [
    GemKind::Diamond,
    GemKind::Sapphire,
    GemKind::Emerald,
    GemKind::Ruby,
    GemKind::Onyx,
    GemKind::Gold,
];

impl GemKind {
    pub fn is_colored(self) -> bool {
        self != GemKind::Gold
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GemKind::Diamond => "diamond",
            GemKind::Sapphire => "sapphire",
            GemKind::Emerald => "emerald",
            GemKind::Ruby => "ruby",
            GemKind::Onyx => "onyx",
            GemKind::Gold => "gold",
        }
    }

    fn index(self) -> usize {
        match self {
            GemKind::Diamond => 0,
            GemKind::Sapphire => 1,
            GemKind::Emerald => 2,
            GemKind::Ruby => 3,
            GemKind::Onyx => 4,
            GemKind::Gold => 5,
        }
    }
}

impl fmt::Display for GemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_KINDS
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown gem kind `{s}`"))
    }
}

/// Non-negative gem counts indexed by [`GemKind`].
///
/// Used for the bank, player holdings, permanent bonuses, card costs and
/// noble requirements. Serializes as a map of kind name to count; absent
/// kinds read back as zero.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct GemSet {
    pub diamond: u32,
    pub sapphire: u32,
    pub emerald: u32,
    pub ruby: u32,
    pub onyx: u32,
    pub gold: u32,
}

impl GemSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from `(kind, count)` pairs; repeated kinds accumulate.
    pub fn from_counts<I>(counts: I) -> Self
    where
        I: IntoIterator<Item = (GemKind, u32)>,
    {
        let mut set = Self::default();
        for (kind, count) in counts {
            set.add(kind, count);
        }
        set
    }

    /// The same count for every colored kind, with a separate wildcard count.
    pub fn uniform(colored: u32, gold: u32) -> Self {
        Self {
            diamond: colored,
            sapphire: colored,
            emerald: colored,
            ruby: colored,
            onyx: colored,
            gold,
        }
    }

    pub fn get(&self, kind: GemKind) -> u32 {
        self.as_array()[kind.index()]
    }

    pub fn set(&mut self, kind: GemKind, count: u32) {
        *self.slot_mut(kind) = count;
    }

    pub fn add(&mut self, kind: GemKind, count: u32) {
        let slot = self.slot_mut(kind);
        *slot = slot.saturating_add(count);
    }

    /// Removes `count` of `kind`, refusing to go below zero.
    pub fn remove(&mut self, kind: GemKind, count: u32) -> Result<(), u32> {
        let slot = self.slot_mut(kind);
        match slot.checked_sub(count) {
            Some(left) => {
                *slot = left;
                Ok(())
            }
            None => Err(*slot),
        }
    }

    /// Adds every count of `other` into `self`.
    pub fn deposit(&mut self, other: &GemSet) {
        for kind in ALL_KINDS {
            self.add(kind, other.get(kind));
        }
    }

    /// Removes every count of `other` from `self`, all or nothing.
    ///
    /// On failure returns the first kind that would have gone negative and
    /// leaves `self` untouched.
    pub fn withdraw(&mut self, other: &GemSet) -> Result<(), GemKind> {
        if let Some(kind) = ALL_KINDS
            .iter()
            .copied()
            .find(|&kind| self.get(kind) < other.get(kind))
        {
            return Err(kind);
        }
        for kind in ALL_KINDS {
            *self.slot_mut(kind) -= other.get(kind);
        }
        Ok(())
    }

    pub fn total(&self) -> u32 {
        self.as_array().iter().sum()
    }

    pub fn colored_total(&self) -> u32 {
        COLORED.iter().map(|&kind| self.get(kind)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Kinds with a non-zero count, in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (GemKind, u32)> + '_ {
        ALL_KINDS
            .iter()
            .copied()
            .map(move |kind| (kind, self.get(kind)))
            .filter(|&(_, count)| count > 0)
    }

    fn as_array(&self) -> [u32; 6] {
        [
            self.diamond,
            self.sapphire,
            self.emerald,
            self.ruby,
            self.onyx,
            self.gold,
        ]
    }

    fn slot_mut(&mut self, kind: GemKind) -> &mut u32 {
        match kind {
            GemKind::Diamond => &mut self.diamond,
            GemKind::Sapphire => &mut self.sapphire,
            GemKind::Emerald => &mut self.emerald,
            GemKind::Ruby => &mut self.ruby,
            GemKind::Onyx => &mut self.onyx,
            GemKind::Gold => &mut self.gold,
        }
    }
}

impl FromIterator<(GemKind, u32)> for GemSet {
    fn from_iter<I: IntoIterator<Item = (GemKind, u32)>>(iter: I) -> Self {
        Self::from_counts(iter)
    }
}
