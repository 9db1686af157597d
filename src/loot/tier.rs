//! Rarity tiers and catalog item definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Rarity classification of a loot box, ordered from most to least common
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LootTier {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl LootTier {
    /// All tiers in increasing rarity order
    pub const ALL: [LootTier; 5] = [
        LootTier::Common,
        LootTier::Uncommon,
        LootTier::Rare,
        LootTier::Epic,
        LootTier::Legendary,
    ];

    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            LootTier::Common => "Common",
            LootTier::Uncommon => "Uncommon",
            LootTier::Rare => "Rare",
            LootTier::Epic => "Epic",
            LootTier::Legendary => "Legendary",
        }
    }

    /// Marker color as a hex string
    pub fn color(&self) -> &'static str {
        match self {
            LootTier::Common => "#95a5a6",
            LootTier::Uncommon => "#2ecc71",
            LootTier::Rare => "#3498db",
            LootTier::Epic => "#9b59b6",
            LootTier::Legendary => "#f39c12",
        }
    }

    /// Default spawn weight out of 100
    pub fn default_weight(&self) -> u32 {
        match self {
            LootTier::Common => 50,
            LootTier::Uncommon => 30,
            LootTier::Rare => 15,
            LootTier::Epic => 4,
            LootTier::Legendary => 1,
        }
    }

    /// Inclusive range of items a box of this tier holds
    pub fn bundle_range(&self) -> RangeInclusive<usize> {
        match self {
            LootTier::Common => 1..=2,
            LootTier::Uncommon => 1..=3,
            LootTier::Rare => 2..=4,
            LootTier::Epic => 2..=5,
            LootTier::Legendary => 3..=6,
        }
    }
}

impl fmt::Display for LootTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What kind of thing an item is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemCategory {
    Consumable,
    Equipment,
    Currency,
    Collectible,
}

impl ItemCategory {
    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            ItemCategory::Consumable => "Consumable",
            ItemCategory::Equipment => "Equipment",
            ItemCategory::Currency => "Currency",
            ItemCategory::Collectible => "Collectible",
        }
    }
}

/// Immutable catalog entry. Two items are the same item when their ids match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub category: ItemCategory,
    /// Lowest box tier that may contain this item
    pub rarity: LootTier,
    pub value: u32,
    pub description: String,
}

impl Item {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: ItemCategory,
        rarity: LootTier,
        value: u32,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            rarity,
            value,
            description: description.into(),
        }
    }
}
