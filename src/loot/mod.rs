//! Loot model and generation
//!
//! Boxes are created uncollected by the spawn path and change exactly once,
//! when the collection protocol marks them collected.

pub mod catalog;
pub mod generator;
pub mod sampler;
pub mod tier;

pub use catalog::default_catalog;
pub use generator::LootGenerator;
pub use sampler::WeightedSampler;
pub use tier::{Item, ItemCategory, LootTier};

use crate::geo::{self, Position};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a loot box document
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BoxId(String);

impl BoxId {
    /// A fresh random id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BoxId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for BoxId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for BoxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable identifier of a player
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A location-anchored collectible
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LootBox {
    pub id: BoxId,
    pub latitude: f64,
    pub longitude: f64,
    pub tier: LootTier,
    pub contents: Vec<Item>,
    pub collected: bool,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub collected_by: Option<UserId>,
    pub collected_at: Option<DateTime<Utc>>,
}

impl LootBox {
    /// Where the box sits, stamped with its creation time
    pub fn position(&self) -> Position {
        Position::new(self.latitude, self.longitude).at(self.created_at)
    }

    /// Distance from a position in meters
    pub fn distance_from(&self, position: &Position) -> f64 {
        geo::distance(&self.position(), position)
    }

    /// Short marker caption, e.g. `"Rare Loot Box (3 items)"`
    pub fn describe(&self) -> String {
        format!(
            "{} Loot Box ({} items)",
            self.tier.label(),
            self.contents.len()
        )
    }

    /// Sum of item values
    pub fn total_value(&self) -> u64 {
        self.contents.iter().map(|i| u64::from(i.value)).sum()
    }

    /// The collected form of this box. Coordinates and contents are untouched.
    pub fn into_collected(self, by: UserId, at: DateTime<Utc>) -> Self {
        Self {
            collected: true,
            collected_by: Some(by),
            collected_at: Some(at),
            ..self
        }
    }
}
