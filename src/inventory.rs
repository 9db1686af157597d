//! Per-user inventories
//!
//! An inventory only grows: collected contents are merged in by quantity.
//! Each merge is keyed by the collected box id, which makes re-applying the
//! same collection a no-op.

use crate::geo;
use crate::loot::{BoxId, Item, LootBox, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A stack of one catalog item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub item: Item,
    pub quantity: u32,
    pub first_acquired_at: DateTime<Utc>,
}

/// Everything a user has collected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInventory {
    pub user_id: UserId,
    pub items: Vec<InventoryItem>,
    pub total_boxes_collected: u32,
    /// Best-effort mirror of distance walked across sessions
    pub total_distance_traveled: f64,
    pub last_updated: Option<DateTime<Utc>>,
    /// Boxes whose contents have already been merged
    #[serde(default)]
    pub applied_boxes: BTreeSet<BoxId>,
}

/// Result of merging one collection into an inventory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Applied,
    AlreadyApplied,
}

impl UserInventory {
    /// An empty inventory
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            items: Vec::new(),
            total_boxes_collected: 0,
            total_distance_traveled: 0.0,
            last_updated: None,
            applied_boxes: BTreeSet::new(),
        }
    }

    /// Quantity held of an item id
    pub fn quantity_of(&self, item_id: &str) -> u32 {
        self.items
            .iter()
            .find(|line| line.item.id == item_id)
            .map(|line| line.quantity)
            .unwrap_or(0)
    }

    /// Sum of all quantities
    pub fn total_items(&self) -> u32 {
        self.items.iter().map(|line| line.quantity).sum()
    }

    /// Whether a box's contents are already in this inventory
    pub fn has_applied(&self, box_id: &BoxId) -> bool {
        self.applied_boxes.contains(box_id)
    }

    /// Merge a collected box's contents
    ///
    /// Each item bumps the quantity of its existing line or appends a new
    /// line with quantity one. A box that was already merged is skipped.
    pub fn merge_box(&mut self, loot_box: &LootBox, now: DateTime<Utc>) -> MergeOutcome {
        if !self.applied_boxes.insert(loot_box.id.clone()) {
            return MergeOutcome::AlreadyApplied;
        }

        for item in &loot_box.contents {
            match self.items.iter_mut().find(|line| line.item.id == item.id) {
                Some(line) => line.quantity += 1,
                None => self.items.push(InventoryItem {
                    item: item.clone(),
                    quantity: 1,
                    first_acquired_at: now,
                }),
            }
        }

        self.total_boxes_collected += 1;
        self.last_updated = Some(now);
        MergeOutcome::Applied
    }

    /// Add walked distance to the running total
    pub fn add_distance(&mut self, meters: f64, now: DateTime<Utc>) {
        if meters > 0.0 {
            self.total_distance_traveled += meters;
            self.last_updated = Some(now);
        }
    }

    /// One-line stats, e.g. `"Items: 4 | Boxes: 2 | Distance: 350m"`
    pub fn summary(&self) -> String {
        format!(
            "Items: {} | Boxes: {} | Distance: {}",
            self.items.len(),
            self.total_boxes_collected,
            geo::format_distance(self.total_distance_traveled)
        )
    }
}
