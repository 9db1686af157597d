//! Engine configuration
//!
//! Every tunable lives in [`LootConfig`]. Defaults reproduce the standard game
//! rules; overrides can be supplied as JSON, with omitted fields keeping their
//! defaults. [`LootConfig::validate`] is the startup gate: a configuration
//! that fails it must not be used to build an engine.

use crate::collection::RetryPolicy;
use crate::error::{LootError, Result};
use crate::loot::{default_catalog, Item, LootTier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Movement required before a new box may spawn
pub const SPAWN_THRESHOLD_M: f64 = 100.0;

/// Closest a box may spawn to its origin
pub const SPAWN_MIN_RADIUS_M: f64 = 10.0;

/// Farthest a box may spawn from its origin
pub const SPAWN_MAX_RADIUS_M: f64 = 50.0;

/// Distance within which a box can be collected
pub const COLLECTION_RADIUS_M: f64 = 20.0;

/// Radius of the neighbourhood tracked for nearby boxes
pub const QUERY_RADIUS_M: f64 = 1000.0;

/// Maximum number of boxes fetched by a nearby query
pub const NEARBY_BATCH_LIMIT: usize = 50;

/// Samples whose accuracy radius reaches this are ignored
pub const MAX_ACCURACY_M: f64 = 100.0;

/// Tunables for the whole loot engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LootConfig {
    pub spawn_threshold_m: f64,
    pub spawn_min_radius_m: f64,
    pub spawn_max_radius_m: f64,
    pub collection_radius_m: f64,
    pub query_radius_m: f64,
    pub nearby_batch_limit: usize,
    pub max_accuracy_m: f64,
    /// Spawn weight per tier; missing tiers weigh zero
    pub tier_weights: BTreeMap<LootTier, u32>,
    pub retry: RetryPolicy,
    pub catalog: Vec<Item>,
}

impl Default for LootConfig {
    fn default() -> Self {
        Self {
            spawn_threshold_m: SPAWN_THRESHOLD_M,
            spawn_min_radius_m: SPAWN_MIN_RADIUS_M,
            spawn_max_radius_m: SPAWN_MAX_RADIUS_M,
            collection_radius_m: COLLECTION_RADIUS_M,
            query_radius_m: QUERY_RADIUS_M,
            nearby_batch_limit: NEARBY_BATCH_LIMIT,
            max_accuracy_m: MAX_ACCURACY_M,
            tier_weights: LootTier::ALL
                .iter()
                .map(|t| (*t, t.default_weight()))
                .collect(),
            retry: RetryPolicy::default(),
            catalog: default_catalog(),
        }
    }
}

impl LootConfig {
    /// Parse a JSON document of overrides on top of the defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: LootConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Replace the item catalog
    pub fn with_catalog(mut self, catalog: Vec<Item>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Replace the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Weight of a tier, zero when absent
    pub fn weight_of(&self, tier: LootTier) -> u32 {
        self.tier_weights.get(&tier).copied().unwrap_or(0)
    }

    /// Tier weights in increasing rarity order
    pub fn weight_table(&self) -> Vec<(LootTier, u32)> {
        LootTier::ALL.iter().map(|t| (*t, self.weight_of(*t))).collect()
    }

    /// Check the startup invariants
    pub fn validate(&self) -> Result<()> {
        if self.catalog.is_empty() {
            return Err(LootError::EmptyCatalog);
        }
        if !self.catalog.iter().any(|i| i.rarity == LootTier::Common) {
            return Err(LootError::MissingCommonItems);
        }

        let total = self
            .tier_weights
            .values()
            .try_fold(0u32, |acc, w| acc.checked_add(*w))
            .ok_or_else(|| LootError::InvalidConfig("tier weights overflow".into()))?;
        if total != 100 {
            return Err(LootError::InvalidWeights { total });
        }

        if !(self.spawn_min_radius_m >= 0.0 && self.spawn_max_radius_m >= self.spawn_min_radius_m)
        {
            return Err(LootError::InvalidRadius(format!(
                "spawn radius range {}..={} is empty",
                self.spawn_min_radius_m, self.spawn_max_radius_m
            )));
        }
        if !(self.collection_radius_m > 0.0) {
            return Err(LootError::InvalidRadius(format!(
                "collection radius {} must be positive",
                self.collection_radius_m
            )));
        }
        if !(self.query_radius_m >= self.collection_radius_m) {
            return Err(LootError::InvalidRadius(format!(
                "query radius {} is smaller than collection radius {}",
                self.query_radius_m, self.collection_radius_m
            )));
        }

        if !(self.spawn_threshold_m > 0.0) {
            return Err(LootError::InvalidConfig(
                "spawn threshold must be positive".into(),
            ));
        }
        if self.nearby_batch_limit == 0 {
            return Err(LootError::InvalidConfig(
                "nearby batch limit must be at least 1".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(LootError::InvalidConfig(
                "retry policy needs at least one attempt".into(),
            ));
        }

        Ok(())
    }
}
