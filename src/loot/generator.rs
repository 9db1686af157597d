//! Randomized loot box generation
//!
//! Decides what a box contains and where it lands. Generation is pure apart
//! from the random source and the creation timestamp; persisting the box is
//! the caller's job.

use super::sampler::WeightedSampler;
use super::tier::{Item, LootTier};
use super::{BoxId, LootBox, UserId};
use crate::config::LootConfig;
use crate::error::Result;
use crate::geo::{self, Position};
use chrono::Utc;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::TAU;

/// Produces loot boxes from a validated configuration
///
/// The random source sits behind a mutex so one generator can be shared
/// between tasks.
pub struct LootGenerator<R = StdRng> {
    tiers: WeightedSampler<LootTier>,
    catalog: Vec<Item>,
    min_radius_m: f64,
    max_radius_m: f64,
    rng: Mutex<R>,
}

impl LootGenerator<StdRng> {
    /// Create a generator seeded from OS entropy
    pub fn new(config: &LootConfig) -> Result<Self> {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Create a deterministic generator
    pub fn seeded(config: &LootConfig, seed: u64) -> Result<Self> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng + Send> LootGenerator<R> {
    /// Create a generator over a caller-provided random source
    ///
    /// Fails if the configuration does not pass [`LootConfig::validate`].
    pub fn with_rng(config: &LootConfig, rng: R) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            tiers: WeightedSampler::new(config.weight_table())?,
            catalog: config.catalog.clone(),
            min_radius_m: config.spawn_min_radius_m,
            max_radius_m: config.spawn_max_radius_m,
            rng: Mutex::new(rng),
        })
    }

    /// The item catalog boxes are filled from
    pub fn catalog(&self) -> &[Item] {
        &self.catalog
    }

    /// Draw a tier according to the configured weights
    pub fn select_tier(&self) -> LootTier {
        let mut rng = self.rng.lock();
        self.tiers.sample(&mut *rng)
    }

    /// Draw how many items a box of `tier` holds
    pub fn bundle_size(&self, tier: LootTier) -> usize {
        self.rng.lock().gen_range(tier.bundle_range())
    }

    /// Draw `count` items a box of `tier` may hold, with replacement
    ///
    /// Repeats are expected; inventories stack them by quantity.
    pub fn select_items(&self, tier: LootTier, count: usize) -> Vec<Item> {
        let pool: Vec<&Item> = self.catalog.iter().filter(|i| i.rarity <= tier).collect();
        if pool.is_empty() {
            return Vec::new();
        }

        let mut rng = self.rng.lock();
        (0..count)
            .map(|_| pool[rng.gen_range(0..pool.len())].clone())
            .collect()
    }

    /// Pick a point between `min_radius_m` and `max_radius_m` from `origin`
    ///
    /// The radius is uniform along the ring width rather than over its area,
    /// so points sit further out on average than disk sampling would give.
    pub fn spawn_location(&self, origin: &Position, min_radius_m: f64, max_radius_m: f64) -> Position {
        let (bearing, radius) = {
            let mut rng = self.rng.lock();
            (
                rng.gen_range(0.0..TAU),
                rng.gen_range(min_radius_m..=max_radius_m),
            )
        };
        geo::offset(origin, bearing, radius)
    }

    /// Pick a spawn point using the configured radii
    pub fn spawn_point(&self, origin: &Position) -> Position {
        self.spawn_location(origin, self.min_radius_m, self.max_radius_m)
    }

    /// Build a new uncollected box near `origin`
    pub fn generate(&self, origin: &Position, user_id: &UserId) -> LootBox {
        let tier = self.select_tier();
        let count = self.bundle_size(tier);
        let contents = self.select_items(tier, count);
        let location = self.spawn_point(origin);

        log::debug!(
            "Generated {} box with {} items at {}",
            tier,
            contents.len(),
            geo::format_coordinates(&location)
        );

        LootBox {
            id: BoxId::generate(),
            latitude: location.latitude,
            longitude: location.longitude,
            tier,
            contents,
            collected: false,
            created_by: user_id.clone(),
            created_at: Utc::now(),
            collected_by: None,
            collected_at: None,
        }
    }
}
