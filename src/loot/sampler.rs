//! Weighted categorical sampling over a cumulative-threshold table

use crate::error::{LootError, Result};
use rand::Rng;

/// Picks entries with probability proportional to integer weights
///
/// A draw is a uniform integer in `[1, total]`; the table is walked in order,
/// accumulating weights, and the first entry whose cumulative weight reaches
/// the draw is returned.
#[derive(Debug, Clone)]
pub struct WeightedSampler<T> {
    entries: Vec<(T, u32)>,
    total: u32,
}

impl<T: Clone> WeightedSampler<T> {
    /// Build a sampler from `(value, weight)` pairs, walked in the given order
    pub fn new(entries: Vec<(T, u32)>) -> Result<Self> {
        let total = entries
            .iter()
            .try_fold(0u32, |acc, (_, w)| acc.checked_add(*w))
            .ok_or_else(|| LootError::InvalidConfig("weight table overflows u32".into()))?;

        if entries.is_empty() || total == 0 {
            return Err(LootError::InvalidWeights { total });
        }

        Ok(Self { entries, total })
    }

    /// Sum of all weights
    pub fn total_weight(&self) -> u32 {
        self.total
    }

    /// Entries and their weights, in walk order
    pub fn entries(&self) -> &[(T, u32)] {
        &self.entries
    }

    /// Draw one entry
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> T {
        let draw = rng.gen_range(1..=self.total);
        self.pick(draw)
    }

    /// Resolve a draw in `[1, total]` to its entry
    ///
    /// Draws past the table fall back to the first entry.
    pub fn pick(&self, draw: u32) -> T {
        let mut cumulative = 0;
        for (value, weight) in &self.entries {
            cumulative += weight;
            if draw <= cumulative {
                return value.clone();
            }
        }
        self.entries[0].0.clone()
    }
}
