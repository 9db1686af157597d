//! The collect protocol
//!
//! A collect is two steps. The claim is a single store transaction that
//! flips `collected` exactly once; it is what settles races between devices
//! and is never retried blindly, since a retry after an ambiguous failure
//! could misreport who won. The merge then credits the contents to the
//! winner's inventory and is retried with backoff. Merges are idempotent per
//! box because the inventory records every box it has absorbed, so a merge
//! abandoned here is finished later by [`CollectionCoordinator::recover_pending_merges`].

mod retry;

pub use retry::{with_retry, RetryPolicy};

use crate::error::Result;
use crate::inventory::{MergeOutcome, UserInventory};
use crate::loot::{BoxId, Item, LootBox, UserId};
use crate::metrics::LootMetricsHandle;
use crate::runtime::AsyncSpawner;
use crate::store::{LootBoxFilter, LootStore, Mutation, SortOrder, StoreResult, Transacted};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;

/// Items handed to the winner of a claim
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedLoot {
    pub box_id: BoxId,
    pub items: Vec<Item>,
    /// Whether the items reached the inventory; `false` leaves a pending merge
    pub merged: bool,
}

/// Result of one collect attempt
#[derive(Debug, Clone, PartialEq)]
pub enum CollectOutcome {
    Collected(CollectedLoot),
    /// Someone else (or an earlier attempt) already claimed the box
    AlreadyCollected,
    /// The box does not exist; usually a stale map marker
    NotFound,
}

impl CollectOutcome {
    pub fn is_collected(&self) -> bool {
        matches!(self, CollectOutcome::Collected(_))
    }
}

/// Runs claims and inventory merges against the store
pub struct CollectionCoordinator<S, P> {
    store: Arc<S>,
    spawner: P,
    retry: RetryPolicy,
    metrics: LootMetricsHandle,
}

impl<S, P: Clone> Clone for CollectionCoordinator<S, P> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            spawner: self.spawner.clone(),
            retry: self.retry,
            metrics: self.metrics.clone(),
        }
    }
}

impl<S, P> CollectionCoordinator<S, P>
where
    S: LootStore + 'static,
    P: AsyncSpawner,
{
    pub fn new(store: Arc<S>, spawner: P, retry: RetryPolicy) -> Self {
        Self::with_metrics(store, spawner, retry, LootMetricsHandle::new())
    }

    pub fn with_metrics(
        store: Arc<S>,
        spawner: P,
        retry: RetryPolicy,
        metrics: LootMetricsHandle,
    ) -> Self {
        Self {
            store,
            spawner,
            retry,
            metrics,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn spawner(&self) -> &P {
        &self.spawner
    }

    pub fn metrics(&self) -> &LootMetricsHandle {
        &self.metrics
    }

    /// Claim `box_id` for `user` and credit its contents
    ///
    /// Losing the race and missing boxes are outcomes, not errors. An error
    /// means the claim transaction itself failed and nothing was written.
    pub async fn attempt_collect(&self, box_id: &BoxId, user: &UserId) -> Result<CollectOutcome> {
        let started = Instant::now();
        let claimed_at = Utc::now();
        let claim = |current: &LootBox| {
            if current.collected {
                Mutation::Keep
            } else {
                Mutation::Replace(current.clone().into_collected(user.clone(), claimed_at))
            }
        };

        let loot_box = match self.store.transact_loot_box(box_id, &claim).await? {
            Transacted::Missing => {
                log::debug!("Box {} not found", box_id);
                self.metrics.record_not_found();
                return Ok(CollectOutcome::NotFound);
            }
            Transacted::Unchanged(existing) => {
                log::debug!(
                    "Box {} already collected by {:?}",
                    box_id,
                    existing.collected_by.as_ref().map(UserId::as_str)
                );
                self.metrics.record_conflict();
                return Ok(CollectOutcome::AlreadyCollected);
            }
            Transacted::Written(claimed) => claimed,
        };

        let merged = match self.merge_contents(user, &loot_box).await {
            Ok(_) => true,
            Err(e) => {
                log::error!(
                    "Merge of box {} for {} abandoned, left pending: {}",
                    box_id,
                    user,
                    e
                );
                self.metrics.record_pending_merge();
                false
            }
        };

        self.metrics.record_collection(started.elapsed());
        log::info!(
            "{} collected {} ({})",
            user,
            loot_box.describe(),
            loot_box.id
        );

        Ok(CollectOutcome::Collected(CollectedLoot {
            box_id: loot_box.id,
            items: loot_box.contents,
            merged,
        }))
    }

    /// Credit a claimed box to `user`'s inventory, retrying transient failures
    ///
    /// Safe to repeat: a box already in the inventory is skipped.
    pub async fn merge_contents(&self, user: &UserId, loot_box: &LootBox) -> StoreResult<MergeOutcome> {
        let now = Utc::now();
        let merge = |mut inventory: UserInventory| match inventory.merge_box(loot_box, now) {
            MergeOutcome::Applied => Mutation::Replace(inventory),
            MergeOutcome::AlreadyApplied => Mutation::Keep,
        };
        let store = &self.store;
        let merge_ref = &merge;

        let written = with_retry(
            &self.spawner,
            &self.retry,
            "inventory merge",
            move || store.transact_inventory(user, merge_ref),
            || self.metrics.record_merge_retry(),
        )
        .await?;

        Ok(match written {
            Transacted::Written(_) => MergeOutcome::Applied,
            Transacted::Unchanged(_) | Transacted::Missing => MergeOutcome::AlreadyApplied,
        })
    }

    /// Merge every box `user` has claimed but never credited
    ///
    /// Returns how many boxes were merged now.
    pub async fn recover_pending_merges(&self, user: &UserId) -> Result<usize> {
        let inventory = self.load_inventory(user).await?;

        let store = &self.store;
        let filter = LootBoxFilter::collected_by(user.clone());
        let filter_ref = &filter;
        let claimed = with_retry(
            &self.spawner,
            &self.retry,
            "claimed box query",
            move || store.query_loot_boxes(filter_ref, SortOrder::OldestFirst, usize::MAX),
            || {},
        )
        .await?;

        let mut recovered = 0;
        for loot_box in claimed.iter().filter(|b| !inventory.has_applied(&b.id)) {
            if self.merge_contents(user, loot_box).await? == MergeOutcome::Applied {
                log::info!("Recovered pending merge of box {} for {}", loot_box.id, user);
                recovered += 1;
            }
        }
        Ok(recovered)
    }

    /// Read `user`'s inventory, or an empty one if none exists yet
    pub async fn load_inventory(&self, user: &UserId) -> Result<UserInventory> {
        let store = &self.store;
        let existing = with_retry(
            &self.spawner,
            &self.retry,
            "inventory read",
            move || store.get_inventory(user),
            || {},
        )
        .await?;

        Ok(existing.unwrap_or_else(|| UserInventory::new(user.clone())))
    }

    /// Add walked distance to the persisted inventory total
    pub async fn mirror_distance(&self, user: &UserId, meters: f64) -> Result<()> {
        if meters <= 0.0 {
            return Ok(());
        }

        let now = Utc::now();
        let add = |mut inventory: UserInventory| {
            inventory.add_distance(meters, now);
            Mutation::Replace(inventory)
        };
        let store = &self.store;
        let add_ref = &add;

        with_retry(
            &self.spawner,
            &self.retry,
            "distance mirror",
            move || store.transact_inventory(user, add_ref),
            || {},
        )
        .await?;

        log::debug!("Mirrored {:.1}m for {}", meters, user);
        Ok(())
    }
}
