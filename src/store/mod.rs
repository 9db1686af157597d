//! Persistent document store abstraction
//!
//! The engine never talks to a concrete database. It needs two document
//! collections (loot boxes keyed by id, inventories keyed by user) with:
//! creation, transactional read-modify-write, filtered queries, and change
//! subscriptions with at-least-once delivery.
//!
//! The collect race is settled entirely by [`LootBoxStore::transact_loot_box`]:
//! implementations must serialize concurrent transactions on the same
//! document, so that each mutator sees the result of every earlier commit.

pub mod memory;

pub use memory::MemoryStore;

use crate::geo::{self, Position};
use crate::inventory::UserInventory;
use crate::loot::{BoxId, LootBox, UserId};
use futures::stream::BoxStream;
use thiserror::Error;

/// Error type for store operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Network trouble or timeout; the operation may be retried
    #[error("Transient store failure: {0}")]
    Transient(String),

    #[error("Store rejected operation: {0}")]
    Rejected(String),

    #[error("Subscription closed")]
    SubscriptionClosed,
}

impl StoreError {
    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Decision returned by a transaction body
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation<T> {
    /// Commit nothing
    Keep,
    /// Replace the document
    Replace(T),
}

/// What a transaction did
#[derive(Debug, Clone, PartialEq)]
pub enum Transacted<T> {
    /// No document with that key
    Missing,
    /// The body chose [`Mutation::Keep`]; carries the document as read
    Unchanged(T),
    /// The body's replacement was committed
    Written(T),
}

/// Transaction body over a loot box
pub type LootBoxMutator<'a> = &'a (dyn Fn(&LootBox) -> Mutation<LootBox> + Send + Sync);

/// Transaction body over an inventory; receives a fresh inventory when the
/// user has none yet
pub type InventoryMutator<'a> =
    &'a (dyn Fn(UserInventory) -> Mutation<UserInventory> + Send + Sync);

/// Kind of change delivered by a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The document entered the subscription's filter
    Added,
    /// The document changed and still matches
    Modified,
    /// The document left the filter (carries its latest state)
    Removed,
}

/// One change delivered by a subscription
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub loot_box: LootBox,
}

impl ChangeEvent {
    pub fn added(loot_box: LootBox) -> Self {
        Self {
            kind: ChangeKind::Added,
            loot_box,
        }
    }

    pub fn modified(loot_box: LootBox) -> Self {
        Self {
            kind: ChangeKind::Modified,
            loot_box,
        }
    }

    pub fn removed(loot_box: LootBox) -> Self {
        Self {
            kind: ChangeKind::Removed,
            loot_box,
        }
    }
}

/// Stream of changes from a subscription
pub type ChangeStream = BoxStream<'static, ChangeEvent>;

/// Ordering of query results by creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Predicate over loot boxes; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LootBoxFilter {
    pub collected: Option<bool>,
    pub collected_by: Option<UserId>,
    /// Center and radius in meters
    pub near: Option<(Position, f64)>,
}

impl LootBoxFilter {
    /// Boxes still waiting to be collected
    pub fn uncollected() -> Self {
        Self {
            collected: Some(false),
            ..Default::default()
        }
    }

    /// Boxes collected by `user`
    pub fn collected_by(user: UserId) -> Self {
        Self {
            collected: Some(true),
            collected_by: Some(user),
            ..Default::default()
        }
    }

    /// Restrict to boxes within `radius_m` of `center`
    pub fn near(mut self, center: Position, radius_m: f64) -> Self {
        self.near = Some((center, radius_m));
        self
    }

    pub fn matches(&self, loot_box: &LootBox) -> bool {
        if let Some(collected) = self.collected {
            if loot_box.collected != collected {
                return false;
            }
        }
        if let Some(user) = &self.collected_by {
            if loot_box.collected_by.as_ref() != Some(user) {
                return false;
            }
        }
        if let Some((center, radius)) = &self.near {
            if geo::distance(center, &loot_box.position()) > *radius {
                return false;
            }
        }
        true
    }
}

/// The loot box collection
#[async_trait::async_trait]
pub trait LootBoxStore: Send + Sync {
    /// Persist a new box under its id; fails with `Rejected` if the id exists
    async fn create_loot_box(&self, loot_box: LootBox) -> StoreResult<BoxId>;

    /// Read one box
    async fn get_loot_box(&self, id: &BoxId) -> StoreResult<Option<LootBox>>;

    /// Atomically read a box, let `mutator` decide, and commit its decision
    ///
    /// Concurrent transactions on the same id are serialized.
    async fn transact_loot_box(
        &self,
        id: &BoxId,
        mutator: LootBoxMutator<'_>,
    ) -> StoreResult<Transacted<LootBox>>;

    /// Boxes matching `filter`, sorted by creation time, at most `limit`
    async fn query_loot_boxes(
        &self,
        filter: &LootBoxFilter,
        order: SortOrder,
        limit: usize,
    ) -> StoreResult<Vec<LootBox>>;

    /// Live changes for boxes matching `filter`, starting with an `Added`
    /// event for every box that matches now
    async fn subscribe_loot_boxes(&self, filter: LootBoxFilter) -> StoreResult<ChangeStream>;
}

/// The per-user inventory collection
#[async_trait::async_trait]
pub trait InventoryStore: Send + Sync {
    async fn get_inventory(&self, user: &UserId) -> StoreResult<Option<UserInventory>>;

    /// Atomically read-modify-write a user's inventory, creating it on first
    /// write
    async fn transact_inventory(
        &self,
        user: &UserId,
        mutator: InventoryMutator<'_>,
    ) -> StoreResult<Transacted<UserInventory>>;
}

/// A store holding both collections
pub trait LootStore: LootBoxStore + InventoryStore {}

impl<T: LootBoxStore + InventoryStore> LootStore for T {}
