//! geoloot - Location-driven loot spawning and collection
//!
//! # Features
//! - Movement tracking with a distance-based spawn trigger
//! - Weighted tier sampling and randomized loot bundles
//! - Exactly-once collection through store transactions
//! - Idempotent inventory merges with pending-merge recovery
//! - Real-time sync of nearby boxes over store subscriptions
//! - Async runtime abstraction (Tokio or executor-free mock)
//!
//! # Quick Start
//!
//! ```ignore
//! use geoloot::{AnonymousIdentity, LootConfig, LootSession, ManualLocationProvider, MemoryStore, TokioSpawner};
//! use std::sync::Arc;
//!
//! let location = Arc::new(ManualLocationProvider::new());
//! let session = LootSession::new(
//!     LootConfig::default(),
//!     Arc::new(MemoryStore::new()),
//!     TokioSpawner::new(),
//!     &AnonymousIdentity::new(),
//!     location.clone(),
//! )?;
//! let streams = session.start().await?;
//! tokio::spawn(streams.changes.run(session.change_listener()));
//! session.drive(streams.location).await;
//! ```
//!
//! # Feature Flags
//!
//! - `runtime-tokio`: Enable the Tokio spawner

// Core modules
pub mod collection;
pub mod geo;
pub mod loot;
pub mod movement;
pub mod proximity;
pub mod store;
pub mod sync;

// Host seams
pub mod identity;
pub mod location;
pub mod runtime;

// Support modules
pub mod config;
pub mod inventory;
pub mod metrics;
pub mod session;

// Error types
mod error;
pub use error::{LootError, Result};

// Re-export geometry
pub use geo::{distance, offset, Position};

// Re-export loot model
pub use loot::{
    default_catalog, BoxId, Item, ItemCategory, LootBox, LootGenerator, LootTier, UserId,
    WeightedSampler,
};

// Re-export engine components
pub use collection::{CollectOutcome, CollectedLoot, CollectionCoordinator, RetryPolicy};
pub use config::LootConfig;
pub use inventory::{InventoryItem, MergeOutcome, UserInventory};
pub use metrics::{LootMetrics, LootMetricsHandle};
pub use movement::{MovementEvent, MovementState, MovementTracker, TrackerState};
pub use proximity::{ActiveDelta, ProximityIndex, ProximityTick};
pub use session::{ClickOutcome, LootSession, PositionReport, SessionStreams};

// Re-export store types
pub use store::{
    ChangeEvent, ChangeKind, ChangeStream, InventoryStore, LootBoxFilter, LootBoxStore,
    LootStore, MemoryStore, SortOrder, StoreError, StoreResult,
};
pub use sync::{ChangeListener, Observable, SubscriptionHandle, SyncChannel};

// Re-export seams
pub use identity::{AnonymousIdentity, FixedIdentity, IdentityProvider};
pub use location::{LocationProvider, LocationStream, LocationUpdate, ManualLocationProvider};
pub use runtime::mock::MockSpawner;
#[cfg(feature = "runtime-tokio")]
pub use runtime::tokio_impl::TokioSpawner;
pub use runtime::{AsyncSpawner, JoinHandle};

// Version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_config_is_valid() {
        LootConfig::default().validate().unwrap();
    }
}
