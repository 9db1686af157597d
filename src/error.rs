//! Error types for geoloot

use thiserror::Error;

/// Main error type for loot engine operations
#[derive(Error, Debug)]
pub enum LootError {
    #[error("Item catalog is empty")]
    EmptyCatalog,

    #[error("Tier weights must sum to 100, got {total}")]
    InvalidWeights { total: u32 },

    #[error("Item catalog has no common-rarity item")]
    MissingCommonItems,

    #[error("Invalid radius: {0}")]
    InvalidRadius(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Location provider error: {0}")]
    Provider(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LootError {
    /// Whether this error is a configuration problem that should abort startup
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            LootError::EmptyCatalog
                | LootError::InvalidWeights { .. }
                | LootError::MissingCommonItems
                | LootError::InvalidRadius(_)
                | LootError::InvalidConfig(_)
                | LootError::Json(_)
        )
    }
}

/// Result type alias for loot engine operations
pub type Result<T> = std::result::Result<T, LootError>;
