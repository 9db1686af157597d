//! Player identity seam

use crate::error::Result;
use crate::loot::UserId;
use uuid::Uuid;

/// Supplies the user id for a session
pub trait IdentityProvider: Send + Sync {
    fn user_id(&self) -> Result<UserId>;
}

/// A random anonymous identity, stable for the lifetime of the value
#[derive(Debug, Clone)]
pub struct AnonymousIdentity {
    id: UserId,
}

impl Default for AnonymousIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl AnonymousIdentity {
    pub fn new() -> Self {
        Self {
            id: UserId::from(format!("anon-{}", Uuid::new_v4().simple())),
        }
    }
}

impl IdentityProvider for AnonymousIdentity {
    fn user_id(&self) -> Result<UserId> {
        Ok(self.id.clone())
    }
}

/// An identity chosen up front
#[derive(Debug, Clone)]
pub struct FixedIdentity(pub UserId);

impl IdentityProvider for FixedIdentity {
    fn user_id(&self) -> Result<UserId> {
        Ok(self.0.clone())
    }
}
