//! Entitlements provider contract.
//!
//! The external entitlements service resolves a caller's group
//! memberships; RecordIO only consumes the client contract.

use async_trait::async_trait;
use recordio_common::{RequestContext, Result};
use serde::{Deserialize, Serialize};

/// One group the caller belongs to. `name` is the group's local part
/// ("data.default.owners"); `email` is the full group address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupIdentity {
    pub name: String,
    pub email: String,
}

impl GroupIdentity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// The domain portion of the group address, if present
    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        self.email.split_once('@').map(|(_, domain)| domain)
    }
}

/// Client contract for the external entitlements service
#[async_trait]
pub trait EntitlementsProvider: Send + Sync {
    /// Resolve the caller's group memberships
    async fn groups(&self, ctx: &RequestContext) -> Result<Vec<GroupIdentity>>;
}
