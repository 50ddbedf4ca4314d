//! Authorization for RecordIO.
//!
//! Exposes the client contracts for the external entitlements, policy and
//! partition services, plus the [`AuthorizationGateway`] that answers the
//! core's access questions over them.

pub mod cache;
pub mod gateway;
pub mod policy;
pub mod provider;

pub use cache::{Cache, MemoryCache};
pub use gateway::{AuthorizationGateway, PolicyStatus};
pub use policy::{
    PartitionConfigProvider, PolicyDecision, PolicyEvaluator, PolicyRecord, PolicyRequest,
};
pub use provider::{EntitlementsProvider, GroupIdentity};
