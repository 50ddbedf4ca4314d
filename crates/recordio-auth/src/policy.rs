//! External policy evaluator contract.
//!
//! A partition can opt into delegating data authorization to an external
//! policy engine. The engine's boolean verdict is authoritative; when a
//! partition runs in policy mode the entitlements path is skipped
//! entirely.

use async_trait::async_trait;
use recordio_common::{Acl, Legal, OperationType, RequestContext, Result};
use serde::{Deserialize, Serialize};

/// Record fields the policy engine evaluates over
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub id: String,
    pub kind: String,
    pub acl: Acl,
    pub legal: Legal,
}

/// One policy evaluation request
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicyRequest {
    /// Policy id configured for this deployment
    pub policy_id: String,
    /// Operation the caller is attempting
    pub operation: OperationType,
    /// The caller's group addresses
    pub groups: Vec<String>,
    /// The record being evaluated
    pub record: PolicyRecord,
}

/// The policy engine's verdict
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub allow: bool,
}

/// Client contract for the external policy engine
#[async_trait]
pub trait PolicyEvaluator: Send + Sync {
    /// Evaluate one request; the result is authoritative
    async fn evaluate(&self, ctx: &RequestContext, request: &PolicyRequest)
        -> Result<PolicyDecision>;
}

/// Client contract for the partition configuration service, consulted to
/// learn whether a partition runs in policy mode
#[async_trait]
pub trait PartitionConfigProvider: Send + Sync {
    /// Whether policy mode is enabled for the given partition
    async fn policy_enabled(&self, partition_id: &str) -> Result<bool>;
}
