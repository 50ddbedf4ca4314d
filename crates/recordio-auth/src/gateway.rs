//! Authorization gateway.
//!
//! Every mutating and read path in the record core funnels its access
//! questions through here. Two backends answer them: the default
//! entitlements path (group memberships, cached per partition and
//! credential, compared by group local-part) and an opt-in per-partition
//! policy path that delegates the verdict to an external engine.
//!
//! Failure policy: a provider error never silently grants access and
//! surfaces as forbidden; a failed partition-mode lookup falls back to
//! the entitlements path instead of failing the request.

use crate::cache::Cache;
use crate::policy::{
    PartitionConfigProvider, PolicyEvaluator, PolicyRecord, PolicyRequest,
};
use crate::provider::{EntitlementsProvider, GroupIdentity};
use recordio_common::checksum::crc32c_base64;
use recordio_common::{Acl, Error, OperationType, RecordMetadata, RequestContext, Result};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error};

const ACCESS_DENIED: &str = "the user is not authorized to perform this action";

/// Cached policy-mode flag for one partition
#[derive(Clone, Copy, Debug)]
pub struct PolicyStatus {
    enabled: bool,
    fetched_at: Instant,
}

/// Policy-path collaborators, present only when the deployment has an
/// external policy engine configured
struct PolicyBackend {
    evaluator: Arc<dyn PolicyEvaluator>,
    partitions: Arc<dyn PartitionConfigProvider>,
    status_cache: Arc<dyn Cache<PolicyStatus>>,
    policy_id: String,
    status_ttl: Duration,
}

/// ACL evaluation with cached entitlements and optional policy override
pub struct AuthorizationGateway {
    entitlements: Arc<dyn EntitlementsProvider>,
    groups_cache: Arc<dyn Cache<Vec<GroupIdentity>>>,
    policy: Option<PolicyBackend>,
}

impl AuthorizationGateway {
    /// Create a gateway using the entitlements path only
    pub fn new(
        entitlements: Arc<dyn EntitlementsProvider>,
        groups_cache: Arc<dyn Cache<Vec<GroupIdentity>>>,
    ) -> Self {
        Self {
            entitlements,
            groups_cache,
            policy: None,
        }
    }

    /// Attach an external policy engine. Partitions still opt in
    /// individually through the partition configuration service.
    #[must_use]
    pub fn with_policy(
        mut self,
        evaluator: Arc<dyn PolicyEvaluator>,
        partitions: Arc<dyn PartitionConfigProvider>,
        status_cache: Arc<dyn Cache<PolicyStatus>>,
        policy_id: impl Into<String>,
        status_ttl: Duration,
    ) -> Self {
        self.policy = Some(PolicyBackend {
            evaluator,
            partitions,
            status_cache,
            policy_id: policy_id.into(),
            status_ttl,
        });
        self
    }

    /// The caller's group memberships, cached by `(partition, credential)`.
    /// Cache entries live until evicted; writers only insert.
    pub async fn groups(&self, ctx: &RequestContext) -> Result<Vec<GroupIdentity>> {
        let key = crc32c_base64(&format!(
            "entitlement-groups:{}:{}",
            ctx.partition_id, ctx.credential
        ));
        if let Some(groups) = self.groups_cache.get(&key) {
            return Ok(groups);
        }

        debug!(partition = %ctx.partition_id, "entitlements cache miss");
        let groups = self.entitlements.groups(ctx).await.map_err(|e| {
            error!(partition = %ctx.partition_id, "error requesting entitlements service: {e}");
            Error::forbidden(ACCESS_DENIED)
        })?;
        self.groups_cache.put(key, groups.clone());
        Ok(groups)
    }

    /// Validate that every ACL entry shares the caller's own entitlement
    /// domain. Always answered by the entitlements path.
    pub async fn is_valid_acl(&self, ctx: &RequestContext, acls: &BTreeSet<String>) -> Result<bool> {
        let groups = self.groups(ctx).await?;
        let Some(first) = groups.first() else {
            error!(user = %ctx.user_id, "error getting groups for user");
            return Err(Error::internal("unknown error happened when validating ACL"));
        };
        let Some(domain) = first.domain() else {
            error!(group = %first.email, "group address has no domain");
            return Err(Error::internal("unknown error happened when validating ACL"));
        };

        Ok(acls.iter().all(|entry| {
            Acl::group_domain(entry).is_some_and(|d| d.eq_ignore_ascii_case(domain))
        }))
    }

    /// Whether the caller holds owner access on the record
    pub async fn has_owner_access(
        &self,
        ctx: &RequestContext,
        metadata: &RecordMetadata,
        operation: OperationType,
    ) -> Result<bool> {
        if self.policy_enabled(ctx).await {
            return self.evaluate_policy(ctx, metadata, operation).await;
        }
        let groups = self.groups(ctx).await?;
        Ok(matches_any(&groups, metadata.acl.owners.iter().map(String::as_str)))
    }

    /// Whether the caller holds viewer or owner access on the record
    pub async fn has_viewer_or_owner_access(
        &self,
        ctx: &RequestContext,
        metadata: &RecordMetadata,
        operation: OperationType,
    ) -> Result<bool> {
        if self.policy_enabled(ctx).await {
            return self.evaluate_policy(ctx, metadata, operation).await;
        }
        let groups = self.groups(ctx).await?;
        Ok(matches_any(&groups, metadata.acl.entries()))
    }

    /// Whether the caller's partition runs in policy mode. The flag is
    /// cached briefly; a failed lookup defaults to entitlements mode.
    pub async fn policy_enabled(&self, ctx: &RequestContext) -> bool {
        let Some(backend) = &self.policy else {
            return false;
        };

        let key = format!("{}-policy", ctx.partition_id);
        if let Some(status) = backend.status_cache.get(&key)
            && status.fetched_at.elapsed() < backend.status_ttl
        {
            return status.enabled;
        }

        let enabled = match backend.partitions.policy_enabled(&ctx.partition_id).await {
            Ok(enabled) => enabled,
            Err(e) => {
                error!(partition = %ctx.partition_id, "error getting policy status: {e}");
                false
            }
        };
        backend.status_cache.put(
            key,
            PolicyStatus {
                enabled,
                fetched_at: Instant::now(),
            },
        );
        enabled
    }

    /// Ask the external policy engine for a verdict on one record
    pub async fn evaluate_policy(
        &self,
        ctx: &RequestContext,
        metadata: &RecordMetadata,
        operation: OperationType,
    ) -> Result<bool> {
        let Some(backend) = &self.policy else {
            return Err(Error::internal("policy evaluation requested without a policy backend"));
        };
        let groups = self.groups(ctx).await?;
        let request = PolicyRequest {
            policy_id: backend.policy_id.clone(),
            operation,
            groups: groups.into_iter().map(|g| g.email).collect(),
            record: PolicyRecord {
                id: metadata.id.clone(),
                kind: metadata.kind.clone(),
                acl: metadata.acl.clone(),
                legal: metadata.legal.clone(),
            },
        };
        let decision = backend.evaluator.evaluate(ctx, &request).await.map_err(|e| {
            error!(record = %metadata.id, "policy evaluation failed: {e}");
            Error::forbidden(ACCESS_DENIED)
        })?;
        Ok(decision.allow)
    }
}

/// Group-identity comparison is by local part: the caller matches an ACL
/// entry when one of their group names equals the entry's group name.
fn matches_any<'a>(groups: &[GroupIdentity], acl_entries: impl Iterator<Item = &'a str>) -> bool {
    let names: BTreeSet<&str> = acl_entries.map(Acl::group_name).collect();
    groups.iter().any(|group| names.contains(group.name.as_str()))
}
