//! Bulk metadata patching under optimistic concurrency.
//!
//! Results are partitioned per id rather than batch-fatal: a missing,
//! unauthorized, or version-locked record lands in its own bucket and the
//! rest of the batch still commits. This path never touches payloads.

use crate::patch::{apply_patch_ops, validate_patch_ops};
use crate::persistence::PersistenceCoordinator;
use recordio_auth::AuthorizationGateway;
use recordio_common::{
    is_record_id_valid_format_and_tenant, now_millis, Error, OperationType, PatchOperation,
    RecordIdWithVersion, RequestContext, Result,
};
use recordio_store::MetadataRepository;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Per-id result buckets of one patch call. An id appears in exactly one
/// bucket; `locked` ids lost their optimistic-lock check and were not
/// mutated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatchOutcome {
    pub applied: Vec<String>,
    pub not_found: Vec<String>,
    pub unauthorized: Vec<String>,
    pub locked: Vec<String>,
}

/// Applies partial metadata updates to many records at once
pub struct BulkPatchCoordinator {
    auth: Arc<AuthorizationGateway>,
    metadata: Arc<dyn MetadataRepository>,
    persistence: Arc<PersistenceCoordinator>,
}

impl BulkPatchCoordinator {
    pub fn new(
        auth: Arc<AuthorizationGateway>,
        metadata: Arc<dyn MetadataRepository>,
        persistence: Arc<PersistenceCoordinator>,
    ) -> Self {
        Self {
            auth,
            metadata,
            persistence,
        }
    }

    /// Apply the given operations to every record in `ids`. An id may
    /// carry an expected version as a fourth colon-delimited segment;
    /// the write then only proceeds if the record is still at that
    /// version.
    pub async fn apply_patches(
        &self,
        ctx: &RequestContext,
        ids: &[String],
        ops: &[PatchOperation],
    ) -> Result<PatchOutcome> {
        validate_patch_ops(ops)?;

        // supplied id -> (bare id, expected version)
        let mut parsed: Vec<(String, String, Option<u64>)> = Vec::with_capacity(ids.len());
        let mut seen_bare: HashSet<String> = HashSet::with_capacity(ids.len());
        for supplied in ids {
            let (bare, version) = parse_patch_id(ctx, supplied)?;
            if !seen_bare.insert(bare.clone()) {
                return Err(Error::invalid_request(format!(
                    "record id '{bare}' appears more than once in the patch request"
                )));
            }
            parsed.push((supplied.clone(), bare, version));
        }

        let bare_ids: Vec<String> = parsed.iter().map(|(_, bare, _)| bare.clone()).collect();
        let current = self.metadata.get_many(&bare_ids).await?;

        let now = now_millis();
        let mut outcome = PatchOutcome::default();
        let mut candidates = Vec::new();
        let mut expected: HashMap<String, Option<u64>> = HashMap::new();
        let mut supplied_by_bare: HashMap<String, String> = HashMap::new();

        for (supplied, bare, version) in parsed {
            let Some(meta) = current.get(&bare) else {
                outcome.not_found.push(supplied);
                continue;
            };
            if !self
                .auth
                .has_owner_access(ctx, meta, OperationType::Update)
                .await?
            {
                outcome.unauthorized.push(supplied);
                continue;
            }

            let mut patched = meta.clone();
            apply_patch_ops(&mut patched, ops, &ctx.user_id, now)?;
            expected.insert(bare.clone(), version);
            supplied_by_bare.insert(bare, supplied);
            candidates.push(patched);
        }

        let locked_bare = self
            .persistence
            .update_metadata(ctx, candidates.clone(), &expected)
            .await?;

        for candidate in candidates {
            let Some(supplied) = supplied_by_bare.remove(&candidate.id) else {
                continue;
            };
            if locked_bare.contains(&candidate.id) {
                outcome.locked.push(supplied);
            } else {
                outcome.applied.push(supplied);
            }
        }
        Ok(outcome)
    }
}

/// Split a patch id into its bare record id and optional expected
/// version. Four colon-delimited segments carry a version in the fourth.
fn parse_patch_id(ctx: &RequestContext, supplied: &str) -> Result<(String, Option<u64>)> {
    match supplied.split(':').count() {
        4 => {
            let parsed = RecordIdWithVersion::parse(supplied)?;
            if !is_record_id_valid_format_and_tenant(&parsed.record_id, &ctx.partition_id) {
                return Err(Error::InvalidRecordId(format!(
                    "'{supplied}' does not belong to tenant '{}'",
                    ctx.partition_id
                )));
            }
            Ok((parsed.record_id, Some(parsed.version)))
        }
        3 if is_record_id_valid_format_and_tenant(supplied, &ctx.partition_id) => {
            Ok((supplied.to_string(), None))
        }
        _ => Err(Error::InvalidRecordId(format!(
            "'{supplied}' is not a valid record id for tenant '{}'",
            ctx.partition_id
        ))),
    }
}
