//! Batch ingestion.
//!
//! Validates a batch of incoming records, builds fresh or updated
//! metadata, resolves ancestry and legal inheritance, suppresses
//! duplicate updates, and hands the survivors to the persistence
//! coordinator as one transfer batch.
//!
//! Structural validation is all-or-nothing and happens before any store
//! I/O. A single forbidden or missing-parent record also fails the whole
//! batch; partial results exist only for duplicate skips.

use crate::duplicate::DuplicateDetector;
use crate::legal::LegalComplianceResolver;
use crate::persistence::PersistenceCoordinator;
use recordio_auth::AuthorizationGateway;
use recordio_common::{
    is_kind_valid, is_record_id_valid, new_record_id, ComplianceStatus, Error, Legal,
    OperationType, Record, RecordData, RecordIdWithVersion, RecordMetadata, RecordProcessing,
    RequestContext, Result, TransferBatch, TransferInfo,
};
use recordio_store::MetadataRepository;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::warn;

/// Validates and prepares record batches for commit
pub struct IngestionPipeline {
    auth: Arc<AuthorizationGateway>,
    legal: Arc<LegalComplianceResolver>,
    duplicates: Arc<DuplicateDetector>,
    metadata: Arc<dyn MetadataRepository>,
    persistence: Arc<PersistenceCoordinator>,
}

impl IngestionPipeline {
    pub fn new(
        auth: Arc<AuthorizationGateway>,
        legal: Arc<LegalComplianceResolver>,
        duplicates: Arc<DuplicateDetector>,
        metadata: Arc<dyn MetadataRepository>,
        persistence: Arc<PersistenceCoordinator>,
    ) -> Self {
        Self {
            auth,
            legal,
            duplicates,
            metadata,
            persistence,
        }
    }

    /// Ingest one batch of records. Returns the transfer summary; the
    /// record count covers committed records only, independent of how
    /// many duplicates were skipped.
    ///
    /// The create/update path reads existing metadata and then writes
    /// without a compare-and-swap guard: concurrent updates to the same
    /// id are last-write-wins. Bulk patch is the only optimistically
    /// locked writer.
    pub async fn ingest(
        &self,
        ctx: &RequestContext,
        mut records: Vec<Record>,
        skip_duplicates: bool,
    ) -> Result<TransferInfo> {
        self.validate_structure(ctx, &mut records)?;

        // In a policy-enabled partition the policy engine evaluates every
        // record instead; the entitlements and legal checks are skipped.
        let policy_mode = self.auth.policy_enabled(ctx).await;
        if !policy_mode {
            self.validate_acls(ctx, &records).await?;
            self.validate_legal(ctx, &records).await?;
        }

        let (record_parents, parent_meta) = self.resolve_parents(ctx, &records).await?;

        let ids: Vec<String> = records
            .iter()
            .filter_map(|r| r.id.clone())
            .collect();
        let existing = self.metadata.get_many(&ids).await?;

        let mut info = TransferInfo::new(&ctx.user_id, 0);
        let mut survivors: Vec<RecordProcessing> = Vec::with_capacity(records.len());

        for record in &records {
            let id = record.require_id()?;
            let data = RecordData::from_record(record);

            match existing.get(id) {
                Some(current) => {
                    let allowed = if policy_mode {
                        let input_meta = RecordMetadata::from_record(record)?;
                        self.auth
                            .evaluate_policy(ctx, &input_meta, OperationType::Update)
                            .await?
                    } else {
                        self.auth
                            .has_owner_access(ctx, current, OperationType::Update)
                            .await?
                    };
                    if !allowed {
                        return Err(Error::forbidden(format!(
                            "the user is not authorized to update record '{id}'"
                        )));
                    }

                    if skip_duplicates {
                        match current.latest_version_path() {
                            Some(path) => {
                                if self.duplicates.is_duplicate(ctx, &data, path).await? {
                                    info.skipped_record_ids.push(id.to_string());
                                    continue;
                                }
                            }
                            None => {
                                warn!(record = id, "existing record has no prior version, processing update");
                            }
                        }
                    }

                    let mut meta = RecordMetadata::from_record(record)?;
                    meta.create_user = current.create_user.clone();
                    meta.create_time = current.create_time;
                    meta.version_paths = current.version_paths.clone();
                    meta.modify_user = Some(ctx.user_id.clone());
                    meta.modify_time = Some(info.version);
                    meta.append_version_path(info.version);
                    survivors.push(RecordProcessing {
                        data,
                        metadata: meta,
                        op_type: OperationType::Update,
                    });
                }
                None => {
                    let mut meta = RecordMetadata::from_record(record)?;
                    if policy_mode
                        && !self
                            .auth
                            .evaluate_policy(ctx, &meta, OperationType::Create)
                            .await?
                    {
                        return Err(Error::forbidden(format!(
                            "the user is not authorized to create record '{id}'"
                        )));
                    }
                    meta.create_user = ctx.user_id.clone();
                    meta.create_time = info.version;
                    meta.append_version_path(info.version);
                    survivors.push(RecordProcessing {
                        data,
                        metadata: meta,
                        op_type: OperationType::Create,
                    });
                }
            }
        }

        for processing in &mut survivors {
            match record_parents.get(&processing.metadata.id) {
                Some(parent_ids) => {
                    let legals: Vec<&Legal> = parent_ids
                        .iter()
                        .filter_map(|p| parent_meta.get(p))
                        .map(|m| &m.legal)
                        .collect();
                    LegalComplianceResolver::inherit_from_parents(
                        &mut processing.metadata.legal,
                        legals,
                    );
                }
                None => {
                    processing.metadata.legal.status = Some(ComplianceStatus::Compliant);
                }
            }
        }

        info.record_count = survivors.len();
        let batch = TransferBatch {
            info: info.clone(),
            records: survivors,
        };
        self.persistence.commit(ctx, &batch).await?;
        Ok(info)
    }

    /// Kind, id, non-empty ACL/legal-tag, and in-batch uniqueness checks.
    /// Records with no id get a generated one here.
    fn validate_structure(&self, ctx: &RequestContext, records: &mut [Record]) -> Result<()> {
        if records.is_empty() {
            return Err(Error::invalid_request("the batch contains no records"));
        }

        let mut seen: HashSet<String> = HashSet::with_capacity(records.len());
        for record in records.iter_mut() {
            if !is_kind_valid(&record.kind) {
                return Err(Error::InvalidKind(record.kind.clone()));
            }

            match &record.id {
                Some(id) => {
                    if !is_record_id_valid(id, &ctx.partition_id, &record.kind) {
                        return Err(Error::InvalidRecordId(format!(
                            "'{id}' does not match tenant '{}' and kind '{}'",
                            ctx.partition_id, record.kind
                        )));
                    }
                    if !seen.insert(id.clone()) {
                        return Err(Error::invalid_request(format!(
                            "record id '{id}' appears more than once in the batch"
                        )));
                    }
                }
                None => {
                    let id = new_record_id(&ctx.partition_id, &record.kind);
                    seen.insert(id.clone());
                    record.id = Some(id);
                }
            }

            if record.acl.viewers.is_empty() || record.acl.owners.is_empty() {
                return Err(Error::InvalidAcl(format!(
                    "record '{}' must declare at least one viewer and one owner",
                    record.id.as_deref().unwrap_or_default()
                )));
            }
            if record.legal.legaltags.is_empty() {
                return Err(Error::InvalidLegalTag(format!(
                    "record '{}' has no legal tags",
                    record.id.as_deref().unwrap_or_default()
                )));
            }
        }
        Ok(())
    }

    /// The union of all ACL entries must share the caller's own
    /// entitlement-group domain.
    async fn validate_acls(&self, ctx: &RequestContext, records: &[Record]) -> Result<()> {
        let union: BTreeSet<String> = records
            .iter()
            .flat_map(|r| r.acl.entries().map(str::to_string))
            .collect();
        if !self.auth.is_valid_acl(ctx, &union).await? {
            return Err(Error::InvalidAcl(
                "one or more ACL entries do not match the caller's data domain".into(),
            ));
        }
        Ok(())
    }

    async fn validate_legal(&self, ctx: &RequestContext, records: &[Record]) -> Result<()> {
        let legaltags: BTreeSet<String> = records
            .iter()
            .flat_map(|r| r.legal.legaltags.iter().cloned())
            .collect();
        let countries: BTreeSet<String> = records
            .iter()
            .flat_map(|r| r.legal.other_relevant_data_countries.iter().cloned())
            .collect();
        self.legal.validate(ctx, &legaltags, &countries).await
    }

    /// Parse every parent reference, fetch all parents in one call, and
    /// fail on the first missing parent record or version.
    async fn resolve_parents(
        &self,
        _ctx: &RequestContext,
        records: &[Record],
    ) -> Result<(
        BTreeMap<String, BTreeSet<String>>,
        BTreeMap<String, RecordMetadata>,
    )> {
        let mut record_parents: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut wanted_versions: BTreeMap<String, BTreeSet<u64>> = BTreeMap::new();

        for record in records {
            let Some(parents) = record.parents() else {
                continue;
            };
            let id = record.require_id()?;
            for reference in parents {
                let parent = RecordIdWithVersion::parse(reference)?;
                record_parents
                    .entry(id.to_string())
                    .or_default()
                    .insert(parent.record_id.clone());
                wanted_versions
                    .entry(parent.record_id)
                    .or_default()
                    .insert(parent.version);
            }
        }
        if wanted_versions.is_empty() {
            return Ok((record_parents, BTreeMap::new()));
        }

        let parent_ids: Vec<String> = wanted_versions.keys().cloned().collect();
        let found = self.metadata.get_many(&parent_ids).await?;

        let mut parent_meta = BTreeMap::new();
        for (parent_id, versions) in wanted_versions {
            let Some(meta) = found.get(&parent_id) else {
                return Err(Error::RecordNotFound(parent_id));
            };
            for version in versions {
                if !meta.has_version(version) {
                    return Err(Error::RecordVersionNotFound {
                        id: parent_id.clone(),
                        version,
                    });
                }
            }
            parent_meta.insert(parent_id, meta.clone());
        }
        Ok((record_parents, parent_meta))
    }
}
