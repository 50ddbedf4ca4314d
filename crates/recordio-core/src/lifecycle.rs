//! Soft delete and purge.
//!
//! Soft delete flips the record's status in place and keeps every blob
//! and version path. Purge removes metadata and all payload versions; it
//! deletes the metadata entry first so a half-purged record can always be
//! restored by re-inserting it when a blob deletion fails.

use recordio_common::{
    is_record_id_valid_format_and_tenant, now_millis, ChangeEvent, Error, OperationType,
    RecordStatus, RequestContext, Result,
};
use recordio_auth::AuthorizationGateway;
use recordio_store::{BlobStore, MessageBus, MetadataRepository};
use std::sync::Arc;
use tracing::{info, warn};

/// Delete and purge operations on single records
pub struct RecordLifecycleManager {
    auth: Arc<AuthorizationGateway>,
    metadata: Arc<dyn MetadataRepository>,
    blobs: Arc<dyn BlobStore>,
    bus: Arc<dyn MessageBus>,
}

impl RecordLifecycleManager {
    pub fn new(
        auth: Arc<AuthorizationGateway>,
        metadata: Arc<dyn MetadataRepository>,
        blobs: Arc<dyn BlobStore>,
        bus: Arc<dyn MessageBus>,
    ) -> Self {
        Self {
            auth,
            metadata,
            blobs,
            bus,
        }
    }

    /// Mark a record deleted. Only active records are visible to this
    /// lookup; payloads and version history are untouched.
    pub async fn soft_delete(&self, ctx: &RequestContext, id: &str) -> Result<()> {
        self.validate_id(ctx, id)?;

        let mut meta = match self.metadata.get(id).await? {
            Some(meta) if meta.status == RecordStatus::Active => meta,
            _ => return Err(Error::RecordNotFound(id.to_string())),
        };
        if !self
            .auth
            .has_owner_access(ctx, &meta, OperationType::Delete)
            .await?
        {
            return Err(Error::forbidden(format!(
                "the user is not authorized to delete record '{id}'"
            )));
        }

        meta.status = RecordStatus::Deleted;
        meta.modify_user = Some(ctx.user_id.clone());
        meta.modify_time = Some(now_millis());
        self.metadata.upsert(vec![meta.clone()]).await?;

        self.bus
            .publish(
                ctx,
                vec![ChangeEvent {
                    id: meta.id,
                    kind: meta.kind,
                    op: OperationType::Delete,
                }],
            )
            .await
    }

    /// Irreversibly remove a record's metadata and every payload version,
    /// regardless of its active/deleted state. The metadata entry goes
    /// first; if a blob deletion then fails with anything other than
    /// already-gone, the entry is re-inserted before the error propagates.
    pub async fn purge(&self, ctx: &RequestContext, id: &str) -> Result<()> {
        self.validate_id(ctx, id)?;

        let meta = self
            .metadata
            .get(id)
            .await?
            .ok_or_else(|| Error::RecordNotFound(id.to_string()))?;
        if !self
            .auth
            .has_owner_access(ctx, &meta, OperationType::Purge)
            .await?
        {
            return Err(Error::forbidden(format!(
                "the user is not authorized to purge record '{id}'"
            )));
        }

        self.metadata.delete(id).await?;

        for path in &meta.version_paths {
            match self.blobs.delete_version(ctx, path).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!(record = id, version_path = %path, "blob deletion failed during purge, restoring metadata");
                    return Err(match self.metadata.upsert(vec![meta.clone()]).await {
                        Ok(()) => e,
                        Err(restore) => e.with_suppressed(restore),
                    });
                }
            }
        }

        info!(record = id, versions = meta.version_paths.len(), "record purged");
        self.bus
            .publish(
                ctx,
                vec![ChangeEvent {
                    id: meta.id,
                    kind: meta.kind,
                    op: OperationType::Purge,
                }],
            )
            .await
    }

    fn validate_id(&self, ctx: &RequestContext, id: &str) -> Result<()> {
        if !is_record_id_valid_format_and_tenant(id, &ctx.partition_id) {
            return Err(Error::InvalidRecordId(format!(
                "'{id}' is not a valid record id for tenant '{}'",
                ctx.partition_id
            )));
        }
        Ok(())
    }
}
