//! Two-store commit protocol.
//!
//! A batch commits in two phases: payloads first (fanned out across a
//! bounded pool), then all metadata in one repository call. If the
//! metadata write fails, the payload versions written in phase A are
//! deleted again; the record's prior history is never touched. Cross-store
//! consistency comes from this compensation, not from locking.

use futures::future::join_all;
use recordio_common::{
    ChangeEvent, Error, OperationType, RecordMetadata, RequestContext, Result, TransferBatch,
};
use recordio_store::{BlobStore, MessageBus, MetadataRepository};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Commits record batches against the metadata repository and blob store
pub struct PersistenceCoordinator {
    metadata: Arc<dyn MetadataRepository>,
    blobs: Arc<dyn BlobStore>,
    bus: Arc<dyn MessageBus>,
    write_concurrency: usize,
}

impl PersistenceCoordinator {
    pub fn new(
        metadata: Arc<dyn MetadataRepository>,
        blobs: Arc<dyn BlobStore>,
        bus: Arc<dyn MessageBus>,
        write_concurrency: usize,
    ) -> Self {
        Self {
            metadata,
            blobs,
            bus,
            write_concurrency: write_concurrency.max(1),
        }
    }

    /// Commit one batch. Phase A failures abort before any metadata is
    /// touched; a phase B failure triggers compensation of the payload
    /// versions written in this call, with the original error propagated.
    pub async fn commit(&self, ctx: &RequestContext, batch: &TransferBatch) -> Result<()> {
        if batch.records.is_empty() {
            return Ok(());
        }

        self.write_payloads(ctx, batch).await?;

        let metas: Vec<RecordMetadata> =
            batch.records.iter().map(|r| r.metadata.clone()).collect();
        if let Err(primary) = self.metadata.upsert(metas).await {
            warn!(
                correlation_id = %ctx.correlation_id,
                "metadata write failed, rolling back {} payload version(s)",
                batch.records.len()
            );
            return Err(match self.rollback_new_versions(ctx, batch).await {
                Ok(()) => primary,
                Err(compensation) => primary.with_suppressed(compensation),
            });
        }

        let events = batch
            .records
            .iter()
            .map(|r| ChangeEvent {
                id: r.metadata.id.clone(),
                kind: r.metadata.kind.clone(),
                op: r.op_type,
            })
            .collect();
        self.bus.publish(ctx, events).await?;

        info!(
            correlation_id = %ctx.correlation_id,
            records = batch.records.len(),
            version = batch.info.version,
            "batch committed"
        );
        Ok(())
    }

    /// Compare-and-swap metadata update for the patch path. Returns the
    /// ids that lost their optimistic-lock check; change notifications go
    /// out for the rest.
    pub async fn update_metadata(
        &self,
        ctx: &RequestContext,
        records: Vec<RecordMetadata>,
        expected: &HashMap<String, Option<u64>>,
    ) -> Result<Vec<String>> {
        let mut events: Vec<ChangeEvent> = records
            .iter()
            .map(|meta| ChangeEvent {
                id: meta.id.clone(),
                kind: meta.kind.clone(),
                op: OperationType::Update,
            })
            .collect();

        let locked = self.metadata.update_with_lock(records, expected).await?;
        events.retain(|event| !locked.contains(&event.id));
        if !events.is_empty() {
            self.bus.publish(ctx, events).await?;
        }
        Ok(locked)
    }

    /// Phase A: write every record's newest payload version, fanned out
    /// across a bounded pool. Each task carries its own context clone;
    /// the first failure is re-raised with its original kind.
    async fn write_payloads(&self, ctx: &RequestContext, batch: &TransferBatch) -> Result<()> {
        let semaphore = Arc::new(Semaphore::new(self.write_concurrency));
        let mut handles = Vec::with_capacity(batch.records.len());

        for record in &batch.records {
            let path = newest_version_path(&record.metadata)?;
            let blobs = Arc::clone(&self.blobs);
            let semaphore = Arc::clone(&semaphore);
            let ctx = ctx.clone();
            let data = record.data.clone();
            let acl = record.metadata.acl.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| Error::internal("payload write pool closed"))?;
                blobs.write(&ctx, &path, &data, &acl).await
            }));
        }

        for joined in join_all(handles).await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(e),
                Err(e) => return Err(Error::internal(format!("payload write task failed: {e}"))),
            }
        }
        Ok(())
    }

    /// Delete the newest payload version of every record in the batch.
    /// Versions already gone are fine; the first real failure is kept and
    /// the remaining deletions still run.
    async fn rollback_new_versions(
        &self,
        ctx: &RequestContext,
        batch: &TransferBatch,
    ) -> Result<()> {
        let mut first_failure = None;
        for record in &batch.records {
            let path = newest_version_path(&record.metadata)?;
            match self.blobs.delete_version(ctx, &path).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!(version_path = %path, "compensation delete failed: {e}");
                    first_failure.get_or_insert(e);
                }
            }
        }
        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn newest_version_path(metadata: &RecordMetadata) -> Result<String> {
    metadata
        .latest_version_path()
        .map(str::to_string)
        .ok_or_else(|| {
            Error::internal(format!("record '{}' has no version path to write", metadata.id))
        })
}
