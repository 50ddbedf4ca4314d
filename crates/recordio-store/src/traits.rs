//! Collaborator contracts consumed by the record lifecycle core.
//!
//! One implementation per backend, selected at process startup and
//! injected as a trait object. The core never looks a backend up at
//! call time.

use async_trait::async_trait;
use recordio_common::{Acl, ChangeEvent, RecordData, RecordMetadata, RequestContext, Result};
use std::collections::HashMap;

/// Metadata half of the two-store layout.
#[async_trait]
pub trait MetadataRepository: Send + Sync {
    /// Fetch one record's metadata
    async fn get(&self, id: &str) -> Result<Option<RecordMetadata>>;

    /// Fetch metadata for many ids in one call. Missing ids are simply
    /// absent from the result map.
    async fn get_many(&self, ids: &[String]) -> Result<HashMap<String, RecordMetadata>>;

    /// Create or replace metadata entries, unconditionally
    async fn upsert(&self, records: Vec<RecordMetadata>) -> Result<()>;

    /// Compare-and-swap update. For each record with an expected version
    /// in `expected`, the write only proceeds if the stored record's
    /// latest version still matches; `None` means no version constraint.
    /// The compare and the write happen against the same snapshot.
    /// Returns the ids whose expected version no longer matched; those
    /// records are left untouched.
    async fn update_with_lock(
        &self,
        records: Vec<RecordMetadata>,
        expected: &HashMap<String, Option<u64>>,
    ) -> Result<Vec<String>>;

    /// Remove one metadata entry
    async fn delete(&self, id: &str) -> Result<()>;
}

/// Payload half of the two-store layout, keyed by version path.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write one payload version
    async fn write(
        &self,
        ctx: &RequestContext,
        version_path: &str,
        data: &RecordData,
        acl: &Acl,
    ) -> Result<()>;

    /// Read one payload version
    async fn read(&self, ctx: &RequestContext, version_path: &str) -> Result<RecordData>;

    /// Read many payload versions in one call
    async fn read_many(
        &self,
        ctx: &RequestContext,
        version_paths: &[String],
    ) -> Result<HashMap<String, RecordData>>;

    /// Delete one payload version. Deleting a version that is already
    /// gone fails with a not-found error.
    async fn delete_version(&self, ctx: &RequestContext, version_path: &str) -> Result<()>;

    /// Content checksum of one stored payload version
    async fn checksum(&self, ctx: &RequestContext, version_path: &str) -> Result<String>;
}

/// Change-notification fan-out to downstream consumers (indexer etc.)
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish a batch of change events in one call
    async fn publish(&self, ctx: &RequestContext, events: Vec<ChangeEvent>) -> Result<()>;
}
