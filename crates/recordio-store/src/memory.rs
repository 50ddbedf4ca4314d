//! In-memory backends.
//!
//! Default backend for single-process development and the harness every
//! core test runs against. All maps sit behind one mutex per store, so
//! the compare-and-swap in `update_with_lock` is atomic with the write.

use crate::traits::{BlobStore, MessageBus, MetadataRepository};
use async_trait::async_trait;
use parking_lot::Mutex;
use recordio_common::checksum::payload_hash;
use recordio_common::{
    Acl, ChangeEvent, Error, RecordData, RecordMetadata, RequestContext, Result,
};
use std::collections::HashMap;

/// In-memory metadata repository
#[derive(Default)]
pub struct MemoryMetadataRepository {
    records: Mutex<HashMap<String, RecordMetadata>>,
}

impl MemoryMetadataRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl MetadataRepository for MemoryMetadataRepository {
    async fn get(&self, id: &str) -> Result<Option<RecordMetadata>> {
        Ok(self.records.lock().get(id).cloned())
    }

    async fn get_many(&self, ids: &[String]) -> Result<HashMap<String, RecordMetadata>> {
        let records = self.records.lock();
        Ok(ids
            .iter()
            .filter_map(|id| records.get(id).map(|meta| (id.clone(), meta.clone())))
            .collect())
    }

    async fn upsert(&self, records: Vec<RecordMetadata>) -> Result<()> {
        let mut stored = self.records.lock();
        for record in records {
            stored.insert(record.id.clone(), record);
        }
        Ok(())
    }

    async fn update_with_lock(
        &self,
        records: Vec<RecordMetadata>,
        expected: &HashMap<String, Option<u64>>,
    ) -> Result<Vec<String>> {
        let mut stored = self.records.lock();
        let mut locked = Vec::new();
        for record in records {
            let current = stored.get(&record.id).and_then(RecordMetadata::latest_version);
            match expected.get(&record.id) {
                Some(Some(version)) if current != Some(*version) => {
                    locked.push(record.id.clone());
                }
                _ => {
                    stored.insert(record.id.clone(), record);
                }
            }
        }
        Ok(locked)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.records.lock().remove(id);
        Ok(())
    }
}

/// In-memory blob store. Checksums are computed at write time and stored
/// next to the payload, as cloud object stores do.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, (RecordData, String)>>,
}

impl MemoryBlobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a payload exists at the given version path
    #[must_use]
    pub fn contains(&self, version_path: &str) -> bool {
        self.blobs.lock().contains_key(version_path)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn write(
        &self,
        _ctx: &RequestContext,
        version_path: &str,
        data: &RecordData,
        _acl: &Acl,
    ) -> Result<()> {
        let hash = payload_hash(data)?;
        self.blobs
            .lock()
            .insert(version_path.to_string(), (data.clone(), hash));
        Ok(())
    }

    async fn read(&self, _ctx: &RequestContext, version_path: &str) -> Result<RecordData> {
        self.blobs
            .lock()
            .get(version_path)
            .map(|(data, _)| data.clone())
            .ok_or_else(|| Error::RecordNotFound(version_path.to_string()))
    }

    async fn read_many(
        &self,
        _ctx: &RequestContext,
        version_paths: &[String],
    ) -> Result<HashMap<String, RecordData>> {
        let blobs = self.blobs.lock();
        Ok(version_paths
            .iter()
            .filter_map(|path| blobs.get(path).map(|(data, _)| (path.clone(), data.clone())))
            .collect())
    }

    async fn delete_version(&self, _ctx: &RequestContext, version_path: &str) -> Result<()> {
        self.blobs
            .lock()
            .remove(version_path)
            .map(|_| ())
            .ok_or_else(|| Error::RecordNotFound(version_path.to_string()))
    }

    async fn checksum(&self, _ctx: &RequestContext, version_path: &str) -> Result<String> {
        self.blobs
            .lock()
            .get(version_path)
            .map(|(_, hash)| hash.clone())
            .ok_or_else(|| Error::RecordNotFound(version_path.to_string()))
    }
}

/// In-memory message bus that records everything it publishes
#[derive(Default)]
pub struct MemoryMessageBus {
    events: Mutex<Vec<ChangeEvent>>,
}

impl MemoryMessageBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event published so far, in publish order
    #[must_use]
    pub fn published(&self) -> Vec<ChangeEvent> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl MessageBus for MemoryMessageBus {
    async fn publish(&self, _ctx: &RequestContext, events: Vec<ChangeEvent>) -> Result<()> {
        self.events.lock().extend(events);
        Ok(())
    }
}
