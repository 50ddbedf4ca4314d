//! RecordIO Store - metadata repository, blob store, and message bus
//!
//! Defines the collaborator contracts the record lifecycle core depends
//! on, plus the backends shipped with RecordIO. Backends are chosen once
//! at startup from configuration and injected as trait objects.

pub mod fs;
pub mod memory;
pub mod redb_store;
pub mod traits;

pub use fs::FsBlobStore;
pub use memory::{MemoryBlobStore, MemoryMessageBus, MemoryMetadataRepository};
pub use redb_store::RedbMetadataRepository;
pub use traits::{BlobStore, MessageBus, MetadataRepository};

use recordio_common::config::{BlobBackend, MetadataBackend};
use recordio_common::Result;
use std::sync::Arc;

/// Open the metadata repository selected by configuration
pub fn open_metadata_repository(backend: &MetadataBackend) -> Result<Arc<dyn MetadataRepository>> {
    match backend {
        MetadataBackend::Memory => Ok(Arc::new(MemoryMetadataRepository::new())),
        MetadataBackend::Redb { path } => Ok(Arc::new(RedbMetadataRepository::open(path)?)),
    }
}

/// Open the blob store selected by configuration
pub fn open_blob_store(backend: &BlobBackend) -> Arc<dyn BlobStore> {
    match backend {
        BlobBackend::Memory => Arc::new(MemoryBlobStore::new()),
        BlobBackend::Fs { root } => Arc::new(FsBlobStore::new(root.clone())),
    }
}
