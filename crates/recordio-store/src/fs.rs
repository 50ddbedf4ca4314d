//! Filesystem blob store.
//!
//! Payload versions live as JSON files under `<root>/<version_path>`;
//! checksums are computed on demand from the stored bytes. Suitable for
//! single-node deployments and integration testing against real I/O.

use crate::traits::BlobStore;
use async_trait::async_trait;
use recordio_common::checksum::crc32c_hex;
use recordio_common::{Acl, Error, RecordData, RequestContext, Result};
use std::collections::HashMap;
use std::path::PathBuf;

/// Blob store over a local directory
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Create a store rooted at the given directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn blob_path(&self, version_path: &str) -> PathBuf {
        self.root.join(version_path)
    }

    async fn read_bytes(&self, version_path: &str) -> Result<Vec<u8>> {
        let path = self.blob_path(version_path);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::RecordNotFound(version_path.to_string()))
            }
            Err(e) => Err(Error::Internal(format!(
                "blob read failed for '{version_path}': {e}"
            ))),
        }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn write(
        &self,
        _ctx: &RequestContext,
        version_path: &str,
        data: &RecordData,
        _acl: &Acl,
    ) -> Result<()> {
        let path = self.blob_path(version_path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Internal(format!("blob dir create failed: {e}")))?;
        }
        let bytes = serde_json::to_vec(data).map_err(|e| Error::Serialization(e.to_string()))?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| Error::Internal(format!("blob write failed for '{version_path}': {e}")))
    }

    async fn read(&self, _ctx: &RequestContext, version_path: &str) -> Result<RecordData> {
        let bytes = self.read_bytes(version_path).await?;
        serde_json::from_slice(&bytes).map_err(|e| Error::Serialization(e.to_string()))
    }

    async fn read_many(
        &self,
        ctx: &RequestContext,
        version_paths: &[String],
    ) -> Result<HashMap<String, RecordData>> {
        let mut result = HashMap::new();
        for path in version_paths {
            match self.read(ctx, path).await {
                Ok(data) => {
                    result.insert(path.clone(), data);
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(result)
    }

    async fn delete_version(&self, _ctx: &RequestContext, version_path: &str) -> Result<()> {
        let path = self.blob_path(version_path);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::RecordNotFound(version_path.to_string()))
            }
            Err(e) => Err(Error::Internal(format!(
                "blob delete failed for '{version_path}': {e}"
            ))),
        }
    }

    async fn checksum(&self, _ctx: &RequestContext, version_path: &str) -> Result<String> {
        let bytes = self.read_bytes(version_path).await?;
        Ok(crc32c_hex(&bytes))
    }
}
