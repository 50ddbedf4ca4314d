//! Duplicate suppression for record updates.
//!
//! A proposed payload is hashed the same way blob stores checksum their
//! objects, so an update can be recognized as a no-op without reading the
//! stored payload back.

use recordio_common::checksum::payload_hash;
use recordio_common::{RecordData, RequestContext, Result};
use recordio_store::BlobStore;
use std::sync::Arc;
use tracing::debug;

/// Decides whether a proposed update would write identical payload bytes
pub struct DuplicateDetector {
    blobs: Arc<dyn BlobStore>,
}

impl DuplicateDetector {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// Compare the proposed payload's hash against the stored checksum at
    /// `version_path`. A missing blob is never a duplicate.
    pub async fn is_duplicate(
        &self,
        ctx: &RequestContext,
        data: &RecordData,
        version_path: &str,
    ) -> Result<bool> {
        let proposed = payload_hash(data)?;
        let stored = match self.blobs.checksum(ctx, version_path).await {
            Ok(checksum) => checksum,
            Err(e) if e.is_not_found() => {
                debug!(version_path, "no stored payload to compare against");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        Ok(proposed.eq_ignore_ascii_case(&stored))
    }
}
