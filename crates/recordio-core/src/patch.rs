//! Metadata patch operations.
//!
//! A patch targets one of four paths: `/acl/viewers`, `/acl/owners`,
//! `/legal/legaltags`, `/tags`. Patching is metadata-only and never
//! creates a new record version. Validation is structural and happens
//! before any record is fetched; application mutates an in-memory copy.

use recordio_common::{Error, PatchOpKind, PatchOperation, RecordMetadata, Result};

const PATH_ACL_VIEWERS: &str = "/acl/viewers";
const PATH_ACL_OWNERS: &str = "/acl/owners";
const PATH_LEGAL_TAGS: &str = "/legal/legaltags";
const PATH_TAGS: &str = "/tags";

const VALID_PATHS: [&str; 4] = [PATH_ACL_VIEWERS, PATH_ACL_OWNERS, PATH_LEGAL_TAGS, PATH_TAGS];

/// Structurally validate a set of patch operations
pub fn validate_patch_ops(ops: &[PatchOperation]) -> Result<()> {
    if ops.is_empty() {
        return Err(Error::InvalidPatchOperation(
            "at least one operation is required".into(),
        ));
    }

    let mut seen_paths = Vec::new();
    for op in ops {
        if !VALID_PATHS.contains(&op.path.as_str()) {
            return Err(Error::InvalidPatchOperation(format!(
                "invalid path '{}'",
                op.path
            )));
        }
        if seen_paths.contains(&op.path.as_str()) {
            return Err(Error::InvalidPatchOperation(format!(
                "duplicate operation for path '{}'",
                op.path
            )));
        }
        seen_paths.push(op.path.as_str());

        if op.value.is_empty() {
            return Err(Error::InvalidPatchOperation(format!(
                "operation on '{}' has no values",
                op.path
            )));
        }
        if op.path == PATH_TAGS && op.op != PatchOpKind::Remove {
            for value in &op.value {
                if !value.contains(':') {
                    return Err(Error::InvalidPatchOperation(format!(
                        "tag value '{value}' is not in key:value format"
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Apply validated patch operations to a metadata copy, updating the
/// modify fields. Fails rather than leave a record without viewers,
/// owners, or legal tags.
pub fn apply_patch_ops(
    metadata: &mut RecordMetadata,
    ops: &[PatchOperation],
    user: &str,
    now: u64,
) -> Result<()> {
    for op in ops {
        match op.path.as_str() {
            PATH_ACL_VIEWERS => apply_to_list(&mut metadata.acl.viewers, op)?,
            PATH_ACL_OWNERS => apply_to_list(&mut metadata.acl.owners, op)?,
            PATH_LEGAL_TAGS => {
                let mut tags: Vec<String> = metadata.legal.legaltags.iter().cloned().collect();
                apply_to_list(&mut tags, op)?;
                metadata.legal.legaltags = tags.into_iter().collect();
            }
            PATH_TAGS => apply_to_tags(&mut metadata.tags, op),
            _ => {
                return Err(Error::InvalidPatchOperation(format!(
                    "invalid path '{}'",
                    op.path
                )))
            }
        }
    }
    metadata.modify_user = Some(user.to_string());
    metadata.modify_time = Some(now);
    Ok(())
}

fn apply_to_list(entries: &mut Vec<String>, op: &PatchOperation) -> Result<()> {
    match op.op {
        PatchOpKind::Add => {
            for value in &op.value {
                if !entries.contains(value) {
                    entries.push(value.clone());
                }
            }
        }
        PatchOpKind::Replace => {
            *entries = op.value.clone();
        }
        PatchOpKind::Remove => {
            entries.retain(|entry| !op.value.contains(entry));
            if entries.is_empty() {
                return Err(Error::InvalidPatchOperation(format!(
                    "cannot remove all entries from '{}'",
                    op.path
                )));
            }
        }
    }
    Ok(())
}

/// Tag add/replace values are `key:value` pairs; remove values are bare keys
fn apply_to_tags(tags: &mut std::collections::BTreeMap<String, String>, op: &PatchOperation) {
    match op.op {
        PatchOpKind::Add => {
            for value in &op.value {
                if let Some((key, val)) = value.split_once(':') {
                    tags.insert(key.to_string(), val.to_string());
                }
            }
        }
        PatchOpKind::Replace => {
            tags.clear();
            for value in &op.value {
                if let Some((key, val)) = value.split_once(':') {
                    tags.insert(key.to_string(), val.to_string());
                }
            }
        }
        PatchOpKind::Remove => {
            for key in &op.value {
                tags.remove(key);
            }
        }
    }
}
