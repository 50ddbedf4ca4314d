//! Core type definitions for RecordIO
//!
//! This module defines the record data model: the input/output `Record`
//! DTO, the persisted `RecordMetadata`, version-path handling, and the
//! batch types handed between the ingestion pipeline and the persistence
//! coordinator.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Kind naming convention: `authority:source:entityType:M.m.p`
static KIND_PATTERN: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[\w\-\.]+:[\w\-\.]+:[\w\-\.]+:[0-9]+\.[0-9]+\.[0-9]+$")
        .expect("kind pattern is valid")
});

/// Record id convention: `tenant:kindSubType:uniqueId`
static RECORD_ID_PATTERN: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[\w\-\.]+:[\w\-\.]+:[\w\-\.]+$").expect("record id pattern is valid")
});

/// Current wall-clock time as epoch milliseconds
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Check a kind against the namespaced naming convention
#[must_use]
pub fn is_kind_valid(kind: &str) -> bool {
    KIND_PATTERN.is_match(kind)
}

/// The sub-type segment of a kind (`authority:source:entityType:version`)
#[must_use]
pub fn kind_sub_type(kind: &str) -> Option<&str> {
    kind.split(':').nth(2)
}

/// Check a record id for format and tenant prefix only
#[must_use]
pub fn is_record_id_valid_format_and_tenant(id: &str, tenant: &str) -> bool {
    RECORD_ID_PATTERN.is_match(id) && id.split(':').next() == Some(tenant)
}

/// Check a record id against the full `tenant:kindSubType:uniqueId` rule
/// for the given kind
#[must_use]
pub fn is_record_id_valid(id: &str, tenant: &str, kind: &str) -> bool {
    let Some(sub_type) = kind_sub_type(kind) else {
        return false;
    };
    is_record_id_valid_format_and_tenant(id, tenant) && id.split(':').nth(1) == Some(sub_type)
}

/// Generate a fresh record id for the given tenant and kind
#[must_use]
pub fn new_record_id(tenant: &str, kind: &str) -> String {
    let sub_type = kind_sub_type(kind).unwrap_or("unknown");
    format!("{tenant}:{sub_type}:{}", Uuid::new_v4())
}

/// Access control list attached to a record. Entries are group addresses
/// (`group-name@domain`); access comparison is by group name after the
/// domain is stripped.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acl {
    #[serde(default)]
    pub viewers: Vec<String>,
    #[serde(default)]
    pub owners: Vec<String>,
}

impl Acl {
    /// All entries, viewers then owners
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.viewers
            .iter()
            .chain(self.owners.iter())
            .map(String::as_str)
    }

    /// The group name of an ACL entry (segment before the `@`)
    #[must_use]
    pub fn group_name(entry: &str) -> &str {
        entry.split('@').next().unwrap_or(entry)
    }

    /// The domain of an ACL entry (segment after the `@`), if present
    #[must_use]
    pub fn group_domain(entry: &str) -> Option<&str> {
        entry.split_once('@').map(|(_, domain)| domain)
    }
}

/// Legal compliance state of a record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplianceStatus {
    Incompliant,
    Compliant,
}

/// Legal tags and data-residency countries governing a record
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Legal {
    #[serde(default)]
    pub legaltags: BTreeSet<String>,
    #[serde(default)]
    pub other_relevant_data_countries: BTreeSet<String>,
    #[serde(default)]
    pub status: Option<ComplianceStatus>,
}

/// References to the parent record-versions a record was derived from
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ancestry {
    #[serde(default)]
    pub parents: BTreeSet<String>,
}

/// A parent reference split into its bare record id and version
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordIdWithVersion {
    pub record_id: String,
    pub version: u64,
}

impl RecordIdWithVersion {
    /// Parse a parent reference of the form `tenant:kindSubType:uniqueId:version`
    pub fn parse(reference: &str) -> Result<Self> {
        let parts: Vec<&str> = reference.split(':').collect();
        if parts.len() != 4 {
            return Err(Error::InvalidRequest(format!(
                "invalid parent record reference '{reference}': expected id:version"
            )));
        }
        let version = parts[3].parse::<u64>().map_err(|_| {
            Error::InvalidRequest(format!(
                "invalid parent record version in reference '{reference}'"
            ))
        })?;
        Ok(Self {
            record_id: format!("{}:{}:{}", parts[0], parts[1], parts[2]),
            version,
        })
    }
}

/// Input/output record DTO
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Record {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub kind: String,
    pub acl: Acl,
    #[serde(default)]
    pub legal: Legal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ancestry: Option<Ancestry>,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl Record {
    /// The record id, failing if none was assigned yet
    pub fn require_id(&self) -> Result<&str> {
        self.id
            .as_deref()
            .ok_or_else(|| Error::internal("record id not assigned"))
    }

    /// Parent references of this record, if any
    #[must_use]
    pub fn parents(&self) -> Option<&BTreeSet<String>> {
        self.ancestry
            .as_ref()
            .map(|a| &a.parents)
            .filter(|p| !p.is_empty())
    }
}

/// Payload half of a record, stored independently of its metadata
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordData {
    #[serde(default)]
    pub data: serde_json::Value,
}

impl RecordData {
    /// Extract the payload from a record
    #[must_use]
    pub fn from_record(record: &Record) -> Self {
        Self {
            data: record.data.clone(),
        }
    }
}

/// Lifecycle state of persisted record metadata
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Active,
    Deleted,
}

/// Operation performed on a record, carried in change notifications
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Create,
    Update,
    Delete,
    Purge,
}

/// Persisted metadata for one record. `version_paths` is append-only;
/// each entry addresses one historical payload version in the blob store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetadata {
    pub id: String,
    pub kind: String,
    pub acl: Acl,
    pub legal: Legal,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub ancestry: Option<Ancestry>,
    pub status: RecordStatus,
    pub create_user: String,
    pub create_time: u64,
    #[serde(default)]
    pub modify_user: Option<String>,
    #[serde(default)]
    pub modify_time: Option<u64>,
    #[serde(default)]
    pub version_paths: Vec<String>,
}

impl RecordMetadata {
    /// Build metadata from an input record. Create/modify fields and
    /// version paths are filled in by the ingestion pipeline.
    pub fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: record.require_id()?.to_string(),
            kind: record.kind.clone(),
            acl: record.acl.clone(),
            legal: record.legal.clone(),
            tags: record.tags.clone(),
            ancestry: record.ancestry.clone(),
            status: RecordStatus::Active,
            create_user: String::new(),
            create_time: 0,
            modify_user: None,
            modify_time: None,
            version_paths: Vec::new(),
        })
    }

    /// Append the storage path for a new payload version
    pub fn append_version_path(&mut self, version: u64) {
        self.version_paths
            .push(format!("{}/{}/{version}", self.kind, self.id));
    }

    /// The numerically greatest version across all version paths
    #[must_use]
    pub fn latest_version(&self) -> Option<u64> {
        self.version_paths
            .iter()
            .filter_map(|path| parse_path_version(path))
            .max()
    }

    /// The version path addressing the latest version
    #[must_use]
    pub fn latest_version_path(&self) -> Option<&str> {
        let latest = self.latest_version()?;
        self.version_paths
            .iter()
            .find(|path| parse_path_version(path) == Some(latest))
            .map(String::as_str)
    }

    /// Whether any version path encodes the given version
    #[must_use]
    pub fn has_version(&self, version: u64) -> bool {
        self.version_paths
            .iter()
            .any(|path| parse_path_version(path) == Some(version))
    }
}

/// Parse the version timestamp off the end of a `kind/id/version` path
fn parse_path_version(path: &str) -> Option<u64> {
    path.rsplit('/').next()?.parse().ok()
}

/// The unit of work handed to the persistence coordinator
#[derive(Clone, Debug)]
pub struct RecordProcessing {
    pub data: RecordData,
    pub metadata: RecordMetadata,
    pub op_type: OperationType,
}

/// Summary of one ingestion call. `version` is the single timestamp
/// shared by every new version path in the batch.
#[derive(Clone, Debug)]
pub struct TransferInfo {
    pub user: String,
    pub record_count: usize,
    pub version: u64,
    pub skipped_record_ids: Vec<String>,
}

impl TransferInfo {
    /// Create transfer info with a fresh batch version
    #[must_use]
    pub fn new(user: impl Into<String>, record_count: usize) -> Self {
        Self {
            user: user.into(),
            record_count,
            version: now_millis(),
            skipped_record_ids: Vec::new(),
        }
    }
}

/// One batch of records to commit
#[derive(Clone, Debug)]
pub struct TransferBatch {
    pub info: TransferInfo,
    pub records: Vec<RecordProcessing>,
}

/// Change notification published after a successful commit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub id: String,
    pub kind: String,
    pub op: OperationType,
}

/// Kind of a metadata patch operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOpKind {
    Add,
    Replace,
    Remove,
}

/// One partial update applied to record metadata
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOpKind,
    pub path: String,
    pub value: Vec<String>,
}
