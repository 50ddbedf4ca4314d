//! RecordIO Core - record lifecycle and consistency engine
//!
//! Ties the metadata repository, blob store, message bus, and external
//! authorization/compliance providers together into the record lifecycle:
//! batch ingestion with versioning and legal inheritance, the two-phase
//! commit with compensation, optimistic-concurrency bulk patching, and
//! soft-delete/purge.

pub mod bulk;
pub mod duplicate;
pub mod ingest;
pub mod legal;
pub mod lifecycle;
pub mod patch;
pub mod persistence;

pub use bulk::{BulkPatchCoordinator, PatchOutcome};
pub use duplicate::DuplicateDetector;
pub use ingest::IngestionPipeline;
pub use legal::{InvalidTag, LegalComplianceResolver, LegalTagValidator};
pub use lifecycle::RecordLifecycleManager;
pub use persistence::PersistenceCoordinator;
