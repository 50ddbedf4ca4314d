//! Persistent metadata repository backed by redb.
//!
//! One table of bincode-encoded `RecordMetadata` rows keyed by record id.
//! All writes are synchronous (write txn + commit). The optimistic-lock
//! update reads, compares, and writes inside a single write transaction,
//! so conflict detection is atomic with the mutation.

use crate::traits::MetadataRepository;
use async_trait::async_trait;
use recordio_common::{Error, RecordMetadata, Result};
use redb::{Database, ReadableTable, TableDefinition};
use std::collections::HashMap;
use std::path::Path;

const RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("records");

/// Error type for redb repository operations
#[derive(Debug, thiserror::Error)]
pub enum RedbRepositoryError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::DatabaseError),
    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("redb transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<redb::TransactionError> for RedbRepositoryError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Transaction(Box::new(e))
    }
}

impl From<RedbRepositoryError> for Error {
    fn from(e: RedbRepositoryError) -> Self {
        Error::Internal(format!("metadata repository: {e}"))
    }
}

/// Persistent metadata repository backed by redb
pub struct RedbMetadataRepository {
    db: Database,
}

impl RedbMetadataRepository {
    /// Open (or create) the redb database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(RedbRepositoryError::from)?;
        }
        let db = Database::create(path).map_err(RedbRepositoryError::from)?;

        // Create the table eagerly so later read txns don't fail
        let result: std::result::Result<(), RedbRepositoryError> = (|| {
            let write_txn = db.begin_write()?;
            {
                let _t = write_txn.open_table(RECORDS)?;
            }
            write_txn.commit()?;
            Ok(())
        })();
        result?;

        Ok(Self { db })
    }

    fn get_sync(&self, id: &str) -> std::result::Result<Option<RecordMetadata>, RedbRepositoryError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(RECORDS)?;
        match table.get(id)? {
            Some(value) => Ok(Some(bincode::deserialize(value.value())?)),
            None => Ok(None),
        }
    }

    fn upsert_sync(
        &self,
        records: &[RecordMetadata],
    ) -> std::result::Result<(), RedbRepositoryError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(RECORDS)?;
            for record in records {
                let bytes = bincode::serialize(record)?;
                table.insert(record.id.as_str(), bytes.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }
}

#[async_trait]
impl MetadataRepository for RedbMetadataRepository {
    async fn get(&self, id: &str) -> Result<Option<RecordMetadata>> {
        Ok(self.get_sync(id)?)
    }

    async fn get_many(&self, ids: &[String]) -> Result<HashMap<String, RecordMetadata>> {
        let mut result = HashMap::new();
        let read_txn = self.db.begin_read().map_err(RedbRepositoryError::from)?;
        let table = read_txn
            .open_table(RECORDS)
            .map_err(RedbRepositoryError::from)?;
        for id in ids {
            if let Some(value) = table.get(id.as_str()).map_err(RedbRepositoryError::from)? {
                let meta: RecordMetadata =
                    bincode::deserialize(value.value()).map_err(RedbRepositoryError::from)?;
                result.insert(id.clone(), meta);
            }
        }
        Ok(result)
    }

    async fn upsert(&self, records: Vec<RecordMetadata>) -> Result<()> {
        Ok(self.upsert_sync(&records)?)
    }

    async fn update_with_lock(
        &self,
        records: Vec<RecordMetadata>,
        expected: &HashMap<String, Option<u64>>,
    ) -> Result<Vec<String>> {
        let mut locked = Vec::new();
        let write_txn = self.db.begin_write().map_err(RedbRepositoryError::from)?;
        {
            let mut table = write_txn
                .open_table(RECORDS)
                .map_err(RedbRepositoryError::from)?;
            for record in &records {
                if let Some(Some(version)) = expected.get(&record.id) {
                    // Read and compare against the same snapshot the write
                    // goes through, then drop the guard before mutating
                    let current = match table
                        .get(record.id.as_str())
                        .map_err(RedbRepositoryError::from)?
                    {
                        Some(value) => {
                            let stored: RecordMetadata = bincode::deserialize(value.value())
                                .map_err(RedbRepositoryError::from)?;
                            stored.latest_version()
                        }
                        None => None,
                    };
                    if current != Some(*version) {
                        locked.push(record.id.clone());
                        continue;
                    }
                }
                let bytes = bincode::serialize(record).map_err(RedbRepositoryError::from)?;
                table
                    .insert(record.id.as_str(), bytes.as_slice())
                    .map_err(RedbRepositoryError::from)?;
            }
        }
        write_txn.commit().map_err(RedbRepositoryError::from)?;
        Ok(locked)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let result: std::result::Result<(), RedbRepositoryError> = (|| {
            let write_txn = self.db.begin_write()?;
            {
                let mut table = write_txn.open_table(RECORDS)?;
                table.remove(id)?;
            }
            write_txn.commit()?;
            Ok(())
        })();
        Ok(result?)
    }
}
