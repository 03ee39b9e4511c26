use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{anyhow, Result};
use requests::{RequestPayload, StateMachineUpdateRequest};
use rocksdb::{ColumnFamilyDescriptor, Options, TransactionDB, TransactionDBOptions};
use state_machine::RegistryObjectsColumns;
use strum::IntoEnumIterator;
use tracing::{debug, info};

pub mod allocator;
pub mod requests;
pub mod scanner;
pub mod serializer;
pub mod state_machine;
pub mod test_state_store;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StateStoreError {
    #[error("version {version} already exists in scope {scope}")]
    VersionExists { scope: String, version: u64 },

    #[error("failed to encode or decode a stored record: {source}")]
    Serialization { source: anyhow::Error },

    #[error(transparent)]
    RocksDBFailure(#[from] rocksdb::Error),
}

impl StateStoreError {
    /// Retryable errors mean a concurrent writer won the race; the caller
    /// should allocate a fresh version number and try again.
    pub fn is_retryable(&self) -> bool {
        match self {
            StateStoreError::VersionExists { .. } => true,
            StateStoreError::RocksDBFailure(err) => matches!(
                err.kind(),
                rocksdb::ErrorKind::Busy |
                    rocksdb::ErrorKind::TryAgain |
                    rocksdb::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}

pub struct RegistryState {
    pub db: Arc<TransactionDB>,
}

impl RegistryState {
    pub fn new(path: PathBuf) -> Result<Arc<Self>> {
        fs::create_dir_all(path.clone())
            .map_err(|e| anyhow!("failed to create state store dir: {}", e))?;
        let sm_column_families = RegistryObjectsColumns::iter()
            .map(|cf| ColumnFamilyDescriptor::new(cf.to_string(), Options::default()));
        let mut db_opts = Options::default();
        db_opts.create_missing_column_families(true);
        db_opts.create_if_missing(true);
        let db = Arc::new(
            TransactionDB::open_cf_descriptors(
                &db_opts,
                &TransactionDBOptions::default(),
                path.clone(),
                sm_column_families,
            )
            .map_err(|e| anyhow!("failed to open state store db: {}", e))?,
        );
        info!("opened registry state store at {:?}", path);
        Ok(Arc::new(Self { db }))
    }

    #[tracing::instrument(skip(self, request), fields(request_type = request.payload.to_string()))]
    pub async fn write(&self, request: StateMachineUpdateRequest) -> Result<(), StateStoreError> {
        debug!("writing state machine update");
        let txn = self.db.transaction();
        match &request.payload {
            RequestPayload::UpsertApplication(req) => {
                state_machine::upsert_application(self.db.clone(), &txn, req)?;
            }
            RequestPayload::UpsertService(req) => {
                state_machine::upsert_service(self.db.clone(), &txn, req)?;
            }
            RequestPayload::CommitSchemaVersion(req) => {
                state_machine::commit_schema_version(self.db.clone(), &txn, req)?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    pub fn reader(&self) -> scanner::StateReader {
        scanner::StateReader::new(self.db.clone())
    }
}
