use std::sync::Arc;

use data_model::{Application, SchemaVersion, Service};
use rocksdb::{
    AsColumnFamilyRef,
    BoundColumnFamily,
    Direction,
    IteratorMode,
    ReadOptions,
    Transaction,
    TransactionDB,
};
use strum::AsRefStr;

use crate::{
    requests::{CommitSchemaVersionRequest, UpsertApplicationRequest, UpsertServiceRequest},
    serializer::{JsonEncode, JsonEncoder},
    StateStoreError,
};

#[derive(AsRefStr, strum::Display, strum::EnumIter)]
pub enum RegistryObjectsColumns {
    Applications,   //  ApplicationName -> Application
    Services,       //  ApplicationName|ServiceName -> Service
    SchemaVersions, //  ApplicationName|ServiceSegment|ZeroPaddedVersion -> SchemaVersion
}

impl RegistryObjectsColumns {
    pub fn cf_db<'a>(&'a self, db: &'a TransactionDB) -> Arc<BoundColumnFamily<'a>> {
        db.cf_handle(self.as_ref())
            .unwrap_or_else(|| panic!("failed to get column family handle for {}", self))
    }
}

pub(crate) fn upsert_application(
    db: Arc<TransactionDB>,
    txn: &Transaction<TransactionDB>,
    req: &UpsertApplicationRequest,
) -> Result<(), StateStoreError> {
    let cf = RegistryObjectsColumns::Applications.cf_db(&db);
    // Exclusive lock on the key so two concurrent creates serialize; the
    // row written first wins and keeps its created_at.
    let existing = txn.get_for_update_cf(&cf, &req.name, true)?;
    if existing.is_some() {
        return Ok(());
    }
    let application = Application::new(&req.name);
    let serialized = JsonEncoder::encode(&application)
        .map_err(|source| StateStoreError::Serialization { source })?;
    txn.put_cf(&cf, application.key(), serialized)?;
    Ok(())
}

pub(crate) fn upsert_service(
    db: Arc<TransactionDB>,
    txn: &Transaction<TransactionDB>,
    req: &UpsertServiceRequest,
) -> Result<(), StateStoreError> {
    let cf = RegistryObjectsColumns::Services.cf_db(&db);
    let key = Service::key_from(&req.application, &req.name);
    let existing = txn.get_for_update_cf(&cf, &key, true)?;
    if existing.is_some() {
        return Ok(());
    }
    let service = Service::new(&req.application, &req.name);
    let serialized = JsonEncoder::encode(&service)
        .map_err(|source| StateStoreError::Serialization { source })?;
    txn.put_cf(&cf, key, serialized)?;
    Ok(())
}

/// Inserts a new schema version and deactivates every prior active version
/// of the same scope, all within the caller's transaction.
///
/// The version key is locked and checked for existence first, so a commit
/// that raced another writer to the same number fails with a retryable
/// [`StateStoreError::VersionExists`] instead of clobbering the winner.
pub(crate) fn commit_schema_version(
    db: Arc<TransactionDB>,
    txn: &Transaction<TransactionDB>,
    req: &CommitSchemaVersionRequest,
) -> Result<(), StateStoreError> {
    let cf = RegistryObjectsColumns::SchemaVersions.cf_db(&db);
    let schema_version = &req.schema_version;
    let scope = schema_version.scope();
    let key = schema_version.key();

    let existing = txn.get_for_update_cf(&cf, &key, true)?;
    if existing.is_some() {
        return Err(StateStoreError::VersionExists {
            scope: scope.to_string(),
            version: schema_version.version,
        });
    }

    let prefix = scope.version_key_prefix();
    let mut active_rows = Vec::new();
    for kv in make_prefix_iterator(txn, &cf, prefix.as_bytes(), &None) {
        let (row_key, row_value) = kv?;
        let prior: SchemaVersion = JsonEncoder::decode(&row_value)
            .map_err(|source| StateStoreError::Serialization { source })?;
        if prior.active {
            active_rows.push((row_key, prior));
        }
    }
    for (row_key, mut prior) in active_rows {
        prior.active = false;
        let serialized = JsonEncoder::encode(&prior)
            .map_err(|source| StateStoreError::Serialization { source })?;
        txn.put_cf(&cf, row_key, serialized)?;
    }

    let serialized = JsonEncoder::encode(schema_version)
        .map_err(|source| StateStoreError::Serialization { source })?;
    txn.put_cf(&cf, key, serialized)?;
    Ok(())
}

pub fn make_prefix_iterator<'a>(
    txn: &'a Transaction<TransactionDB>,
    cf_handle: &impl AsColumnFamilyRef,
    prefix: &'a [u8],
    restart_key: &'a Option<Vec<u8>>,
) -> impl Iterator<Item = Result<(Box<[u8]>, Box<[u8]>), StateStoreError>> + 'a {
    let mut read_options = ReadOptions::default();
    read_options.set_readahead_size(4_194_304);
    let iterator_mode = match restart_key {
        Some(restart_key) => IteratorMode::From(restart_key, Direction::Forward),
        None => IteratorMode::From(prefix, Direction::Forward),
    };
    txn.iterator_cf_opt(cf_handle, read_options, iterator_mode)
        .map(|kv| kv.map_err(StateStoreError::from))
        .take_while(move |kv| {
            kv.as_ref()
                .map(|(key, _)| key.starts_with(prefix))
                .unwrap_or(true)
        })
}
