use std::sync::Arc;

use anyhow::Result;
use data_model::{Application, SchemaScope, SchemaVersion, Service};
use rocksdb::{Direction, IteratorMode, ReadOptions, TransactionDB};
use serde::de::DeserializeOwned;

use crate::{
    serializer::{JsonEncode, JsonEncoder},
    state_machine::RegistryObjectsColumns,
};

pub struct StateReader {
    db: Arc<TransactionDB>,
}

impl StateReader {
    pub fn new(db: Arc<TransactionDB>) -> Self {
        Self { db }
    }

    pub fn get_from_cf<T, K>(&self, column: &RegistryObjectsColumns, key: K) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        K: AsRef<[u8]>,
    {
        let result_bytes = match self.db.get_cf(&column.cf_db(&self.db), key)? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        let result = JsonEncoder::decode::<T>(&result_bytes)?;
        Ok(Some(result))
    }

    /// Scans rows under a key prefix, deserializing each value. Returns the
    /// rows and, when a limit cut the scan short, the key to restart from.
    pub fn get_rows_from_cf_with_limits<V>(
        &self,
        key_prefix: &[u8],
        restart_key: Option<&[u8]>,
        column: RegistryObjectsColumns,
        limit: Option<usize>,
    ) -> Result<(Vec<V>, Option<Vec<u8>>)>
    where
        V: DeserializeOwned,
    {
        let cf_handle = column.cf_db(&self.db);
        let mut read_options = ReadOptions::default();
        read_options.set_readahead_size(4_194_304);
        let mode = match restart_key {
            Some(restart_key) => IteratorMode::From(restart_key, Direction::Forward),
            None => IteratorMode::From(key_prefix, Direction::Forward),
        };
        let iter = self.db.iterator_cf_opt(&cf_handle, read_options, mode);

        let limit = limit.unwrap_or(usize::MAX);
        let mut items = Vec::new();
        let mut next_restart_key = None;
        for kv in iter {
            let (key, value) = kv?;
            if !key.starts_with(key_prefix) {
                break;
            }
            if items.len() < limit {
                items.push(JsonEncoder::decode::<V>(&value)?);
            } else {
                next_restart_key.replace(key.into_vec());
                break;
            }
        }
        Ok((items, next_restart_key))
    }

    pub fn get_application(&self, name: &str) -> Result<Option<Application>> {
        self.get_from_cf(&RegistryObjectsColumns::Applications, name)
    }

    pub fn get_service(&self, application: &str, name: &str) -> Result<Option<Service>> {
        self.get_from_cf(
            &RegistryObjectsColumns::Services,
            Service::key_from(application, name),
        )
    }

    pub fn get_schema_version(
        &self,
        scope: &SchemaScope,
        version: u64,
    ) -> Result<Option<SchemaVersion>> {
        self.get_from_cf(
            &RegistryObjectsColumns::SchemaVersions,
            SchemaVersion::key_from(scope, version),
        )
    }

    /// All versions of a scope, ascending by version number. Version keys
    /// are zero padded so the lexicographic scan order is the numeric one.
    pub fn list_schema_versions(&self, scope: &SchemaScope) -> Result<Vec<SchemaVersion>> {
        let prefix = scope.version_key_prefix();
        let (versions, _) = self.get_rows_from_cf_with_limits::<SchemaVersion>(
            prefix.as_bytes(),
            None,
            RegistryObjectsColumns::SchemaVersions,
            None,
        )?;
        Ok(versions)
    }

    pub fn latest_schema_version(&self, scope: &SchemaScope) -> Result<Option<SchemaVersion>> {
        Ok(self.list_schema_versions(scope)?.pop())
    }

    pub fn active_schema_version(&self, scope: &SchemaScope) -> Result<Option<SchemaVersion>> {
        Ok(self
            .list_schema_versions(scope)?
            .into_iter()
            .find(|version| version.active))
    }
}
