use std::sync::Arc;

use anyhow::Result;
use dashmap::DashMap;
use data_model::{SchemaScope, SchemaVersion};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    requests::{CommitSchemaVersionRequest, RequestPayload, StateMachineUpdateRequest},
    RegistryState,
    StateStoreError,
};

/// Allocates version numbers and serializes commits per scope.
///
/// The scope lock makes in-process imports into the same scope take turns
/// across the whole allocate-persist-commit sequence. The keyed existence
/// check inside the commit transaction backstops the lock: a commit that
/// still races another writer surfaces a retryable error instead of a
/// duplicate row.
pub struct VersionAllocator {
    state: Arc<RegistryState>,
    scope_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl VersionAllocator {
    pub fn new(state: Arc<RegistryState>) -> Self {
        Self {
            state,
            scope_locks: DashMap::new(),
        }
    }

    /// Lock entries are created on first use and kept for the life of the
    /// process; there is one per application/service pair.
    pub async fn lock_scope(&self, scope: &SchemaScope) -> OwnedMutexGuard<()> {
        let lock = self
            .scope_locks
            .entry(scope.key())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Next version number for the scope: 1 when the scope is empty, highest
    /// committed version plus one otherwise. The caller must hold the scope
    /// lock for the number to stay theirs until commit.
    pub fn next_version(&self, scope: &SchemaScope) -> Result<u64> {
        let latest = self.state.reader().latest_schema_version(scope)?;
        Ok(latest.map(|v| v.version + 1).unwrap_or(1))
    }

    pub async fn commit_version(
        &self,
        schema_version: SchemaVersion,
    ) -> Result<SchemaVersion, StateStoreError> {
        self.state
            .write(StateMachineUpdateRequest {
                payload: RequestPayload::CommitSchemaVersion(CommitSchemaVersionRequest {
                    schema_version: schema_version.clone(),
                }),
            })
            .await?;
        Ok(schema_version)
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc};

    use data_model::{
        test_objects::tests::{TEST_APPLICATION, TEST_SERVICE},
        SchemaScope,
        SchemaVersionBuilder,
    };

    use super::VersionAllocator;
    use crate::test_state_store::TestStateStore;

    fn version_for(scope: &SchemaScope, version: u64) -> data_model::SchemaVersion {
        SchemaVersionBuilder::default()
            .application(scope.application.clone())
            .service(scope.service.clone())
            .version(version)
            .filename("openapi.json".to_string())
            .path(scope.blob_object_key(version, "openapi.json"))
            .size(64)
            .sha256_hash("0".repeat(64))
            .media_type(data_model::MediaType::Json)
            .uploaded_by(Some("cli".to_string()))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_versions_allocate_sequentially() -> anyhow::Result<()> {
        let store = TestStateStore::new()?;
        let allocator = VersionAllocator::new(store.state.clone());
        let scope = SchemaScope::new(TEST_APPLICATION, Some(TEST_SERVICE));

        assert_eq!(allocator.next_version(&scope)?, 1);
        for expected in 1..=3u64 {
            let _guard = allocator.lock_scope(&scope).await;
            let version = allocator.next_version(&scope)?;
            assert_eq!(version, expected);
            allocator.commit_version(version_for(&scope, version)).await?;
        }
        assert_eq!(allocator.next_version(&scope)?, 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_commits_produce_distinct_versions() -> anyhow::Result<()> {
        let store = TestStateStore::new()?;
        let allocator = Arc::new(VersionAllocator::new(store.state.clone()));
        let scope = SchemaScope::new(TEST_APPLICATION, Some(TEST_SERVICE));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let allocator = allocator.clone();
            let scope = scope.clone();
            handles.push(tokio::spawn(async move {
                let _guard = allocator.lock_scope(&scope).await;
                let version = allocator.next_version(&scope)?;
                allocator.commit_version(version_for(&scope, version)).await?;
                Ok::<u64, anyhow::Error>(version)
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            seen.insert(handle.await??);
        }
        assert_eq!(seen, (1..=8).collect::<HashSet<u64>>());

        let versions = store.state.reader().list_schema_versions(&scope)?;
        assert_eq!(versions.len(), 8);
        assert_eq!(versions.iter().filter(|v| v.active).count(), 1);
        Ok(())
    }
}
