use std::{sync::Arc, time::Instant};

use blob_store::BlobStorage;
use bytes::Bytes;
use data_model::{
    validate_entity_name,
    MediaType,
    SchemaScope,
    SchemaVersion,
    SchemaVersionBuilder,
    APP_SCOPE_MARKER,
};
use futures::stream::BoxStream;
use state_store::{
    allocator::VersionAllocator,
    requests::{
        RequestPayload,
        StateMachineUpdateRequest,
        UpsertApplicationRequest,
        UpsertServiceRequest,
    },
    RegistryState,
};
use tracing::{info, warn};

use crate::validation::Verdict;

/// Commit attempts per import before giving up with `StorageContention`.
/// The scope lock serializes in-process imports, so more than one retry is
/// only needed when another process writes to the same store.
const MAX_COMMIT_ATTEMPTS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("{0}")]
    NotFound(String),

    #[error("schema document failed validation: {0}")]
    InvalidSchema(String),

    #[error("content is neither valid JSON nor valid YAML")]
    UnsupportedFormat,

    #[error("invalid {field} name: {reason}")]
    InvalidName {
        field: &'static str,
        reason: &'static str,
    },

    #[error("could not commit a schema version for {scope} after {attempts} attempts")]
    StorageContention { scope: String, attempts: usize },

    #[error("storage failure: {source}")]
    Storage { source: anyhow::Error },
}

/// One uploaded document, already classified and validated by the caller.
/// The registry trusts the media type label and the verdict; it never parses
/// the content itself.
pub struct ImportSchemaRequest {
    pub application: String,
    pub service: Option<String>,
    pub filename: String,
    pub uploaded_by: Option<String>,
    pub content: Bytes,
    pub media_type: MediaType,
    pub verdict: Verdict,
}

pub struct SchemaRegistry {
    state: Arc<RegistryState>,
    blob_storage: Arc<BlobStorage>,
    allocator: VersionAllocator,
}

impl SchemaRegistry {
    pub fn new(state: Arc<RegistryState>, blob_storage: Arc<BlobStorage>) -> Self {
        Self {
            allocator: VersionAllocator::new(state.clone()),
            state,
            blob_storage,
        }
    }

    /// Imports one uploaded document: upsert the owning entities, then
    /// persist the bytes and commit a version row.
    ///
    /// Name checks and the validation verdict are applied before anything is
    /// written, so a rejected document leaves no application, service,
    /// version row or blob behind. The scope lock is held from allocation
    /// through commit; a commit that still loses a race reallocates and
    /// retries.
    pub async fn import_schema(
        &self,
        request: ImportSchemaRequest,
    ) -> Result<SchemaVersion, RegistryError> {
        let import_start = Instant::now();
        validate_entity_name(&request.application).map_err(|reason| {
            RegistryError::InvalidName {
                field: "application",
                reason,
            }
        })?;
        // The marker in the service position addresses the application
        // scope, same as it does in URLs; a Service row named `_app` can
        // never exist.
        let service = request
            .service
            .clone()
            .filter(|s| !s.is_empty() && s != APP_SCOPE_MARKER);
        if let Some(service) = &service {
            validate_entity_name(service).map_err(|reason| RegistryError::InvalidName {
                field: "service",
                reason,
            })?;
        }
        if !request.verdict.accepted {
            return Err(RegistryError::InvalidSchema(
                request
                    .verdict
                    .detail
                    .clone()
                    .unwrap_or_else(|| "rejected".to_string()),
            ));
        }

        self.state
            .write(StateMachineUpdateRequest {
                payload: RequestPayload::UpsertApplication(UpsertApplicationRequest {
                    name: request.application.clone(),
                }),
            })
            .await
            .map_err(|e| RegistryError::Storage { source: e.into() })?;
        if let Some(service) = &service {
            self.state
                .write(StateMachineUpdateRequest {
                    payload: RequestPayload::UpsertService(UpsertServiceRequest {
                        application: request.application.clone(),
                        name: service.clone(),
                    }),
                })
                .await
                .map_err(|e| RegistryError::Storage { source: e.into() })?;
        }

        let scope = SchemaScope::new(&request.application, service.as_deref());
        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let _guard = self.allocator.lock_scope(&scope).await;
            let version = self
                .allocator
                .next_version(&scope)
                .map_err(|source| RegistryError::Storage { source })?;
            let object_key = scope.blob_object_key(version, &request.filename);
            let put_result = self
                .blob_storage
                .put(&object_key, request.content.clone())
                .await
                .map_err(|source| RegistryError::Storage { source })?;
            let schema_version = SchemaVersionBuilder::default()
                .application(request.application.clone())
                .service(service.clone())
                .version(version)
                .filename(request.filename.clone())
                .path(put_result.url)
                .size(put_result.size_bytes)
                .sha256_hash(put_result.sha256_hash)
                .media_type(request.media_type)
                .uploaded_by(request.uploaded_by.clone())
                .build()
                .map_err(|source| RegistryError::Storage { source })?;

            match self.allocator.commit_version(schema_version).await {
                Ok(committed) => {
                    info!(
                        scope = %scope,
                        version = committed.version,
                        media_type = %committed.media_type,
                        elapsed_ms = import_start.elapsed().as_millis() as u64,
                        "imported schema version"
                    );
                    return Ok(committed);
                }
                Err(err) if err.is_retryable() => {
                    warn!(
                        scope = %scope,
                        attempt,
                        "schema version commit raced a concurrent writer, retrying: {}",
                        err
                    );
                    continue;
                }
                Err(err) => {
                    return Err(RegistryError::Storage { source: err.into() });
                }
            }
        }
        Err(RegistryError::StorageContention {
            scope: scope.to_string(),
            attempts: MAX_COMMIT_ATTEMPTS,
        })
    }

    pub fn latest_schema(&self, scope: &SchemaScope) -> Result<SchemaVersion, RegistryError> {
        self.state
            .reader()
            .latest_schema_version(scope)
            .map_err(|source| RegistryError::Storage { source })?
            .ok_or_else(|| RegistryError::NotFound(format!("no schema versions for {}", scope)))
    }

    pub fn get_schema_version(
        &self,
        scope: &SchemaScope,
        version: u64,
    ) -> Result<SchemaVersion, RegistryError> {
        self.state
            .reader()
            .get_schema_version(scope, version)
            .map_err(|source| RegistryError::Storage { source })?
            .ok_or_else(|| {
                RegistryError::NotFound(format!("schema version {} of {} not found", version, scope))
            })
    }

    /// Versions of a scope, newest first. An unknown scope lists as empty
    /// rather than erroring.
    pub fn list_schema_versions(
        &self,
        scope: &SchemaScope,
    ) -> Result<Vec<SchemaVersion>, RegistryError> {
        let mut versions = self
            .state
            .reader()
            .list_schema_versions(scope)
            .map_err(|source| RegistryError::Storage { source })?;
        versions.reverse();
        Ok(versions)
    }

    /// Opens the stored bytes of one version. Metadata is resolved first so
    /// an unknown version is NotFound; a missing blob behind committed
    /// metadata is a storage failure.
    pub async fn download_schema(
        &self,
        scope: &SchemaScope,
        version: u64,
    ) -> Result<(BoxStream<'static, anyhow::Result<Bytes>>, SchemaVersion), RegistryError> {
        let schema_version = self.get_schema_version(scope, version)?;
        let stream = self
            .blob_storage
            .get(&schema_version.path)
            .await
            .map_err(|source| RegistryError::Storage { source })?;
        Ok((stream, schema_version))
    }
}
