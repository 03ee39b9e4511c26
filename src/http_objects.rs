use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

use crate::registry::RegistryError;

#[derive(Debug, ToSchema, Serialize, Deserialize)]
pub struct SchemaHubAPIError {
    #[serde(skip)]
    status_code: StatusCode,
    message: String,
}

impl SchemaHubAPIError {
    pub fn new(status_code: StatusCode, message: &str) -> Self {
        Self {
            status_code,
            message: message.to_string(),
        }
    }

    pub fn internal_error(e: anyhow::Error) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string().as_str())
    }

    pub fn internal_error_str(e: &str) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, e)
    }

    pub fn not_found(message: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn conflict(message: &str) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }
}

impl IntoResponse for SchemaHubAPIError {
    fn into_response(self) -> Response {
        error!("API Error: {} - {}", self.status_code, self.message);
        (self.status_code, self.message).into_response()
    }
}

impl From<RegistryError> for SchemaHubAPIError {
    fn from(err: RegistryError) -> Self {
        let message = err.to_string();
        match err {
            RegistryError::NotFound(_) => Self::not_found(&message),
            RegistryError::InvalidSchema(_) |
            RegistryError::UnsupportedFormat |
            RegistryError::InvalidName { .. } => Self::bad_request(&message),
            RegistryError::StorageContention { .. } => Self::conflict(&message),
            RegistryError::Storage { .. } => Self::internal_error_str(&message),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SchemaVersion {
    pub application: String,
    pub service: Option<String>,
    pub version: u64,
    pub filename: String,
    pub media_type: String,
    pub size: u64,
    pub sha256_hash: String,
    pub uploaded_by: Option<String>,
    pub created_at: u64,
    pub active: bool,
}

impl From<data_model::SchemaVersion> for SchemaVersion {
    fn from(version: data_model::SchemaVersion) -> Self {
        Self {
            application: version.application,
            service: version.service,
            version: version.version,
            filename: version.filename,
            media_type: version.media_type.to_string(),
            size: version.size,
            sha256_hash: version.sha256_hash,
            uploaded_by: version.uploaded_by,
            created_at: version.created_at,
            active: version.active,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SchemaVersionList {
    pub versions: Vec<SchemaVersion>,
}

#[cfg(test)]
mod tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use super::SchemaHubAPIError;
    use crate::registry::RegistryError;

    #[test]
    fn test_registry_errors_map_to_status_codes() {
        let cases = vec![
            (
                RegistryError::NotFound("missing".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                RegistryError::InvalidSchema("no marker".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (RegistryError::UnsupportedFormat, StatusCode::BAD_REQUEST),
            (
                RegistryError::InvalidName {
                    field: "application",
                    reason: "name cannot be empty",
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                RegistryError::StorageContention {
                    scope: "demoapp/svc1".to_string(),
                    attempts: 3,
                },
                StatusCode::CONFLICT,
            ),
            (
                RegistryError::Storage {
                    source: anyhow::anyhow!("disk gone"),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            let api_error: SchemaHubAPIError = err.into();
            let response = api_error.into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
