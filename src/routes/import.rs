use axum::{
    extract::{Multipart, State},
    Json,
};
use bytes::Bytes;
use data_model::SchemaVersion;
use utoipa::ToSchema;

use super::RouteState;
use crate::{
    document,
    http_objects::{self, SchemaHubAPIError},
    registry::{ImportSchemaRequest, RegistryError},
};

#[allow(dead_code)]
#[derive(ToSchema)]
pub struct ImportSchemaForm {
    application: String,
    service: Option<String>,
    uploaded_by: Option<String>,
    #[schema(format = "binary")]
    file: String,
}

/// Import a schema document
#[utoipa::path(
    post,
    path = "/api/v1/schemas/import",
    tag = "schemahub",
    request_body(content_type = "multipart/form-data", content = inline(ImportSchemaForm)),
    responses(
        (status = 200, description = "Schema version committed", body = http_objects::SchemaVersion),
        (status = BAD_REQUEST, description = "Malformed upload or rejected document"),
        (status = CONFLICT, description = "Too many concurrent writers for this scope"),
        (status = INTERNAL_SERVER_ERROR, description = "Internal Server Error")
    ),
)]
pub async fn import_schema(
    State(state): State<RouteState>,
    mut form: Multipart,
) -> Result<Json<http_objects::SchemaVersion>, SchemaHubAPIError> {
    let mut application: Option<String> = None;
    let mut service: Option<String> = None;
    let mut uploaded_by: Option<String> = None;
    let mut filename: Option<String> = None;
    let mut content: Option<Bytes> = None;

    while let Some(field) = form
        .next_field()
        .await
        .map_err(|e| SchemaHubAPIError::internal_error(anyhow::anyhow!(e)))?
    {
        let Some(name) = field.name().map(|n| n.to_string()) else {
            continue;
        };
        match name.as_str() {
            "file" => {
                filename = field.file_name().map(|f| f.to_string());
                content = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| SchemaHubAPIError::bad_request(&e.to_string()))?,
                );
            }
            "application" => {
                application = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| SchemaHubAPIError::bad_request(&e.to_string()))?,
                );
            }
            "service" => {
                service = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| SchemaHubAPIError::bad_request(&e.to_string()))?,
                );
            }
            "uploaded_by" => {
                uploaded_by = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| SchemaHubAPIError::bad_request(&e.to_string()))?,
                );
            }
            _ => {}
        }
    }

    let application =
        application.ok_or_else(|| SchemaHubAPIError::bad_request("application field is required"))?;
    let content = content.ok_or_else(|| SchemaHubAPIError::bad_request("file field is required"))?;

    let committed =
        import_uploaded_schema(&state, application, service, uploaded_by, filename, content)
            .await?;
    Ok(Json(committed.into()))
}

/// Classifies and validates the uploaded bytes, then hands both results to
/// the registry together with the raw content.
pub(crate) async fn import_uploaded_schema(
    state: &RouteState,
    application: String,
    service: Option<String>,
    uploaded_by: Option<String>,
    filename: Option<String>,
    content: Bytes,
) -> Result<SchemaVersion, RegistryError> {
    let document = document::classify(&content).ok_or(RegistryError::UnsupportedFormat)?;
    let verdict = state.validation.validate(&document.value);
    state
        .registry
        .import_schema(ImportSchemaRequest {
            application,
            service,
            filename: filename.unwrap_or_else(|| "schema".to_string()),
            uploaded_by: Some(uploaded_by.unwrap_or_else(|| state.default_uploaded_by.clone())),
            content,
            media_type: document.media_type,
            verdict,
        })
        .await
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use data_model::{
        test_objects::tests::{OPENAPI_JSON_DOC, OPENAPI_YAML_DOC},
        MediaType,
        SchemaScope,
    };

    use super::import_uploaded_schema;
    use crate::{
        registry::RegistryError,
        routes::RouteState,
        testing::TestService,
        validation::ValidationStrategy,
    };

    async fn import(
        route_state: &RouteState,
        application: &str,
        service: Option<&str>,
        content: &str,
    ) -> Result<data_model::SchemaVersion, RegistryError> {
        import_uploaded_schema(
            route_state,
            application.to_string(),
            service.map(|s| s.to_string()),
            None,
            Some("openapi.json".to_string()),
            Bytes::from(content.to_string()),
        )
        .await
    }

    #[tokio::test]
    async fn test_unsupported_format_leaves_no_rows() -> anyhow::Result<()> {
        let test_srv = TestService::new()?;
        let route_state = test_srv.route_state();
        let err = import_uploaded_schema(
            &route_state,
            "demoapp".to_string(),
            Some("svc1".to_string()),
            None,
            Some("blob.bin".to_string()),
            Bytes::from_static(&[0x00, 0xff, 0xfe, 0x00]),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RegistryError::UnsupportedFormat));

        let reader = test_srv.service.state.reader();
        assert!(reader.get_application("demoapp")?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_rejected_document_reports_detail() -> anyhow::Result<()> {
        let test_srv = TestService::new()?;
        let err = import(
            &test_srv.route_state(),
            "demoapp",
            Some("svc1"),
            "{\"title\": \"plain json\"}",
        )
        .await
        .unwrap_err();
        match err {
            RegistryError::InvalidSchema(detail) => {
                assert!(detail.contains("openapi or swagger"));
            }
            other => panic!("expected InvalidSchema, got {:?}", other),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_filename_and_uploader_get_defaults() -> anyhow::Result<()> {
        let test_srv = TestService::new()?;
        let committed = import_uploaded_schema(
            &test_srv.route_state(),
            "demoapp".to_string(),
            None,
            None,
            None,
            Bytes::from_static(OPENAPI_JSON_DOC.as_bytes()),
        )
        .await?;
        assert_eq!(committed.filename, "schema");
        assert_eq!(committed.uploaded_by, Some("cli".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_explicit_uploader_wins_over_default() -> anyhow::Result<()> {
        let test_srv = TestService::new()?;
        let committed = import_uploaded_schema(
            &test_srv.route_state(),
            "demoapp".to_string(),
            Some("svc1".to_string()),
            Some("release-bot".to_string()),
            Some("openapi.json".to_string()),
            Bytes::from_static(OPENAPI_JSON_DOC.as_bytes()),
        )
        .await?;
        assert_eq!(committed.uploaded_by, Some("release-bot".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_structural_strategy_applies_to_imports() -> anyhow::Result<()> {
        let test_srv = TestService::new()?;
        let route_state = RouteState {
            validation: ValidationStrategy::Structural,
            ..test_srv.route_state()
        };

        let err = import(&route_state, "demoapp", None, "{\"swagger\": \"2.0\"}")
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidSchema(_)));

        let committed = import(&route_state, "demoapp", None, OPENAPI_JSON_DOC).await?;
        assert_eq!(committed.version, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_yaml_upload_is_labelled_yaml() -> anyhow::Result<()> {
        let test_srv = TestService::new()?;
        let committed = import(&test_srv.route_state(), "demoapp", Some("svc1"), OPENAPI_YAML_DOC)
            .await?;
        assert_eq!(committed.media_type, MediaType::Yaml);
        Ok(())
    }

    #[tokio::test]
    async fn test_reimport_deactivates_previous_version() -> anyhow::Result<()> {
        let test_srv = TestService::new()?;
        let route_state = test_srv.route_state();
        import(&route_state, "demoapp", Some("svc1"), OPENAPI_JSON_DOC).await?;
        import(&route_state, "demoapp", Some("svc1"), OPENAPI_JSON_DOC).await?;

        let scope = SchemaScope::new("demoapp", Some("svc1"));
        let versions = route_state.registry.list_schema_versions(&scope).unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].version, 2);
        assert!(versions[0].active);
        assert!(!versions[1].active);
        Ok(())
    }
}
