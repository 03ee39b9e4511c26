use axum::{
    body::Body,
    extract::{Path, State},
    response::Response,
};

use super::{path_scope, RouteState};
use crate::http_objects::SchemaHubAPIError;

/// Download the stored bytes of one schema version
#[utoipa::path(
    get,
    path = "/api/v1/schemas/{application}/{service}/versions/{version}/download",
    tag = "schemahub",
    responses(
        (status = 200, description = "Raw schema document"),
        (status = NOT_FOUND, description = "Version does not exist"),
        (status = INTERNAL_SERVER_ERROR, description = "Internal Server Error")
    ),
)]
pub async fn download_schema_version(
    Path((application, service, version)): Path<(String, String, u64)>,
    State(state): State<RouteState>,
) -> Result<Response<Body>, SchemaHubAPIError> {
    let scope = path_scope(&application, &service);
    let (storage_reader, metadata) = state.registry.download_schema(&scope, version).await?;

    Response::builder()
        .header("Content-Type", metadata.media_type.content_type())
        .header("Content-Length", metadata.size.to_string())
        .header(
            "Content-Disposition",
            format!("attachment; filename=\"{}\"", metadata.filename),
        )
        .body(Body::from_stream(storage_reader))
        .map_err(|e| SchemaHubAPIError::internal_error_str(&e.to_string()))
}

#[cfg(test)]
mod tests {
    use axum::extract::{Path, State};
    use bytes::Bytes;
    use data_model::test_objects::tests::OPENAPI_JSON_DOC;

    use super::download_schema_version;
    use crate::{routes::import::import_uploaded_schema, testing::TestService};

    #[tokio::test]
    async fn test_download_returns_original_bytes() -> anyhow::Result<()> {
        let test_srv = TestService::new()?;
        let route_state = test_srv.route_state();
        import_uploaded_schema(
            &route_state,
            "demoapp".to_string(),
            Some("svc1".to_string()),
            None,
            Some("openapi.json".to_string()),
            Bytes::from_static(OPENAPI_JSON_DOC.as_bytes()),
        )
        .await?;

        let response = download_schema_version(
            Path(("demoapp".to_string(), "svc1".to_string(), 1)),
            State(route_state.clone()),
        )
        .await
        .expect("download must resolve");
        assert_eq!(
            response.headers().get("Content-Type").unwrap(),
            "application/json"
        );
        assert_eq!(
            response.headers().get("Content-Length").unwrap(),
            &OPENAPI_JSON_DOC.len().to_string()
        );
        assert_eq!(
            response.headers().get("Content-Disposition").unwrap(),
            "attachment; filename=\"openapi.json\""
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body must collect");
        assert_eq!(body, Bytes::from_static(OPENAPI_JSON_DOC.as_bytes()));

        let missing = download_schema_version(
            Path(("demoapp".to_string(), "svc1".to_string(), 5)),
            State(route_state),
        )
        .await;
        assert!(missing.is_err());
        Ok(())
    }
}
