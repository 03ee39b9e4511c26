use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, MatchedPath, Path, Request, State},
    http::Method,
    routing::{get, post},
    Json,
    Router,
};
use data_model::{SchemaScope, APP_SCOPE_MARKER};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;

mod download;
mod import;
use download::download_schema_version;
use import::import_schema;

use crate::{
    http_objects::{SchemaHubAPIError, SchemaVersion, SchemaVersionList},
    registry::SchemaRegistry,
    validation::ValidationStrategy,
};

#[derive(OpenApi)]
#[openapi(
        paths(
            import::import_schema,
            latest_schema,
            list_schema_versions,
            get_schema_version,
            download::download_schema_version,
        ),
        components(
            schemas(
                SchemaHubAPIError,
                SchemaVersion,
                SchemaVersionList,
                import::ImportSchemaForm,
            )
        ),
        tags(
            (name = "schemahub", description = "SchemaHub API")
        )
    )]
struct ApiDoc;

#[derive(Clone)]
pub struct RouteState {
    pub registry: Arc<SchemaRegistry>,
    pub validation: ValidationStrategy,
    pub default_uploaded_by: String,
}

pub fn create_routes(route_state: RouteState, max_upload_size_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/openapi.json", get(openapi_spec))
        .route(
            "/api/v1/schemas/import",
            post(import_schema).with_state(route_state.clone()),
        )
        .route(
            "/api/v1/schemas/{application}/{service}/latest",
            get(latest_schema).with_state(route_state.clone()),
        )
        .route(
            "/api/v1/schemas/{application}/{service}/versions",
            get(list_schema_versions).with_state(route_state.clone()),
        )
        .route(
            "/api/v1/schemas/{application}/{service}/versions/{version}",
            get(get_schema_version).with_state(route_state.clone()),
        )
        .route(
            "/api/v1/schemas/{application}/{service}/versions/{version}/download",
            get(download_schema_version).with_state(route_state.clone()),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    let method = req.method();
                    let uri = req.uri();

                    let matched_path = req
                        .extensions()
                        .get::<MatchedPath>()
                        .map(|matched_path| matched_path.as_str());

                    tracing::debug_span!("request", %method, %uri, matched_path)
                })
                .on_failure(()),
        )
        .layer(cors)
        .layer(DefaultBodyLimit::max(max_upload_size_bytes))
}

async fn index() -> Json<serde_json::Value> {
    Json(json!({"service": "schemahub", "status": "ok"}))
}

async fn openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// The reserved marker in the service segment addresses schemas attached to
/// the application itself.
pub(crate) fn path_scope(application: &str, service: &str) -> SchemaScope {
    if service == APP_SCOPE_MARKER {
        SchemaScope::new(application, None)
    } else {
        SchemaScope::new(application, Some(service))
    }
}

/// Latest schema version of a scope
#[utoipa::path(
    get,
    path = "/api/v1/schemas/{application}/{service}/latest",
    tag = "schemahub",
    responses(
        (status = 200, description = "Latest schema version", body = SchemaVersion),
        (status = NOT_FOUND, description = "No schema versions in this scope"),
        (status = INTERNAL_SERVER_ERROR, description = "Internal Server Error")
    ),
)]
async fn latest_schema(
    Path((application, service)): Path<(String, String)>,
    State(state): State<RouteState>,
) -> Result<Json<SchemaVersion>, SchemaHubAPIError> {
    let scope = path_scope(&application, &service);
    let latest = state.registry.latest_schema(&scope)?;
    Ok(Json(latest.into()))
}

/// List schema versions of a scope, newest first
#[utoipa::path(
    get,
    path = "/api/v1/schemas/{application}/{service}/versions",
    tag = "schemahub",
    responses(
        (status = 200, description = "All schema versions", body = SchemaVersionList),
        (status = INTERNAL_SERVER_ERROR, description = "Internal Server Error")
    ),
)]
async fn list_schema_versions(
    Path((application, service)): Path<(String, String)>,
    State(state): State<RouteState>,
) -> Result<Json<SchemaVersionList>, SchemaHubAPIError> {
    let scope = path_scope(&application, &service);
    let versions = state.registry.list_schema_versions(&scope)?;
    Ok(Json(SchemaVersionList {
        versions: versions.into_iter().map(|v| v.into()).collect(),
    }))
}

/// Get one schema version by number
#[utoipa::path(
    get,
    path = "/api/v1/schemas/{application}/{service}/versions/{version}",
    tag = "schemahub",
    responses(
        (status = 200, description = "Schema version", body = SchemaVersion),
        (status = NOT_FOUND, description = "Version does not exist"),
        (status = INTERNAL_SERVER_ERROR, description = "Internal Server Error")
    ),
)]
async fn get_schema_version(
    Path((application, service, version)): Path<(String, String, u64)>,
    State(state): State<RouteState>,
) -> Result<Json<SchemaVersion>, SchemaHubAPIError> {
    let scope = path_scope(&application, &service);
    let schema_version = state.registry.get_schema_version(&scope, version)?;
    Ok(Json(schema_version.into()))
}
