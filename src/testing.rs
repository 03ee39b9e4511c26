use anyhow::Result;
use blob_store::BlobStorageConfig;
use tracing::subscriber;
use tracing_subscriber::{layer::SubscriberExt, Layer};

use crate::{config::ServerConfig, routes::RouteState, service::Service};

pub struct TestService {
    pub service: Service,
    // deleted on drop; the stores live inside it
    _temp_dir: tempfile::TempDir,
}

impl TestService {
    pub fn new() -> Result<Self> {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("trace"));
        let _ = subscriber::set_global_default(
            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().with_filter(env_filter)),
        );

        let temp_dir = tempfile::tempdir()?;

        let cfg = ServerConfig {
            state_store_path: temp_dir
                .path()
                .join("state_store")
                .to_str()
                .unwrap()
                .to_string(),
            blob_storage: BlobStorageConfig {
                path: Some(format!(
                    "file://{}",
                    temp_dir.path().join("blob_store").to_str().unwrap()
                )),
            },
            ..Default::default()
        };
        let srv = Service::new(cfg)?;

        Ok(Self {
            service: srv,
            _temp_dir: temp_dir,
        })
    }

    pub fn route_state(&self) -> RouteState {
        RouteState {
            registry: self.service.registry.clone(),
            validation: self.service.config.validation,
            default_uploaded_by: self.service.config.default_uploaded_by.clone(),
        }
    }
}
