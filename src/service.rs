use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum_server::Handle;
use blob_store::BlobStorage;
use state_store::RegistryState;
use tokio::{self, signal, sync::watch};
use tracing::info;

use super::routes::RouteState;
use crate::{config::ServerConfig, registry::SchemaRegistry, routes::create_routes};

#[derive(Clone)]
#[allow(dead_code)]
pub struct Service {
    pub config: ServerConfig,
    pub shutdown_tx: watch::Sender<()>,
    pub shutdown_rx: watch::Receiver<()>,
    pub state: Arc<RegistryState>,
    pub blob_storage: Arc<BlobStorage>,
    pub registry: Arc<SchemaRegistry>,
}

impl Service {
    pub fn new(config: ServerConfig) -> Result<Self> {
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let blob_storage = Arc::new(
            BlobStorage::new(config.blob_storage.clone())
                .context("error initializing BlobStorage")?,
        );
        let state = RegistryState::new(config.state_store_path.parse()?)
            .context("error initializing state store")?;
        let registry = Arc::new(SchemaRegistry::new(state.clone(), blob_storage.clone()));

        Ok(Self {
            config,
            shutdown_tx,
            shutdown_rx,
            state,
            blob_storage,
            registry,
        })
    }

    pub async fn start(&self) -> Result<()> {
        let route_state = RouteState {
            registry: self.registry.clone(),
            validation: self.config.validation,
            default_uploaded_by: self.config.default_uploaded_by.clone(),
        };

        let handle = Handle::new();
        let handle_sh = handle.clone();
        let shutdown_tx = self.shutdown_tx.clone();
        tokio::spawn(async move {
            shutdown_signal(handle_sh, shutdown_tx).await;
            info!("graceful shutdown signal received, shutting down server gracefully");
        });

        let addr: SocketAddr = self.config.listen_addr.parse()?;
        info!("server api listening on {}", self.config.listen_addr);
        let routes = create_routes(route_state, self.config.max_upload_size_bytes);
        axum_server::bind(addr)
            .handle(handle)
            .serve(routes.into_make_service())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal(handle: Handle, shutdown_tx: watch::Sender<()>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
        },
        _ = terminate => {
        },
    }
    handle.shutdown();
    shutdown_tx.send(()).unwrap();
    info!("signal received, shutting down server gracefully");
}
