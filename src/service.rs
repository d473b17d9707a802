use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum_server::Handle;
use blob_store::BlobStoreDispatcher;
use bundler::Orchestrator;
use lookup_index::build_lookup_index;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    config::ServerConfig,
    metrics::init_provider,
    routes::{create_routes, RouteState},
};

pub struct Service {
    pub config: ServerConfig,
    pub orchestrator: Arc<Orchestrator>,
    pub shutdown: CancellationToken,
    meter_provider: Option<SdkMeterProvider>,
}

impl Service {
    pub async fn new(config: ServerConfig) -> Result<Self> {
        let meter_provider =
            init_provider(&config.telemetry, &config.env, env!("CARGO_PKG_VERSION"))
                .context("error initializing metrics")?;
        let meter = opentelemetry::global::meter("bundle-server");
        let blob_store = Arc::new(
            BlobStoreDispatcher::new_with_metrics(config.blob_storage.clone(), &meter)
                .await
                .context("error initializing blob store")?,
        );
        let lookup_index = build_lookup_index(&config.lookup_index)
            .await
            .context("error initializing lookup index")?;
        let orchestrator = Arc::new(Orchestrator::new(
            lookup_index,
            blob_store,
            config.bundler.clone(),
        ));

        Ok(Self {
            config,
            orchestrator,
            shutdown: CancellationToken::new(),
            meter_provider,
        })
    }

    pub fn route_state(&self) -> RouteState {
        RouteState {
            orchestrator: self.orchestrator.clone(),
            shutdown: self.shutdown.clone(),
        }
    }

    /// Flush pending metrics and stop the exporter.
    pub fn shutdown_metrics(&self) {
        if let Some(provider) = &self.meter_provider {
            if let Err(e) = provider.shutdown() {
                warn!("failed to flush metrics: {:?}", e);
            }
        }
    }

    pub async fn start(&self) -> Result<()> {
        let handle = Handle::new();
        let handle_sh = handle.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal(handle_sh, shutdown).await;
            info!("graceful shutdown signal received, shutting down server gracefully");
        });

        let addr: SocketAddr = self.config.listen_addr.parse()?;
        info!("server api listening on {}", self.config.listen_addr);
        let routes = create_routes(self.route_state());
        axum_server::bind(addr)
            .handle(handle)
            .serve(routes.into_make_service())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal(handle: Handle, shutdown: CancellationToken) {
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
    shutdown.cancel();
    info!("signal received, shutting down server gracefully");
}
