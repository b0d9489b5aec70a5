//! HTTP status server with graceful shutdown

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

use crate::http_api::{create_router, AppState};

/// Status server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub addr: SocketAddr,
}

impl ServerConfig {
    /// Parse the bind address
    pub fn from_address(address: &str) -> runtime_core::Result<Self> {
        let addr = address.parse().map_err(|e| runtime_core::Error::InvalidConfig {
            message: format!("invalid bind address {:?}: {}", address, e),
        })?;
        Ok(Self { addr })
    }
}

/// Serves the status API until `shutdown` resolves
pub struct StatusServer {
    config: ServerConfig,
    state: AppState,
}

impl StatusServer {
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Run the server until `shutdown` completes
    pub async fn run<F>(self, shutdown: F) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.addr).await?;
        info!(address = %self.config.addr, "Status API listening");

        axum::serve(listener, create_router(self.state))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| {
                error!(error = %e, "Status server error");
                Box::new(e) as Box<dyn std::error::Error + Send + Sync>
            })?;

        info!("Status API shutdown complete");
        Ok(())
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
