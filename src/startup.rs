//! Application Startup
//!
//! Application building and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use futures::future::join_all;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::services::{ConnectionRegistry, RelayConsumer, RelayGateway};
use crate::config::Settings;
use crate::domain::Directory;
use crate::infrastructure::broker::{self, BrokerClient};
use crate::infrastructure::repositories;
use crate::presentation::http::handlers::health;
use crate::presentation::http::routes;
use crate::presentation::middleware::{logging, IdentityProvider, JwtIdentityProvider};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ConnectionRegistry>,
    pub gateway: Arc<RelayGateway>,
    pub broker: Arc<dyn BrokerClient>,
    pub directory: Arc<dyn Directory>,
    pub identity_provider: Arc<dyn IdentityProvider>,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Connect the adapters selected by configuration
    pub async fn build(settings: Settings) -> Result<Self> {
        let directory = repositories::create_directory(&settings.directory).await?;
        tracing::info!(backend = ?settings.directory.backend, "Directory ready");

        let broker = broker::create_broker(&settings.broker).await?;
        tracing::info!(backend = ?settings.broker.backend, "Broker ready");

        Ok(Self::from_parts(settings, broker, directory))
    }

    /// Assemble state around already constructed adapters
    pub fn from_parts(
        settings: Settings,
        broker: Arc<dyn BrokerClient>,
        directory: Arc<dyn Directory>,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let gateway = Arc::new(RelayGateway::new(
            registry.clone(),
            broker.clone(),
            directory.clone(),
            settings.relay.clone(),
        ));
        let identity_provider = Arc::new(JwtIdentityProvider::new(&settings.jwt));

        Self {
            registry,
            gateway,
            broker,
            directory,
            identity_provider,
            settings: Arc::new(settings),
        }
    }

    /// Consumer feeding this node's registry
    pub fn consumer(&self) -> RelayConsumer {
        RelayConsumer::new(
            self.registry.clone(),
            self.broker.clone(),
            Duration::from_millis(self.settings.relay.delivery_timeout_ms),
            Duration::from_millis(self.settings.broker.read_retry_backoff_ms),
        )
    }
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
    state: AppState,
    shutdown: CancellationToken,
    consumers: Vec<JoinHandle<()>>,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        let state = AppState::build(settings).await?;
        Self::with_state(state).await
    }

    /// Build around prepared state, start the consumers and bind the listener
    pub async fn with_state(state: AppState) -> Result<Self> {
        health::init_server_start();

        let router = routes::create_router(state.clone()).layer(logging::create_trace_layer());

        let shutdown = CancellationToken::new();
        let consumers = Arc::new(state.consumer()).spawn(shutdown.clone());

        let addr: SocketAddr = state.settings.server.socket_addr()?;
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            router,
            state,
            shutdown,
            consumers,
        })
    }

    /// Run the server until Ctrl-C, SIGTERM or `shutdown_token` fires,
    /// then stop the consumers.
    pub async fn run_until_stopped(self) -> Result<()> {
        let signal_token = self.shutdown.clone();
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown_signal(signal_token).await;
                tracing::info!("Shutdown signal received, starting graceful shutdown...");
            })
            .await?;

        self.shutdown.cancel();
        for result in join_all(self.consumers).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Relay consumer task failed");
            }
        }

        tracing::info!("Server stopped");
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Token that stops the server when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }
}

/// Wait for Ctrl+C, SIGTERM or cancellation
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = cancel.cancelled() => {},
    }
}
