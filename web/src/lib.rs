//! HTTP surface of the shiftboard real-time service.
//!
//! Serves the SSE endpoint, the health check and the OpenAPI UI. Shutdown
//! closes the broker before the server stops, which ends every open event
//! stream so the graceful shutdown can complete.

use ::sse::Broker;
use axum::http::{HeaderValue, Method};
use log::*;
use service::config::Config;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

mod controller;
mod params;
pub mod router;
mod sse;

// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub broker: Arc<Broker>,
}

impl AppState {
    pub fn new(config: Config, broker: Arc<Broker>) -> Self {
        Self { config, broker }
    }
}

pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let interface = app_state.config.interface.as_deref().unwrap_or("127.0.0.1");
    let listen_addr = format!("{interface}:{}", app_state.config.port);

    info!("Server starting... listening for connections on http://{listen_addr}");

    let listener = TcpListener::bind(&listen_addr).await?;
    let broker = app_state.broker.clone();
    let cors = cors_layer(&app_state.config);
    let router = router::define_routes(app_state).layer(cors);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(broker))
        .await
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin '{origin}': {e}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET])
        .allow_credentials(true)
}

/// Resolves on Ctrl-C or SIGTERM, after the broker has been closed.
async fn shutdown_signal(broker: Arc<Broker>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {e}");
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
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, closing event broker");
    broker.close().await;
}
