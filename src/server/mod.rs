// Chat relay HTTP server
// Exposes the dispatcher and the record collections over JSON routes

mod api_types;
mod handlers;
mod middleware;

pub use api_types::*;
pub use handlers::{create_router, health_check};
pub use middleware::request_logging;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::{Config, DEFAULT_BIND_ADDRESS};
use crate::dispatch::Dispatcher;

/// Configuration for the HTTP server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:3001")
    pub bind_address: String,
    /// Allow cross-origin requests from any origin
    pub cors_permissive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            cors_permissive: true,
        }
    }
}

impl From<&Config> for ServerConfig {
    fn from(config: &Config) -> Self {
        Self {
            bind_address: config.bind_address.clone(),
            cors_permissive: config.cors_permissive,
        }
    }
}

/// Shared server state
pub struct RelayServer {
    dispatcher: Arc<Dispatcher>,
    config: ServerConfig,
    started_at: Instant,
}

impl RelayServer {
    pub fn new(dispatcher: Dispatcher, config: ServerConfig) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            config,
            started_at: Instant::now(),
        }
    }

    /// Build the full application: routes plus tracing and CORS layers
    pub fn app(self: Arc<Self>) -> axum::Router {
        let cors_permissive = self.config.cors_permissive;
        let app = create_router(self)
            .layer(axum::middleware::from_fn(request_logging))
            .layer(TraceLayer::new_for_http());

        if cors_permissive {
            app.layer(CorsLayer::permissive())
        } else {
            app
        }
    }

    /// Start the HTTP server
    pub async fn serve(self) -> Result<()> {
        let addr: SocketAddr = self.config.bind_address.parse()?;
        let app = Arc::new(self).app();

        tracing::info!("Starting chat relay server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
