//! # HTTP Server
//!
//! Main HTTP server combining all endpoint routers.
//!
//! This is the unified entry point for the relay API. The aggregator and
//! the settings store are constructed by the composition root (the CLI)
//! and passed in; the server only wires routes around them.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::observability::{Logger, Severity};
use crate::relay::Aggregator;
use crate::settings::SettingsStore;

use super::config::HttpServerConfig;
use super::health_routes::health_routes;
use super::relay_routes::relay_routes;
use super::settings_routes::settings_routes;

/// HTTP server for the relay API
pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
}

impl HttpServer {
    /// Create a server around an aggregator and settings store
    pub fn new(
        config: HttpServerConfig,
        aggregator: Arc<Aggregator>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        let router = Self::build_router(&config, aggregator, settings);
        Self { config, router }
    }

    /// Build the combined router with all endpoints
    fn build_router(
        config: &HttpServerConfig,
        aggregator: Arc<Aggregator>,
        settings: Arc<dyn SettingsStore>,
    ) -> Router {
        // Configure CORS from config
        let cors = if config.cors_origins.is_empty() {
            // If no origins configured, use permissive for development
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            use tower_http::cors::AllowOrigin;
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        let keep_alive = Duration::from_secs(config.keep_alive_secs);

        Router::new()
            // Health check at root level
            .merge(health_routes(Arc::clone(&aggregator)))
            // Event stream and subscription management under /events
            .nest("/events", relay_routes(aggregator, keep_alive))
            // Settings under /api
            .nest("/api", settings_routes(settings))
            .layer(cors)
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Start the HTTP server (async)
    pub async fn start(self) -> Result<(), std::io::Error> {
        let addr: SocketAddr = self.config.socket_addr().parse().map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Invalid socket address: {}", e),
            )
        })?;

        let rendered = addr.to_string();
        Logger::log(Severity::Info, "http.server.started", &[("addr", rendered.as_str())]);

        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, self.router).await?;

        Ok(())
    }
}
