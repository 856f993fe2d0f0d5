//! Server instance management

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use herbswap_core::FormulaDatabase;

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::handlers::{create_router, AppState};

/// Herbswap HTTP server
///
/// Loads the formula database once at startup and serves the search API
/// and the embedded form until shutdown.
pub struct HerbswapServer {
    /// Server configuration
    config: ServerConfig,

    /// Loaded formula database
    database: Arc<FormulaDatabase>,
}

impl HerbswapServer {
    /// Create a new server instance, validating the config and loading the
    /// database file it points at.
    pub fn new(config: ServerConfig) -> Result<Self, ApiError> {
        if let Err(e) = config.validate() {
            return Err(ApiError::internal(format!("Invalid config: {}", e)));
        }

        let database = FormulaDatabase::from_file(&config.database_path).map_err(|e| {
            error!("Failed to load database {}: {}", config.database_path, e);
            ApiError::internal(format!("Failed to load database: {}", e))
        })?;
        info!(
            "Loaded {} formulas from {}",
            database.len(),
            config.database_path
        );

        Ok(Self {
            config,
            database: Arc::new(database),
        })
    }

    /// Server instance over an already-loaded database (tests, embedding).
    pub fn with_database(config: ServerConfig, database: FormulaDatabase) -> Self {
        Self {
            config,
            database: Arc::new(database),
        }
    }

    /// Get socket address for binding
    pub fn socket_addr(&self) -> Result<SocketAddr, ApiError> {
        self.config
            .socket_addr()
            .map_err(|e| ApiError::internal(format!("Failed to parse address: {}", e)))
    }

    /// Start the server and run until it fails.
    pub async fn start(&self) -> Result<(), ApiError> {
        let addr = self.socket_addr()?;

        let state = AppState {
            database: Arc::clone(&self.database),
            config: Arc::new(self.config.clone()),
        };

        let mut cors = CorsLayer::new();
        for origin in &self.config.cors_origins {
            match origin.parse::<HeaderValue>() {
                Ok(value) => cors = cors.allow_origin(value),
                Err(_) => error!("Ignoring invalid CORS origin: {}", origin),
            }
        }

        let app = create_router()
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(state);

        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            error!("Failed to bind to {}: {:?}", addr, e);
            ApiError::internal(format!("Failed to bind to {}: {}", addr, e))
        })?;

        info!("Server listening on: {}", self.config.server_url());

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ApiError::internal(format!("Server error: {}", e)))
    }

    /// Get server URL
    #[must_use]
    pub fn server_url(&self) -> String {
        self.config.server_url()
    }
}

/// Completes when Ctrl+C or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
                info!("Received TERM signal");
            }
            Err(e) => error!("Failed to install TERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_with_database() {
        let database = FormulaDatabase::from_compositions([(
            "桂枝湯".to_string(),
            [("桂枝", 0.6)].into_iter().collect(),
        )]);
        let server = HerbswapServer::with_database(ServerConfig::default(), database);
        assert!(server.socket_addr().is_ok());
        assert_eq!(
            server.server_url(),
            format!("http://{}:{}", crate::config::DEFAULT_HOST, crate::config::DEFAULT_PORT)
        );
    }

    #[test]
    fn test_server_rejects_missing_database_file() {
        let config = ServerConfig {
            database_path: "/nonexistent/database.yaml".to_string(),
            ..Default::default()
        };
        assert!(HerbswapServer::new(config).is_err());
    }
}
