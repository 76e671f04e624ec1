// src/lib.rs
use std::sync::Arc;

pub mod analytics;
pub mod cli;
pub mod config;
pub mod cvss;
pub mod error;
pub mod findings;
pub mod middleware;
pub mod models;
pub mod permissions;
pub mod routes;
pub mod store;

// Re-exported so integration tests can build routers easily.
pub use config::Config;
pub use error::{AnalyticsError, Result};

use analytics::{AnalyticsEngine, AnalyticsSettings};
use permissions::PermissionService;
use store::DocumentStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn DocumentStore>,
    pub permissions: PermissionService,
    pub engine: AnalyticsEngine,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn DocumentStore>) -> Self {
        let engine = AnalyticsEngine::new(store.clone(), AnalyticsSettings::from(&config));
        Self {
            permissions: PermissionService::new(store.clone()),
            engine,
            store,
            config,
        }
    }
}

pub mod server {
    use std::sync::Arc;

    use crate::store::MemoryStore;

    /// Seeds the in-memory store from `AUDITBOARD_SEED_FILE` when set.
    pub fn load_store(config: &crate::Config) -> anyhow::Result<MemoryStore> {
        match &config.seed_file {
            Some(path) => {
                tracing::info!("Loading seed data from {}", path.display());
                MemoryStore::from_seed_file(path)
            }
            None => {
                tracing::warn!("No AUDITBOARD_SEED_FILE configured, starting with an empty store");
                Ok(MemoryStore::new())
            }
        }
    }

    pub fn init_tracing() {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "auditboard=debug,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init();
    }

    pub async fn run_server(port: u16) -> anyhow::Result<()> {
        init_tracing();

        let mut config = crate::Config::from_env()?;
        config.port = port;

        let store = Arc::new(load_store(&config)?);
        let state = crate::AppState::new(config.clone(), store);
        let app = crate::routes::create_router(state);

        let listener = tokio::net::TcpListener::bind(&format!("0.0.0.0:{}", port)).await?;
        tracing::info!("Server starting on port {} ({})", port, config.base_url);

        axum::serve(listener, app).await?;
        Ok(())
    }
}
