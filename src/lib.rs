pub mod api;
pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod seed;
pub mod store;

// Export API types
pub use api::handlers;
pub use api::routes;

pub use error::{DocumentError, DocumentResult};

pub use logic::{DocumentService, TraversalEngine};

// Export all model types
pub use model::*;

// Export store types
pub use store::{EntityStore, MemoryStore, PostgresStore};

use std::sync::Arc;

use crate::config::{AppConfig, StoreBackend};

/// Builds the configured store, applies seed data and serves until shutdown.
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    match config.store.backend {
        StoreBackend::Memory => {
            log::info!("Using in-memory store");
            serve_with(Arc::new(MemoryStore::new()), &config).await
        }
        StoreBackend::Postgres => {
            log::info!("Connecting to PostgreSQL...");
            let database_url = config.database_url()?;
            let postgres_store = PostgresStore::new(&database_url, config.max_connections()).await?;

            log::info!("Running database migrations...");
            postgres_store.migrate().await?;

            serve_with(Arc::new(postgres_store), &config).await
        }
    }
}

async fn serve_with<S: EntityStore + 'static>(store: Arc<S>, config: &AppConfig) -> anyhow::Result<()> {
    use axum::serve;
    use tokio::net::TcpListener;

    // Load seed data for demonstration (optional)
    if std::env::var("LOAD_SEED_DATA").unwrap_or_default() == "true" {
        log::info!("Loading seed data...");
        seed::load_seed_data(&*store).await?;
    }

    let app = api::routes::create_router().with_state(store);

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    log::info!("Catalog server running on http://{}", bind_address);

    serve(listener, app).await?;

    Ok(())
}
