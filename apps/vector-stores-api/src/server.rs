//! Server initialization and lifecycle management
//!
//! This module handles all server setup:
//! - Tracing initialization
//! - Qdrant connection
//! - Upstage provider setup
//! - Service creation
//! - Router assembly and startup

use std::sync::Arc;

use axum_helpers::{create_app, create_router, health_router};
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_vector_stores::{
    QdrantRepository, UpstageProvider, VectorStoreService, VectorStoresApiDoc,
};
use eyre::WrapErr;
use tracing::info;

use crate::config::Config;

/// Run the REST server
///
/// This is the main entry point for server initialization. It:
/// 1. Sets up structured logging (env-aware: JSON for prod, pretty for dev)
/// 2. Connects to Qdrant
/// 3. Builds the Upstage digitization/embedding provider
/// 4. Creates the repository and service layers
/// 5. Starts the axum server with graceful shutdown
///
/// # Errors
///
/// Returns an error if configuration is invalid, the Qdrant connection
/// fails, or the server fails to bind or serve.
pub async fn run() -> eyre::Result<()> {
    install_color_eyre();

    let config = Config::from_env()?;
    init_tracing(&config.environment);

    info!("Connecting to Qdrant at {}...", config.qdrant.url);
    let repository = QdrantRepository::new(config.qdrant.clone())
        .await
        .wrap_err("Failed to connect to Qdrant")?;
    info!("Connected to Qdrant successfully");

    let embedder = UpstageProvider::new(config.upstage.clone())
        .wrap_err("Failed to build Upstage provider")?;
    info!(
        "Upstage provider configured (dimension {})",
        config.upstage.dimension
    );

    let service = VectorStoreService::new(repository, Arc::new(embedder));

    let api_routes = domain_vector_stores::router(service);
    let router = create_router::<VectorStoresApiDoc>(api_routes).await?;
    let app = router.merge(health_router(config.app.clone()));

    info!(
        "Starting {} v{} on port {}",
        config.app.name, config.app.version, config.server.port
    );

    create_app(app, &config.server)
        .await
        .wrap_err("Server error")?;

    info!("Vector Stores API shutdown complete");
    Ok(())
}
