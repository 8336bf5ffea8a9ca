// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};

use crate::application::cleaning_service::CleaningService;
use crate::application::detection::Detector;
use crate::application::entity_service::EntityService;
use crate::infrastructure::config::{config_path, load_cleaner_config, TomlEntityStore};
use crate::infrastructure::influx_repository::InfluxRepository;
use crate::presentation::app_state::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let path = config_path();
    let config = load_cleaner_config(&path)?;
    tracing::info!(
        "Loaded {} with {} entities, suppression {:?}",
        path.display(),
        config.entities.len(),
        config.detection.suppression
    );

    // Create repository (infrastructure layer)
    let repository = Arc::new(InfluxRepository::new(&config.influx));

    // Create services (application layer)
    let detector = Detector::new(config.detection.suppression.policy());
    let cleaning_service = CleaningService::new(repository, detector);
    let entity_service = EntityService::new(
        config.entities.clone(),
        Arc::new(TomlEntityStore::new(path)),
    );

    let state = Arc::new(AppState {
        cleaning_service,
        entity_service,
        scan_defaults: config.detection.scan_defaults(),
    });

    // Build router (presentation layer)
    let router = presentation::router(state);

    // Start server
    let addr: SocketAddr = config.server.bind.parse()?;
    tracing::info!("Starting influx-cleaner on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
