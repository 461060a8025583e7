//! Capacity API - namespace cost finalization service

use anyhow::Result;
use capacity_api::{api, config};
use capacity_core::{
    health::{components, HealthRegistry},
    observability::{CapacityMetrics, StructuredLogger},
    OrganizationDirectory,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting capacity-api");

    let config = config::ServiceConfig::load()?;
    info!(port = config.port, environment = %config.environment, "Service configured");

    let health_registry = HealthRegistry::new();
    health_registry.register(components::COST_ENGINE).await;
    health_registry.register(components::ORG_DIRECTORY).await;

    let metrics = CapacityMetrics::new();
    let logger = StructuredLogger::new(&config.instance);
    logger.log_startup(SERVICE_VERSION, &config.environment);

    let directory = OrganizationDirectory::load_or_builtin(&config.org_mapping_path);
    logger.log_directory_loaded(directory.source().label(), directory.entries().len());
    if directory.is_builtin() {
        health_registry
            .set_degraded(components::ORG_DIRECTORY, "Using built-in directory")
            .await;
    }

    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics,
        logger.clone(),
        directory,
        config.environment.clone(),
    ));

    health_registry.set_ready(true).await;

    let server = tokio::spawn(api::serve(config.port, app_state));

    tokio::select! {
        result = server => {
            match result {
                Ok(Ok(())) => logger.log_shutdown("server exited"),
                Ok(Err(e)) => {
                    error!(error = %e, "API server failed");
                    logger.log_shutdown("server error");
                    return Err(e);
                }
                Err(e) => {
                    error!(error = %e, "API server task panicked");
                    logger.log_shutdown("server task aborted");
                    return Err(e.into());
                }
            }
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
            info!("Shutting down");
        }
    }

    Ok(())
}
