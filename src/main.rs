use anyhow::{Context, Result};
use tracing::{info, warn};

use cep_weather::config::ServiceConfig;
use cep_weather::web::{self, AppState};
use cep_weather::{LocationResolver, Orchestrator, TemperatureResolver, VERSION, telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServiceConfig::load().context("Failed to load configuration")?;
    let (telemetry, spans) = telemetry::init(&config.logging, &config.telemetry)?;

    info!(version = VERSION, "Starting temperature service");
    if config.weather.api_key.is_none() {
        warn!("No weather API key configured, temperature lookups will fail");
    }

    let locations = LocationResolver::new(&config.location, spans.clone())?;
    let temperatures = TemperatureResolver::new(&config.weather, spans.clone())?;
    let state = AppState::new(
        Orchestrator::new(locations, temperatures),
        spans,
        config.server.request_timeout(),
    );

    let result = web::serve(
        &config.server.bind_address,
        config.server.tls.as_ref(),
        web::router(state),
        web::shutdown_signal(),
    )
    .await;

    info!("Temperature service stopped");
    telemetry.shutdown();
    result
}
