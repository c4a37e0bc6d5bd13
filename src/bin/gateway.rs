use anyhow::{Context, Result};
use tracing::info;

use cep_weather::config::ServiceConfig;
use cep_weather::gateway::{self, Forwarder, GatewayState};
use cep_weather::{VERSION, telemetry, web};

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = ServiceConfig::load().context("Failed to load configuration")?;
    if config.telemetry.service_name == cep_weather::SERVICE_NAME {
        config.telemetry.service_name = format!("{}-gateway", cep_weather::SERVICE_NAME);
    }
    let (telemetry, spans) = telemetry::init(&config.logging, &config.telemetry)?;

    info!(
        version = VERSION,
        upstream = %config.gateway.upstream_url,
        "Starting input gateway"
    );

    let forwarder = Forwarder::new(&config.gateway, spans.clone())?;
    let state = GatewayState::new(forwarder, spans, config.gateway.request_timeout());

    let result = web::serve(
        &config.gateway.bind_address,
        None,
        gateway::router(state),
        web::shutdown_signal(),
    )
    .await;

    info!("Input gateway stopped");
    telemetry.shutdown();
    result
}
