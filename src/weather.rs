//! Weather provider client
//!
//! Reads the current Celsius temperature for a locality name from a
//! WeatherAPI-style `current.json` endpoint.

use async_trait::async_trait;
use opentelemetry::KeyValue;
use opentelemetry_semantic_conventions::trace::{
    HTTP_REQUEST_METHOD, HTTP_RESPONSE_STATUS_CODE, URL_FULL,
};
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::config::WeatherConfig;
use crate::context::{PROVIDER_TIMEOUT, RequestContext};
use crate::error::{Provider, ResolveError};
use crate::location_resolver::parse_base_url;
use crate::models::Temperature;
use crate::trace::{HopSpan, SpanFactory, redacted_url};

/// Span name for the weather hop
pub const WEATHER_SPAN: &str = "weather_lookup";

/// Source of current temperatures for locality names
#[async_trait]
pub trait TemperatureProvider: Send + Sync {
    async fn resolve(
        &self,
        ctx: &RequestContext,
        location_name: &str,
    ) -> Result<Temperature, ResolveError>;
}

pub struct TemperatureResolver {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    spans: SpanFactory,
}

/// `current.json` response; only the fields we read
#[derive(Debug, Deserialize)]
struct CurrentResponse {
    current: CurrentConditions,
}

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    temp_c: f64,
}

/// `{base}/v1/current.json?key=..&q=..&aqi=no`
pub fn weather_url(base: &Url, api_key: &str, location_name: &str) -> Url {
    let mut url = base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().extend(["v1", "current.json"]);
    }
    url.query_pairs_mut()
        .append_pair("key", api_key)
        .append_pair("q", location_name)
        .append_pair("aqi", "no");
    url
}

impl TemperatureResolver {
    pub fn new(config: &WeatherConfig, spans: SpanFactory) -> anyhow::Result<Self> {
        let base_url = parse_base_url(&config.base_url)?;

        if config.accept_invalid_certs {
            warn!(
                base_url = %base_url,
                "TLS certificate verification disabled for the weather provider"
            );
        }

        let client = Client::builder()
            .user_agent(crate::USER_AGENT)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone().filter(|key| !key.trim().is_empty()),
            spans,
        })
    }

    async fn fetch(&self, url: Url, span: &HopSpan) -> Result<Temperature, ResolveError> {
        let response = self
            .client
            .get(url)
            .headers(self.spans.outbound_headers(span.context()))
            .send()
            .await
            .map_err(|e| ResolveError::transport(Provider::Weather, e))?;

        span.set_attribute(KeyValue::new(
            HTTP_RESPONSE_STATUS_CODE,
            i64::from(response.status().as_u16()),
        ));

        let body = response
            .error_for_status()
            .map_err(|e| ResolveError::transport(Provider::Weather, e))?
            .bytes()
            .await
            .map_err(|e| ResolveError::transport(Provider::Weather, e))?;

        let payload: CurrentResponse = serde_json::from_slice(&body)
            .map_err(|e| ResolveError::decode(Provider::Weather, e))?;

        Ok(Temperature::from_celsius(payload.current.temp_c))
    }
}

#[async_trait]
impl TemperatureProvider for TemperatureResolver {
    #[instrument(name = "resolve_temperature", level = "debug", skip(self, ctx))]
    async fn resolve(
        &self,
        ctx: &RequestContext,
        location_name: &str,
    ) -> Result<Temperature, ResolveError> {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!("Weather API key is not configured, refusing to call the provider");
            return Err(ResolveError::EmptyApiKey);
        };

        let hop = ctx.bounded(PROVIDER_TIMEOUT);
        if hop.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }

        let url = weather_url(&self.base_url, api_key, location_name);
        let span = self.spans.start_client_span(
            WEATHER_SPAN,
            hop.trace_context(),
            vec![
                KeyValue::new(HTTP_REQUEST_METHOD, "GET"),
                KeyValue::new(URL_FULL, redacted_url(&url, "key")),
                KeyValue::new("location", location_name.to_string()),
            ],
        );

        debug!("Requesting current conditions");
        let result = hop.run(self.fetch(url, &span)).await;
        match &result {
            Ok(temperature) => info!(
                location = location_name,
                temperature = %temperature.format_temperature(),
                "Resolved temperature"
            ),
            Err(e) => warn!(location = location_name, error = %e, "Weather lookup failed"),
        }
        span.finish(result)
    }
}
