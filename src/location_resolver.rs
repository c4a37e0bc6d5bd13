//! Location Resolution Module
//!
//! Turns a validated postal code into a locality name through the ViaCEP-style
//! location provider. Every call is bounded, traced and cancellable.

use async_trait::async_trait;
use opentelemetry::KeyValue;
use opentelemetry_semantic_conventions::trace::{
    HTTP_REQUEST_METHOD, HTTP_RESPONSE_STATUS_CODE, URL_FULL,
};
use reqwest::{Client, Url};
use serde::{Deserialize, Deserializer};
use tracing::{debug, info, warn};

use crate::config::LocationConfig;
use crate::context::{PROVIDER_TIMEOUT, RequestContext};
use crate::error::{Provider, ResolveError};
use crate::models::{Location, PostalCode};
use crate::trace::SpanFactory;

/// Span name for the location hop
pub const LOCATION_SPAN: &str = "location_lookup";

/// Source of locations for postal codes
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn resolve(
        &self,
        ctx: &RequestContext,
        code: &PostalCode,
    ) -> Result<Location, ResolveError>;
}

/// Location provider client
pub struct LocationResolver {
    client: Client,
    base_url: Url,
    spans: SpanFactory,
}

/// Location provider response.
///
/// A miss comes back as `{"erro": true}` (or `"true"`) with no other fields.
#[derive(Debug, Deserialize)]
struct ViaCepResponse {
    #[serde(default)]
    cep: String,
    #[serde(default)]
    localidade: Option<String>,
    #[serde(default)]
    logradouro: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    erro: bool,
}

fn deserialize_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(flag) => Ok(flag),
        Flag::Text(text) => match text.as_str() {
            "true" => Ok(true),
            "false" | "" => Ok(false),
            other => Err(serde::de::Error::invalid_value(
                serde::de::Unexpected::Str(other),
                &"a boolean or \"true\"/\"false\"",
            )),
        },
    }
}

impl ViaCepResponse {
    fn into_location(self, code: &PostalCode) -> Result<Location, ResolveError> {
        if self.erro || self.cep.is_empty() {
            return Err(ResolveError::not_found(code.as_str()));
        }
        match self.localidade {
            Some(name) if !name.is_empty() => Ok(Location::new(code.clone(), name)),
            _ => Err(ResolveError::decode(
                Provider::Location,
                <serde_json::Error as serde::de::Error>::missing_field("localidade"),
            )),
        }
    }
}

/// `{base}/ws/{code}/json`
pub fn location_url(base: &Url, code: &PostalCode) -> Url {
    let mut url = base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().extend(["ws", code.as_str(), "json"]);
    }
    url
}

impl LocationResolver {
    /// Create a new location provider client
    pub fn new(config: &LocationConfig, spans: SpanFactory) -> anyhow::Result<Self> {
        let base_url = parse_base_url(&config.base_url)?;

        if config.accept_invalid_certs {
            warn!(
                base_url = %base_url,
                "TLS certificate verification disabled for the location provider"
            );
        }

        let client = Client::builder()
            .user_agent(crate::USER_AGENT)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self {
            client,
            base_url,
            spans,
        })
    }

    async fn fetch(
        &self,
        url: Url,
        code: &PostalCode,
        span: &crate::trace::HopSpan,
    ) -> Result<Location, ResolveError> {
        let response = self
            .client
            .get(url)
            .headers(self.spans.outbound_headers(span.context()))
            .send()
            .await
            .map_err(|e| ResolveError::transport(Provider::Location, e))?;

        let status = response.status();
        span.set_attribute(KeyValue::new(
            HTTP_RESPONSE_STATUS_CODE,
            i64::from(status.as_u16()),
        ));
        debug!(%status, "Location provider responded");

        // The body decides not-found, whatever the status says.
        let body = response
            .bytes()
            .await
            .map_err(|e| ResolveError::transport(Provider::Location, e))?;

        let payload: ViaCepResponse = serde_json::from_slice(&body)
            .map_err(|e| ResolveError::decode(Provider::Location, e))?;
        debug!(
            street = payload.logradouro.as_deref().unwrap_or_default(),
            "Decoded location payload"
        );

        payload.into_location(code)
    }
}

#[async_trait]
impl LocationProvider for LocationResolver {
    async fn resolve(
        &self,
        ctx: &RequestContext,
        code: &PostalCode,
    ) -> Result<Location, ResolveError> {
        let hop = ctx.bounded(PROVIDER_TIMEOUT);
        if hop.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }

        let url = location_url(&self.base_url, code);
        let span = self.spans.start_client_span(
            LOCATION_SPAN,
            hop.trace_context(),
            vec![
                KeyValue::new(HTTP_REQUEST_METHOD, "GET"),
                KeyValue::new(URL_FULL, url.to_string()),
                KeyValue::new("cep", code.to_string()),
            ],
        );

        debug!(cep = %code, "Resolving location");
        let result = hop.run(self.fetch(url, code, &span)).await;
        match &result {
            Ok(location) => info!(cep = %code, location = %location.name, "Resolved location"),
            Err(e) => warn!(cep = %code, error = %e, "Location lookup failed"),
        }
        span.finish(result)
    }
}

pub(crate) fn parse_base_url(raw: &str) -> anyhow::Result<Url> {
    let url = Url::parse(raw).map_err(|e| anyhow::anyhow!("Invalid base URL '{raw}': {e}"))?;
    if url.cannot_be_a_base() {
        anyhow::bail!("Base URL '{raw}' cannot carry a path");
    }
    Ok(url)
}
