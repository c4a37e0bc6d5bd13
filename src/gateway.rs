//! Input gateway
//!
//! Accepts `{"cep": "..."}`, rejects malformed codes locally and forwards the
//! rest to the temperature service, relaying its answer untouched.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::{
    Router,
    routing::{get, post},
};
use opentelemetry::KeyValue;
use opentelemetry_semantic_conventions::trace::{
    HTTP_REQUEST_METHOD, HTTP_RESPONSE_STATUS_CODE, URL_FULL,
};
use reqwest::{Client, Url};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::config::GatewayConfig;
use crate::context::{PROVIDER_TIMEOUT, RequestContext};
use crate::error::{Provider, ResolveError};
use crate::location_resolver::parse_base_url;
use crate::models::{PostalCode, validate};
use crate::trace::{HopSpan, SpanFactory};
use crate::web::{CepRequest, MAX_BODY_BYTES, error_response, inbound_span};

/// Span name for the upstream hop
pub const GATEWAY_SPAN: &str = "gateway_forward";

/// Upstream answer, passed back as is
#[derive(Debug, Clone)]
pub struct Relayed {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

impl IntoResponse for Relayed {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        if let Some(content_type) = self.content_type {
            response.headers_mut().insert(CONTENT_TYPE, content_type);
        }
        response
    }
}

/// Client for the temperature service
pub struct Forwarder {
    client: Client,
    upstream_url: Url,
    spans: SpanFactory,
}

impl Forwarder {
    pub fn new(config: &GatewayConfig, spans: SpanFactory) -> anyhow::Result<Self> {
        let client = Client::builder().user_agent(crate::USER_AGENT).build()?;
        Ok(Self {
            client,
            upstream_url: parse_base_url(&config.upstream_url)?,
            spans,
        })
    }

    /// `{upstream}/temperature?cep=..`
    pub fn temperature_url(&self, code: &PostalCode) -> Url {
        let mut url = self.upstream_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("temperature");
        }
        url.query_pairs_mut().append_pair("cep", code.as_str());
        url
    }

    async fn send(&self, url: Url, span: &HopSpan) -> Result<Relayed, ResolveError> {
        let response = self
            .client
            .get(url)
            .headers(self.spans.outbound_headers(span.context()))
            .send()
            .await
            .map_err(|e| ResolveError::transport(Provider::Upstream, e))?;

        let status = response.status();
        span.set_attribute(KeyValue::new(
            HTTP_RESPONSE_STATUS_CODE,
            i64::from(status.as_u16()),
        ));
        let content_type = response.headers().get(CONTENT_TYPE).cloned();
        let body = response
            .bytes()
            .await
            .map_err(|e| ResolveError::transport(Provider::Upstream, e))?;

        Ok(Relayed {
            status,
            content_type,
            body,
        })
    }

    pub async fn forward(
        &self,
        ctx: &RequestContext,
        code: &PostalCode,
    ) -> Result<Relayed, ResolveError> {
        let hop = ctx.bounded(PROVIDER_TIMEOUT);
        if hop.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }

        let url = self.temperature_url(code);
        let span = self.spans.start_client_span(
            GATEWAY_SPAN,
            hop.trace_context(),
            vec![
                KeyValue::new(HTTP_REQUEST_METHOD, "GET"),
                KeyValue::new(URL_FULL, url.to_string()),
                KeyValue::new("cep", code.to_string()),
            ],
        );

        debug!(url = %url, "Forwarding to temperature service");
        let result = hop.run(self.send(url, &span)).await;
        match &result {
            Ok(relayed) => info!(status = relayed.status.as_u16(), "Upstream answered"),
            Err(e) => warn!(error = %e, "Upstream call failed"),
        }
        span.finish(result)
    }
}

#[derive(Clone)]
pub struct GatewayState {
    forwarder: Arc<Forwarder>,
    spans: SpanFactory,
    request_timeout: Duration,
}

impl GatewayState {
    pub fn new(forwarder: Forwarder, spans: SpanFactory, request_timeout: Duration) -> Self {
        Self {
            forwarder: Arc::new(forwarder),
            spans,
            request_timeout,
        }
    }
}

pub fn router(state: GatewayState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", post(submit))
        .route("/health", get(|| async { "ok" }))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors)
        .with_state(state)
}

async fn submit(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Result<Json<CepRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(error = %rejection, "Unreadable request body");
            return error_response(StatusCode::BAD_REQUEST, "invalid request body");
        }
    };

    let code = match validate(&request.cep) {
        Ok(code) => code,
        Err(e) => return e.into_response(),
    };

    let (span, trace) = inbound_span(
        &state.spans,
        &headers,
        info_span!("gateway_request", cep = %code),
    );
    let ctx = RequestContext::detached(trace).bounded(state.request_timeout);

    match state.forwarder.forward(&ctx, &code).instrument(span).await {
        Ok(relayed) => relayed.into_response(),
        Err(e) => e.into_response(),
    }
}
