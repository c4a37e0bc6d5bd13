//! HTTP surface of the temperature service

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::{Router, routing::get};
use opentelemetry::trace::TraceContextExt;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{Instrument, error, info, info_span, warn};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::config::TlsConfig;
use crate::context::RequestContext;
use crate::error::ResolveError;
use crate::location_resolver::LocationProvider;
use crate::orchestrator::Orchestrator;
use crate::trace::SpanFactory;
use crate::weather::TemperatureProvider;

/// Largest request body accepted, in bytes
pub const MAX_BODY_BYTES: usize = 16 * 1024;

/// Grace period for in-flight requests once shutdown starts
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// `{"cep": "..."}` body or `?cep=` query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CepRequest {
    #[serde(default)]
    pub cep: String,
}

/// Body of every non-200 answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            message: message.into(),
        }),
    )
        .into_response()
}

impl IntoResponse for ResolveError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            info!(error = %self, status = status.as_u16(), "Request rejected");
        }
        error_response(status, self.user_message())
    }
}

/// Open the inbound request span under `headers`' trace context and return it
/// with the context hop spans should be parented to.
pub(crate) fn inbound_span(
    spans: &SpanFactory,
    headers: &HeaderMap,
    span: tracing::Span,
) -> (tracing::Span, opentelemetry::Context) {
    let remote = spans.extract(headers);
    let _ = span.set_parent(remote.clone());
    let cx = span.context();
    // Without the OpenTelemetry layer installed the span has no otel side.
    let trace = if cx.span().span_context().is_valid() {
        cx
    } else {
        remote
    };
    (span, trace)
}

pub struct AppState<L, T> {
    orchestrator: Arc<Orchestrator<L, T>>,
    spans: SpanFactory,
    request_timeout: Duration,
}

impl<L, T> Clone for AppState<L, T> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: Arc::clone(&self.orchestrator),
            spans: self.spans.clone(),
            request_timeout: self.request_timeout,
        }
    }
}

impl<L, T> AppState<L, T>
where
    L: LocationProvider + 'static,
    T: TemperatureProvider + 'static,
{
    pub fn new(
        orchestrator: Orchestrator<L, T>,
        spans: SpanFactory,
        request_timeout: Duration,
    ) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            spans,
            request_timeout,
        }
    }

    async fn resolve(&self, headers: &HeaderMap, raw_code: &str) -> Response {
        let (span, trace) = inbound_span(
            &self.spans,
            headers,
            info_span!("temperature_request", cep = %raw_code),
        );
        let ctx = RequestContext::detached(trace).bounded(self.request_timeout);

        match self
            .orchestrator
            .execute(&ctx, raw_code)
            .instrument(span)
            .await
        {
            Ok(result) => (StatusCode::OK, Json(result)).into_response(),
            Err(e) => e.into_response(),
        }
    }
}

pub fn router<L, T>(state: AppState<L, T>) -> Router
where
    L: LocationProvider + 'static,
    T: TemperatureProvider + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/temperature",
            get(get_temperature::<L, T>).post(post_temperature::<L, T>),
        )
        .route("/health", get(health))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors)
        .with_state(state)
}

async fn get_temperature<L, T>(
    State(state): State<AppState<L, T>>,
    headers: HeaderMap,
    Query(request): Query<CepRequest>,
) -> Response
where
    L: LocationProvider + 'static,
    T: TemperatureProvider + 'static,
{
    state.resolve(&headers, &request.cep).await
}

async fn post_temperature<L, T>(
    State(state): State<AppState<L, T>>,
    headers: HeaderMap,
    body: Result<Json<CepRequest>, JsonRejection>,
) -> Response
where
    L: LocationProvider + 'static,
    T: TemperatureProvider + 'static,
{
    match body {
        Ok(Json(request)) => state.resolve(&headers, &request.cep).await,
        Err(rejection) => {
            warn!(error = %rejection, "Unreadable request body");
            error_response(StatusCode::BAD_REQUEST, "invalid request body")
        }
    }
}

async fn health() -> &'static str {
    "ok"
}

/// Resolves on Ctrl-C
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Serve `app` on `bind_address` until `shutdown` resolves, over TLS when
/// `tls` is given.
pub async fn serve<F>(
    bind_address: &str,
    tls: Option<&TlsConfig>,
    app: Router,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = bind_address
        .parse()
        .with_context(|| format!("Invalid bind address: {bind_address}"))?;

    match tls {
        Some(tls) => serve_tls(addr, tls, app, shutdown).await,
        None => {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind {addr}"))?;
            info!("Listening on http://{}", listener.local_addr()?);
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
                .context("Server error")
        }
    }
}

#[cfg(feature = "tls")]
async fn serve_tls<F>(
    addr: SocketAddr,
    tls: &TlsConfig,
    app: Router,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    use axum_server::Handle;
    use axum_server::tls_rustls::RustlsConfig;

    let rustls = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
        .await
        .with_context(|| {
            format!(
                "Failed to load TLS certificate {} / key {}",
                tls.cert_path.display(),
                tls.key_path.display()
            )
        })?;

    let handle = Handle::new();
    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        shutdown.await;
        shutdown_handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
    });

    info!("Listening on https://{addr}");
    axum_server::bind_rustls(addr, rustls)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .context("Server error")
}

#[cfg(not(feature = "tls"))]
async fn serve_tls<F>(
    _addr: SocketAddr,
    _tls: &TlsConfig,
    _app: Router,
    _shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    anyhow::bail!("TLS is configured but this binary was built without the `tls` feature")
}
