//! End-to-end tests against fake location and weather providers

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use httpmock::prelude::*;
use opentelemetry::Context;
use opentelemetry::trace::{SpanId, TraceId, TracerProvider as _};
use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider};
use serde_json::json;
use tower::ServiceExt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use cep_weather::config::{GatewayConfig, LocationConfig, WeatherConfig};
use cep_weather::gateway::{self, Forwarder, GATEWAY_SPAN, GatewayState};
use cep_weather::location_resolver::LOCATION_SPAN;
use cep_weather::weather::WEATHER_SPAN;
use cep_weather::web::{self, AppState};
use cep_weather::{
    LocationResolver, Orchestrator, RequestContext, ResolutionResult, ResolveError, SpanFactory,
    TemperatureResolver,
};

struct Providers {
    location: MockServer,
    weather: MockServer,
}

impl Providers {
    async fn start() -> Self {
        Self {
            location: MockServer::start_async().await,
            weather: MockServer::start_async().await,
        }
    }

    fn orchestrator(
        &self,
        spans: &SpanFactory,
    ) -> Orchestrator<LocationResolver, TemperatureResolver> {
        let location = LocationConfig {
            base_url: self.location.base_url(),
            accept_invalid_certs: false,
        };
        let weather = WeatherConfig {
            api_key: Some("test-key".to_string()),
            base_url: self.weather.base_url(),
            accept_invalid_certs: false,
        };
        Orchestrator::new(
            LocationResolver::new(&location, spans.clone()).unwrap(),
            TemperatureResolver::new(&weather, spans.clone()).unwrap(),
        )
    }
}

async fn mock_sao_paulo(providers: &Providers) -> (httpmock::Mock<'_>, httpmock::Mock<'_>) {
    let location = providers
        .location
        .mock_async(|when, then| {
            when.method(GET).path("/ws/01001000/json");
            then.status(200).json_body(json!({
                "cep": "01001-000",
                "logradouro": "Praça da Sé",
                "bairro": "Sé",
                "localidade": "São Paulo",
                "uf": "SP"
            }));
        })
        .await;
    let weather = providers
        .weather
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/current.json")
                .query_param("key", "test-key")
                .query_param("q", "São Paulo")
                .query_param("aqi", "no");
            then.status(200).json_body(json!({
                "location": {"name": "Sao Paulo", "country": "Brazil"},
                "current": {"temp_c": 25.0, "temp_f": 77.0, "condition": {"text": "Sunny"}}
            }));
        })
        .await;
    (location, weather)
}

fn ctx() -> RequestContext {
    RequestContext::detached(Context::new())
}

#[tokio::test]
async fn test_resolves_sao_paulo() {
    let providers = Providers::start().await;
    let (location, weather) = mock_sao_paulo(&providers).await;

    let result = providers
        .orchestrator(&SpanFactory::disabled())
        .execute(&ctx(), "01001000")
        .await
        .unwrap();

    location.assert_async().await;
    weather.assert_async().await;
    assert_eq!(
        result,
        ResolutionResult {
            location: "São Paulo".to_string(),
            temp_c: 25.0,
            temp_f: 77.0,
            temp_k: 298.15,
        }
    );
}

#[tokio::test]
async fn test_malformed_code_contacts_nobody() {
    let providers = Providers::start().await;
    let (location, weather) = mock_sao_paulo(&providers).await;

    let err = providers
        .orchestrator(&SpanFactory::disabled())
        .execute(&ctx(), "1234")
        .await
        .unwrap_err();

    assert!(matches!(err, ResolveError::InvalidFormat { .. }));
    location.assert_hits_async(0).await;
    weather.assert_hits_async(0).await;
}

#[tokio::test]
async fn test_unknown_code_never_reaches_weather() {
    let providers = Providers::start().await;
    let location = providers
        .location
        .mock_async(|when, then| {
            when.method(GET).path("/ws/99999999/json");
            then.status(200).json_body(json!({"cep": ""}));
        })
        .await;
    let weather = providers
        .weather
        .mock_async(|when, then| {
            when.method(GET);
            then.status(200).json_body(json!({"current": {"temp_c": 25.0}}));
        })
        .await;

    let err = providers
        .orchestrator(&SpanFactory::disabled())
        .execute(&ctx(), "99999999")
        .await
        .unwrap_err();

    assert!(matches!(err, ResolveError::NotFound { .. }));
    location.assert_async().await;
    weather.assert_hits_async(0).await;
}

#[tokio::test]
async fn test_http_surface_end_to_end() {
    let providers = Providers::start().await;
    mock_sao_paulo(&providers).await;

    let spans = SpanFactory::disabled();
    let app = web::router(AppState::new(
        providers.orchestrator(&spans),
        spans,
        Duration::from_secs(5),
    ));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/temperature?cep=01001000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(
        json,
        json!({"city": "São Paulo", "temp_c": 25.0, "temp_f": 77.0, "temp_k": 298.15})
    );
}

#[tokio::test]
async fn test_gateway_to_service_shares_one_trace() {
    let providers = Providers::start().await;
    mock_sao_paulo(&providers).await;

    let exporter = InMemorySpanExporter::default();
    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(exporter.clone())
        .build();
    let spans = SpanFactory::new(provider.tracer("integration"));

    let service = web::router(AppState::new(
        providers.orchestrator(&spans),
        spans.clone(),
        Duration::from_secs(5),
    ));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let service_addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, service).await.unwrap();
    });

    let gateway_config = GatewayConfig {
        upstream_url: format!("http://{service_addr}"),
        ..GatewayConfig::default()
    };
    let gateway_app = gateway::router(GatewayState::new(
        Forwarder::new(&gateway_config, spans.clone()).unwrap(),
        spans,
        Duration::from_secs(5),
    ));

    let response = gateway_app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"cep": "01001000"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let result: ResolutionResult = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(result.location, "São Paulo");

    let finished = exporter.get_finished_spans().unwrap();
    let find = |name: &str| {
        finished
            .iter()
            .find(|s| s.name == name)
            .unwrap_or_else(|| panic!("missing span {name}"))
    };
    let forward = find(GATEWAY_SPAN);
    let location = find(LOCATION_SPAN);
    let weather = find(WEATHER_SPAN);

    let trace_id = forward.span_context.trace_id();
    assert_eq!(location.span_context.trace_id(), trace_id);
    assert_eq!(weather.span_context.trace_id(), trace_id);
    assert_eq!(location.parent_span_id, forward.span_context.span_id());
    assert_eq!(weather.parent_span_id, forward.span_context.span_id());
}

#[tokio::test]
async fn test_request_span_parents_hop_spans_with_otel_layer() {
    let providers = Providers::start().await;
    mock_sao_paulo(&providers).await;

    let exporter = InMemorySpanExporter::default();
    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(exporter.clone())
        .build();
    let tracer = provider.tracer("integration");
    let _subscriber = tracing_subscriber::registry()
        .with(tracing_opentelemetry::layer().with_tracer(tracer.clone()))
        .set_default();
    let spans = SpanFactory::new(tracer);

    let app = web::router(AppState::new(
        providers.orchestrator(&spans),
        spans,
        Duration::from_secs(5),
    ));
    let response = app
        .oneshot(
            Request::builder()
                .uri("/temperature?cep=01001000")
                .header(
                    "traceparent",
                    "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let finished = exporter.get_finished_spans().unwrap();
    let find = |name: &str| {
        finished
            .iter()
            .find(|s| s.name == name)
            .unwrap_or_else(|| panic!("missing span {name}"))
    };
    let request = find("temperature_request");
    let location = find(LOCATION_SPAN);
    let weather = find(WEATHER_SPAN);

    let trace_id = TraceId::from_hex("4bf92f3577b34da6a3ce929d0e0e4736").unwrap();
    assert_eq!(request.span_context.trace_id(), trace_id);
    assert_eq!(
        request.parent_span_id,
        SpanId::from_hex("00f067aa0ba902b7").unwrap()
    );
    for hop in [location, weather] {
        assert_eq!(hop.span_context.trace_id(), trace_id);
        assert_eq!(hop.parent_span_id, request.span_context.span_id());
    }
}
