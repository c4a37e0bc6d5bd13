//! Span plumbing shared by every outbound call
//!
//! A [`SpanFactory`] is handed to each resolver at construction. It starts
//! client spans under the request's trace context and moves W3C trace-context
//! headers in and out of HTTP header maps. Nothing here touches the
//! process-global tracer or propagator.

use std::borrow::Cow;

use opentelemetry::propagation::{Extractor, Injector, TextMapPropagator};
use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer, TracerProvider as _};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};
use reqwest::Url;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::ResolveError;

/// Tracer handle plus the propagator used on every hop
#[derive(Debug, Clone)]
pub struct SpanFactory {
    tracer: SdkTracer,
    propagator: TraceContextPropagator,
}

impl SpanFactory {
    pub fn new(tracer: SdkTracer) -> Self {
        Self {
            tracer,
            propagator: TraceContextPropagator::new(),
        }
    }

    /// Factory whose spans are recorded nowhere
    pub fn disabled() -> Self {
        Self::new(SdkTracerProvider::builder().build().tracer(crate::SERVICE_NAME))
    }

    /// Start a client span for one outbound call, parented to `parent`
    pub fn start_client_span(
        &self,
        name: impl Into<Cow<'static, str>>,
        parent: &Context,
        attributes: Vec<KeyValue>,
    ) -> HopSpan {
        let span = self
            .tracer
            .span_builder(name)
            .with_kind(SpanKind::Client)
            .with_attributes(attributes)
            .start_with_context(&self.tracer, parent);
        HopSpan {
            cx: parent.with_span(span),
        }
    }

    /// Read inbound trace context from request headers
    pub fn extract(&self, headers: &HeaderMap) -> Context {
        self.propagator.extract(&HeaderExtractor(headers))
    }

    /// Headers carrying `cx` to the next hop
    pub fn outbound_headers(&self, cx: &Context) -> HeaderMap {
        let mut headers = HeaderMap::new();
        self.propagator
            .inject_context(cx, &mut HeaderInjector(&mut headers));
        headers
    }
}

/// An open client span. Ended when dropped, whatever the exit path.
#[derive(Debug)]
pub struct HopSpan {
    cx: Context,
}

impl HopSpan {
    /// Context with this span active, for header injection
    pub fn context(&self) -> &Context {
        &self.cx
    }

    pub fn set_attribute(&self, attribute: KeyValue) {
        self.cx.span().set_attribute(attribute);
    }

    /// Mark the span with the outcome and end it
    pub fn finish<T>(self, result: Result<T, ResolveError>) -> Result<T, ResolveError> {
        let span = self.cx.span();
        match &result {
            Ok(_) => span.set_status(Status::Ok),
            Err(err) => {
                span.record_error(err);
                span.set_status(Status::error(err.to_string()));
            }
        }
        result
    }
}

impl Drop for HopSpan {
    fn drop(&mut self) {
        self.cx.span().end();
    }
}

/// `url` with the value of `param` masked, safe for logs and span attributes
pub fn redacted_url(url: &Url, param: &str) -> String {
    let mut redacted = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == param { "REDACTED".into() } else { v };
            (k.into_owned(), v.into_owned())
        })
        .collect();
    if !pairs.is_empty() {
        redacted.query_pairs_mut().clear().extend_pairs(pairs);
    }
    redacted.to_string()
}

struct HeaderInjector<'a>(&'a mut HeaderMap);

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            self.0.insert(name, value);
        }
    }
}

struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(HeaderName::as_str).collect()
    }
}
