//! `cep-weather` - current temperature for a Brazilian postal code
//!
//! This library provides the resolution pipeline (postal code validation,
//! locality lookup, current temperature lookup and unit conversion), the
//! HTTP surfaces of the temperature service and its input gateway, and the
//! configuration and telemetry plumbing they share.

pub mod config;
pub mod context;
pub mod error;
pub mod gateway;
pub mod location_resolver;
pub mod models;
pub mod orchestrator;
pub mod telemetry;
pub mod trace;
pub mod weather;
pub mod web;

// Re-export core types for public API
pub use config::ServiceConfig;
pub use context::{Canceller, PROVIDER_TIMEOUT, RequestContext};
pub use error::{Provider, ResolveError};
pub use location_resolver::{LocationProvider, LocationResolver};
pub use models::{Location, PostalCode, ResolutionResult, Temperature};
pub use orchestrator::Orchestrator;
pub use trace::SpanFactory;
pub use weather::{TemperatureProvider, TemperatureResolver};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// `service.name` used when none is configured
pub const SERVICE_NAME: &str = "cep-weather";

/// User agent sent on every outbound call
pub const USER_AGENT: &str = concat!("cep-weather/", env!("CARGO_PKG_VERSION"));

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, ResolveError>;
