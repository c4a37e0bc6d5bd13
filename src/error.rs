//! Error types for the resolution pipeline

use std::fmt;

use axum::http::StatusCode;
use thiserror::Error;

/// External collaborator a failed call was addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// Postal code to locality lookup
    Location,
    /// Current conditions lookup
    Weather,
    /// Orchestration service, as seen from the gateway
    Upstream,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Location => write!(f, "location provider"),
            Provider::Weather => write!(f, "weather provider"),
            Provider::Upstream => write!(f, "upstream service"),
        }
    }
}

/// Every way a resolution can fail.
///
/// Each stage returns its own variant and callers pass it through unchanged.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Postal code is not exactly eight ASCII digits
    #[error("Invalid postal code format: {input:?}")]
    InvalidFormat { input: String },

    /// Location provider has no record of the postal code
    #[error("Postal code not found: {code}")]
    NotFound { code: String },

    /// Weather provider credential is missing
    #[error("Weather API key is not configured")]
    EmptyApiKey,

    /// Caller context was cancelled or its deadline passed
    #[error("Request cancelled before completion")]
    Cancelled,

    /// Connection, read or HTTP status failure
    #[error("Transport error calling {provider}: {source}")]
    Transport {
        provider: Provider,
        source: reqwest::Error,
    },

    /// Response body did not match the expected schema
    #[error("Unexpected response from {provider}: {source}")]
    Decode {
        provider: Provider,
        source: serde_json::Error,
    },
}

impl ResolveError {
    pub fn invalid_format<S: Into<String>>(input: S) -> Self {
        Self::InvalidFormat {
            input: input.into(),
        }
    }

    pub fn not_found<S: Into<String>>(code: S) -> Self {
        Self::NotFound { code: code.into() }
    }

    pub fn transport(provider: Provider, source: reqwest::Error) -> Self {
        Self::Transport { provider, source }
    }

    pub fn decode(provider: Provider, source: serde_json::Error) -> Self {
        Self::Decode { provider, source }
    }

    /// HTTP status the service answers with for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            ResolveError::InvalidFormat { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ResolveError::NotFound { .. } => StatusCode::NOT_FOUND,
            ResolveError::Cancelled => StatusCode::GATEWAY_TIMEOUT,
            ResolveError::EmptyApiKey
            | ResolveError::Transport { .. }
            | ResolveError::Decode { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            ResolveError::InvalidFormat { .. } => "invalid zipcode".to_string(),
            ResolveError::NotFound { .. } => "can not find zipcode".to_string(),
            ResolveError::EmptyApiKey => "weather service is not configured".to_string(),
            ResolveError::Cancelled => "request timed out".to_string(),
            ResolveError::Transport { provider, .. } | ResolveError::Decode { provider, .. } => {
                match provider {
                    Provider::Location => "error getting location data".to_string(),
                    Provider::Weather => "error getting weather data".to_string(),
                    Provider::Upstream => "error contacting temperature service".to_string(),
                }
            }
        }
    }
}
