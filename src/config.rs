//! Configuration management for the cep-weather services
//!
//! Handles loading configuration from a TOML file and environment variables,
//! and provides validation for all configuration settings.

use anyhow::{Context, Result, anyhow};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "CEP_WEATHER_CONFIG";

/// Prefix for environment overrides, e.g. `CEP_WEATHER_WEATHER__API_KEY`
pub const ENV_PREFIX: &str = "CEP_WEATHER";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Orchestration service HTTP listener
    pub server: ServerConfig,
    /// Location provider settings
    pub location: LocationConfig,
    /// Weather provider settings
    pub weather: WeatherConfig,
    /// Input gateway settings
    pub gateway: GatewayConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Trace export configuration
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the orchestration service listens on
    pub bind_address: String,
    /// Deadline applied to every inbound request
    pub request_timeout_seconds: u64,
    /// Serve HTTPS with these files when set
    pub tls: Option<TlsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Location provider (ViaCEP) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Base URL; requests go to `{base_url}/ws/{cep}/json`
    pub base_url: String,
    /// Skip TLS certificate verification. Never enable outside local testing.
    pub accept_invalid_certs: bool,
}

/// Weather provider (WeatherAPI) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// API key; requests fail with an empty-key error while unset
    pub api_key: Option<String>,
    /// Base URL; requests go to `{base_url}/v1/current.json`
    pub base_url: String,
    /// Skip TLS certificate verification. Never enable outside local testing.
    pub accept_invalid_certs: bool,
}

/// Input gateway settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Address the gateway listens on
    pub bind_address: String,
    /// Orchestration service the gateway forwards to
    pub upstream_url: String,
    /// Deadline applied to every inbound request
    pub request_timeout_seconds: u64,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (pretty or json)
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// `service.name` resource attribute
    pub service_name: String,
    /// OTLP/HTTP traces endpoint; spans are not exported when unset
    pub otlp_endpoint: Option<String>,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_location_base_url() -> String {
    "https://viacep.com.br".to_string()
}

fn default_weather_base_url() -> String {
    "https://api.weatherapi.com".to_string()
}

fn default_gateway_bind_address() -> String {
    "0.0.0.0:8081".to_string()
}

fn default_upstream_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_service_name() -> String {
    crate::SERVICE_NAME.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            request_timeout_seconds: default_request_timeout(),
            tls: None,
        }
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            base_url: default_location_base_url(),
            accept_invalid_certs: false,
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_weather_base_url(),
            accept_invalid_certs: false,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_address: default_gateway_bind_address(),
            upstream_url: default_upstream_url(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            otlp_endpoint: None,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl GatewayConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl ServiceConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        Self::load_with_env(config_path, None)
    }

    /// Load with `env` standing in for the process environment when given
    fn load_with_env(
        config_path: Option<PathBuf>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(Self::get_config_path);

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Values stay strings until deserialized, so a numeric-looking
        // API key keeps its leading zeros.
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .source(env),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: ServiceConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Configuration file path, from the environment or `config.toml`
    #[must_use]
    pub fn get_config_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Apply default values to blank configuration fields
    pub fn apply_defaults(&mut self) {
        if self.server.bind_address.is_empty() {
            self.server.bind_address = default_bind_address();
        }
        if self.location.base_url.is_empty() {
            self.location.base_url = default_location_base_url();
        }
        if self.weather.base_url.is_empty() {
            self.weather.base_url = default_weather_base_url();
        }
        if self.gateway.bind_address.is_empty() {
            self.gateway.bind_address = default_gateway_bind_address();
        }
        if self.gateway.upstream_url.is_empty() {
            self.gateway.upstream_url = default_upstream_url();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
        if self.telemetry.service_name.is_empty() {
            self.telemetry.service_name = default_service_name();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_api_keys()?;
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate API keys and credentials.
    ///
    /// A missing weather key is allowed; requests then fail individually.
    pub fn validate_api_keys(&self) -> Result<()> {
        if let Some(api_key) = &self.weather.api_key {
            if api_key.trim().is_empty() {
                return Err(anyhow!(
                    "Weather API key cannot be empty if provided. \
                     Either remove it or provide a valid key."
                ));
            }
        }
        Ok(())
    }

    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.server.request_timeout_seconds == 0 {
            return Err(anyhow!("Server request timeout must be at least 1 second"));
        }
        if self.gateway.request_timeout_seconds == 0 {
            return Err(anyhow!("Gateway request timeout must be at least 1 second"));
        }
        if self.server.request_timeout_seconds > 300 {
            return Err(anyhow!("Server request timeout cannot exceed 300 seconds"));
        }
        if self.gateway.request_timeout_seconds > 300 {
            return Err(anyhow!("Gateway request timeout cannot exceed 300 seconds"));
        }
        Ok(())
    }

    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ));
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(anyhow!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ));
        }

        let urls = [
            ("Location base URL", Some(&self.location.base_url)),
            ("Weather base URL", Some(&self.weather.base_url)),
            ("Gateway upstream URL", Some(&self.gateway.upstream_url)),
            ("OTLP endpoint", self.telemetry.otlp_endpoint.as_ref()),
        ];
        for (name, url) in urls {
            if let Some(url) = url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(anyhow!("{name} must be a valid HTTP or HTTPS URL"));
                }
            }
        }

        Ok(())
    }
}
