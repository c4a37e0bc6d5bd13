//! Data models for the resolution pipeline
//!
//! This module contains the request-scoped domain values organized by concern:
//! - PostalCode: validated eight-digit CEP
//! - Location: locality resolved for a postal code
//! - Temperature: Celsius reading with derived Fahrenheit and Kelvin
//! - Resolution: final multi-unit result handed to the HTTP layer

pub mod location;
pub mod postal_code;
pub mod resolution;
pub mod temperature;

// Re-export all public types for convenient access
pub use location::Location;
pub use postal_code::{PostalCode, validate};
pub use resolution::ResolutionResult;
pub use temperature::Temperature;
