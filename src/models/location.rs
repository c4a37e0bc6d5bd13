//! Location model resolved from a postal code

use serde::Serialize;

use super::PostalCode;

/// Locality the location provider reports for a postal code
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Location {
    /// Postal code that was looked up
    #[serde(serialize_with = "serialize_code")]
    pub code: PostalCode,
    /// City name (never empty)
    pub name: String,
}

impl Location {
    /// Create a new location
    #[must_use]
    pub fn new(code: PostalCode, name: String) -> Self {
        Self { code, name }
    }
}

fn serialize_code<S: serde::Serializer>(
    code: &PostalCode,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(code.as_str())
}
