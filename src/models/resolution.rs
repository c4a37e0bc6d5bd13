//! Final result of a successful pipeline run

use serde::{Deserialize, Serialize};

use super::Temperature;

/// City name plus the reading in all three units.
///
/// Serialized with the field names the service has always answered with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    #[serde(rename = "city")]
    pub location: String,
    pub temp_c: f64,
    pub temp_f: f64,
    pub temp_k: f64,
}

impl ResolutionResult {
    #[must_use]
    pub fn new(location: String, temperature: Temperature) -> Self {
        Self {
            location,
            temp_c: temperature.celsius(),
            temp_f: temperature.fahrenheit(),
            temp_k: temperature.kelvin(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_from_temperature() {
        let result =
            ResolutionResult::new("São Paulo".to_string(), Temperature::from_celsius(25.0));
        assert_eq!(result.location, "São Paulo");
        assert_eq!(result.temp_c, 25.0);
        assert_eq!(result.temp_f, 77.0);
        assert_eq!(result.temp_k, 298.15);
    }

    #[test]
    fn test_wire_format() {
        let result = ResolutionResult::new("Recife".to_string(), Temperature::from_celsius(0.0));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "city": "Recife",
                "temp_c": 0.0,
                "temp_f": 32.0,
                "temp_k": 273.15
            })
        );
    }
}
