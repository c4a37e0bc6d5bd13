//! Postal code to temperature pipeline
//!
//! Validates the raw code, looks up the locality, then reads the current
//! temperature for that locality's name. Each stage short-circuits on error
//! and its error is returned unchanged.

use tracing::{debug, info, instrument};

use crate::context::RequestContext;
use crate::error::ResolveError;
use crate::location_resolver::LocationProvider;
use crate::models::{ResolutionResult, validate};
use crate::weather::TemperatureProvider;

pub struct Orchestrator<L, T> {
    locations: L,
    temperatures: T,
}

impl<L, T> Orchestrator<L, T>
where
    L: LocationProvider,
    T: TemperatureProvider,
{
    pub fn new(locations: L, temperatures: T) -> Self {
        Self {
            locations,
            temperatures,
        }
    }

    pub fn locations(&self) -> &L {
        &self.locations
    }

    /// Resolve `raw_code` into a locality name and its temperature in all units
    #[instrument(name = "execute", skip(self, ctx))]
    pub async fn execute(
        &self,
        ctx: &RequestContext,
        raw_code: &str,
    ) -> Result<ResolutionResult, ResolveError> {
        let code = validate(raw_code)?;
        debug!("Postal code accepted");

        let location = self.locations.resolve(ctx, &code).await?;
        let temperature = self.temperatures.resolve(ctx, &location.name).await?;

        info!(
            city = %location.name,
            temperature = %temperature.format_temperature(),
            "Resolution complete"
        );
        Ok(ResolutionResult::new(location.name, temperature))
    }
}
