//! Location selection as an immutable value plus a pure resolution
//! function. Exactly one strategy is ever active because the selector is
//! a tagged union, not a set of nullable fields.

use crate::error::WeatherError;
use crate::geoip::RegionLookup;
use crate::resolver::CityResolver;
use crate::transport::Transport;

#[derive(Debug, Clone, PartialEq)]
pub enum LocationSelector {
    CityName(String),
    Coordinates { lat: f64, lon: f64 },
    /// `None` means "derive the caller's IP from proxy headers".
    ClientIp(Option<String>),
    CityCode(String),
}

/// Resolve a selector to a city code. Side-effect-free apart from the
/// resolver's visitor cache, which only the `ClientIp` arm touches.
pub fn resolve<T, G>(
    selector: &LocationSelector,
    resolver: &CityResolver<G>,
    transport: &T,
    headers: &[(&str, &str)],
    now_ms: i64,
) -> Result<String, WeatherError>
where
    T: Transport,
    G: RegionLookup,
{
    match selector {
        LocationSelector::CityName(name) => resolver.resolve_by_name(name),
        LocationSelector::Coordinates { lat, lon } => {
            resolver.resolve_by_coordinates(transport, *lat, *lon, now_ms)
        }
        LocationSelector::ClientIp(ip) => resolver.resolve_by_ip(ip.as_deref(), headers),
        LocationSelector::CityCode(code) => {
            if code.is_empty() {
                return Err(WeatherError::invalid_parameter("cityCode", code.clone()));
            }
            Ok(code.clone())
        }
    }
}
