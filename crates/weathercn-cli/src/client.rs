//! Public entry point composing selector resolution with the fetchers.

use chrono::{DateTime, Utc};

use crate::error::WeatherError;
use crate::fetcher;
use crate::geoip::RegionLookup;
use crate::location::{LocationSelector, resolve};
use crate::model::{
    VisitorLocation, WeatherData, WeatherDetail, WeatherKind, WeatherSnapshot,
};
use crate::resolver::CityResolver;
use crate::transport::Transport;

/// A successfully resolved city selection. Constructing one is the only
/// way to call `get_weather`, so an unset location cannot reach the
/// fetch stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedCity {
    code: String,
}

impl SelectedCity {
    pub fn code(&self) -> &str {
        &self.code
    }
}

pub struct WeatherClient<T, G, N = fn() -> DateTime<Utc>>
where
    T: Transport,
    G: RegionLookup,
    N: Fn() -> DateTime<Utc>,
{
    transport: T,
    resolver: CityResolver<G>,
    now_fn: N,
}

impl<T: Transport, G: RegionLookup> WeatherClient<T, G> {
    pub fn new(transport: T, resolver: CityResolver<G>) -> Self {
        Self {
            transport,
            resolver,
            now_fn: Utc::now,
        }
    }
}

impl<T, G, N> WeatherClient<T, G, N>
where
    T: Transport,
    G: RegionLookup,
    N: Fn() -> DateTime<Utc>,
{
    /// Replace the clock; tests inject fixed instants here.
    pub fn with_now_fn<M: Fn() -> DateTime<Utc>>(self, now_fn: M) -> WeatherClient<T, G, M> {
        WeatherClient {
            transport: self.transport,
            resolver: self.resolver,
            now_fn,
        }
    }

    pub fn resolver(&self) -> &CityResolver<G> {
        &self.resolver
    }

    /// Resolve a selector eagerly: failures surface here, at selection
    /// time, not at the later `get_weather` call.
    pub fn select(
        &self,
        selector: &LocationSelector,
        headers: &[(&str, &str)],
    ) -> Result<SelectedCity, WeatherError> {
        let now_ms = (self.now_fn)().timestamp_millis();
        let code = resolve(selector, &self.resolver, &self.transport, headers, now_ms)?;
        Ok(SelectedCity { code })
    }

    pub fn for_city(&self, name: &str) -> Result<SelectedCity, WeatherError> {
        self.select(&LocationSelector::CityName(name.to_string()), &[])
    }

    pub fn for_coordinates(&self, lat: f64, lon: f64) -> Result<SelectedCity, WeatherError> {
        self.select(&LocationSelector::Coordinates { lat, lon }, &[])
    }

    pub fn for_ip(&self, ip: &str) -> Result<SelectedCity, WeatherError> {
        self.select(&LocationSelector::ClientIp(Some(ip.to_string())), &[])
    }

    /// Derive the caller's IP from proxy-header pairs supplied by the
    /// web boundary.
    pub fn for_current_location(
        &self,
        headers: &[(&str, &str)],
    ) -> Result<SelectedCity, WeatherError> {
        self.select(&LocationSelector::ClientIp(None), headers)
    }

    pub fn for_city_code(&self, code: &str) -> Result<SelectedCity, WeatherError> {
        self.select(&LocationSelector::CityCode(code.to_string()), &[])
    }

    /// Fetch weather data of the requested kind for a resolved city.
    /// `hourly_limit` bounds the hourly sequence for the `hourly` and
    /// `comprehensive` kinds.
    pub fn get_weather(
        &self,
        city: &SelectedCity,
        kind: WeatherKind,
        hourly_limit: usize,
    ) -> Result<WeatherData, WeatherError> {
        let now = (self.now_fn)();
        let code = city.code();
        match kind {
            WeatherKind::Basic => {
                fetcher::fetch_snapshot(&self.transport, &self.resolver, code, now)
                    .map(WeatherData::Snapshot)
            }
            WeatherKind::Detail => Ok(WeatherData::Detail(fetcher::fetch_detail(
                &self.transport,
                code,
                now,
            ))),
            WeatherKind::SevenDay => {
                let mut days = fetcher::fetch_multi_day(&self.transport, code, now)?;
                days.truncate(7);
                Ok(WeatherData::Daily(days))
            }
            WeatherKind::FifteenDay => {
                let mut days = fetcher::fetch_multi_day(&self.transport, code, now)?;
                days.truncate(15);
                Ok(WeatherData::Daily(days))
            }
            WeatherKind::Hourly => {
                let mut hours = fetcher::fetch_hourly(&self.transport, code, now)?;
                hours.truncate(hourly_limit);
                Ok(WeatherData::Hourly(hours))
            }
            WeatherKind::Comprehensive => {
                fetcher::fetch_all(&self.transport, code, hourly_limit, now)
                    .map(|bundle| WeatherData::Bundle(Box::new(bundle)))
            }
        }
    }

    /// Snapshot plus advisory detail for a resolved city.
    pub fn current_weather(
        &self,
        city: &SelectedCity,
    ) -> Result<(WeatherSnapshot, WeatherDetail), WeatherError> {
        let now = (self.now_fn)();
        let snapshot =
            fetcher::fetch_snapshot(&self.transport, &self.resolver, city.code(), now)?;
        let detail = fetcher::fetch_detail(&self.transport, city.code(), now);
        Ok((snapshot, detail))
    }

    /// The visitor's IP-derived location, cached per client instance.
    pub fn visitor_data(
        &self,
        ip: Option<&str>,
        headers: &[(&str, &str)],
    ) -> Result<VisitorLocation, WeatherError> {
        self.resolver.visitor_location(ip, headers)
    }
}
