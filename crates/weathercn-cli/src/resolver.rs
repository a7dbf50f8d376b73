//! Cascading resolution of a location input to a provider city code.

use std::sync::RwLock;

use serde_json::Value;

use crate::citymap::CityCodeMap;
use crate::error::WeatherError;
use crate::extract::extract_jsonp;
use crate::geoip::{RegionLookup, client_ip_from_headers, default_isp_keywords, parse_region};
use crate::model::VisitorLocation;
use crate::transport::{D7_HOST, Transport, browser_headers};

const COORDINATE_ENDPOINT: &str = "https://d7.weather.com.cn/geong/v1/api";

/// The coordinate endpoint's response shape is not uniform; these paths
/// are probed in order and the first present non-empty value wins.
const STATION_ID_PATHS: [&[&str]; 4] = [
    &["stationInfo", "station_id"],
    &["result", "station_id"],
    &["data", "station_id"],
    &["data", "station", "areaid"],
];

pub struct CityResolver<G: RegionLookup> {
    region_lookup: G,
    city_map: CityCodeMap,
    isp_keywords: Vec<String>,
    visitor: RwLock<Option<VisitorLocation>>,
}

impl<G: RegionLookup> CityResolver<G> {
    pub fn new(region_lookup: G, city_map: CityCodeMap) -> Self {
        Self {
            region_lookup,
            city_map,
            isp_keywords: default_isp_keywords(),
            visitor: RwLock::new(None),
        }
    }

    pub fn with_isp_keywords(mut self, keywords: Vec<String>) -> Self {
        self.isp_keywords = keywords;
        self
    }

    pub fn city_map(&self) -> &CityCodeMap {
        &self.city_map
    }

    /// The last visitor location resolved by this instance, if any.
    pub fn cached_visitor(&self) -> Option<VisitorLocation> {
        self.visitor.read().ok().and_then(|guard| guard.clone())
    }

    /// Raw-exact, then normalized-exact, then case-insensitive match of
    /// normalized forms; miss signals `CityNotFound`.
    pub fn resolve_by_name(&self, name: &str) -> Result<String, WeatherError> {
        self.city_map
            .code_for(name)
            .map(str::to_string)
            .ok_or_else(|| WeatherError::CityNotFound(name.to_string()))
    }

    /// Nearest-station lookup by coordinates. The coordinates are passed
    /// through as received; the endpoint decides resolution granularity.
    pub fn resolve_by_coordinates<T: Transport>(
        &self,
        transport: &T,
        latitude: f64,
        longitude: f64,
        now_ms: i64,
    ) -> Result<String, WeatherError> {
        let params = serde_json::json!({
            "method": "stationinfo",
            "callback": "getData",
            "lat": latitude,
            "lng": longitude,
        })
        .to_string();
        let url = format!(
            "{COORDINATE_ENDPOINT}?params={}&callback=getData&_={now_ms}",
            urlencoding::encode(&params)
        );

        let body = transport.send(&url, &browser_headers(D7_HOST))?;
        let payload = extract_jsonp(&body)?;

        STATION_ID_PATHS
            .iter()
            .find_map(|path| probe_path(&payload, path))
            .filter(|code| !code.is_empty())
            .ok_or_else(|| {
                WeatherError::LocationFailed("no city code for coordinates".to_string())
            })
    }

    /// Resolve via the visitor's IP-derived city. An absent `ip` is
    /// derived from the proxy-header pairs; an unresolvable IP or an
    /// empty visitor city code signals `LocationFailed`.
    pub fn resolve_by_ip(
        &self,
        ip: Option<&str>,
        headers: &[(&str, &str)],
    ) -> Result<String, WeatherError> {
        let visitor = self.visitor_location(ip, headers)?;
        if visitor.city_code.is_empty() {
            return Err(WeatherError::LocationFailed(format!(
                "no city code for ip {}",
                visitor.ip
            )));
        }
        Ok(visitor.city_code)
    }

    /// Resolve and cache the visitor location. A fresh explicit IP
    /// invalidates the cache; with no IP supplied the cached value is
    /// reused when present.
    pub fn visitor_location(
        &self,
        ip: Option<&str>,
        headers: &[(&str, &str)],
    ) -> Result<VisitorLocation, WeatherError> {
        if ip.is_none() {
            if let Some(cached) = self.cached_visitor() {
                return Ok(cached);
            }
        }

        let ip = match ip {
            Some(explicit) => explicit.to_string(),
            None => client_ip_from_headers(headers).ok_or_else(|| {
                WeatherError::LocationFailed("client ip not derivable".to_string())
            })?,
        };

        let region = self.region_lookup.lookup(&ip).map_err(|error| match error {
            WeatherError::LocationFailed(_) => error,
            other => WeatherError::LocationFailed(format!("visitor data: {other}")),
        })?;
        if region.is_empty() {
            return Err(WeatherError::LocationFailed(format!("empty region for {ip}")));
        }

        let parts = parse_region(&region, &self.isp_keywords);
        let city_code = if parts.city.is_empty() {
            String::new()
        } else {
            self.city_map
                .code_for(&parts.city)
                .unwrap_or_default()
                .to_string()
        };

        let location = VisitorLocation {
            ip,
            province: parts.province,
            city: parts.city,
            district: String::new(),
            city_code,
        };

        if let Ok(mut guard) = self.visitor.write() {
            *guard = Some(location.clone());
        }
        Ok(location)
    }
}

fn probe_path(payload: &Value, path: &[&str]) -> Option<String> {
    let mut current = payload;
    for key in path {
        current = current.get(key)?;
    }
    match current {
        Value::String(code) => Some(code.clone()),
        Value::Number(code) => Some(code.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::collections::HashMap;

    use super::*;

    struct FakeRegionLookup {
        region: Result<String, WeatherError>,
        calls: Cell<usize>,
    }

    impl FakeRegionLookup {
        fn beijing() -> Self {
            Self {
                region: Ok("中国|华北|北京|北京市|电信".to_string()),
                calls: Cell::new(0),
            }
        }
    }

    impl RegionLookup for FakeRegionLookup {
        fn lookup(&self, _ip: &str) -> Result<String, WeatherError> {
            self.calls.set(self.calls.get() + 1);
            self.region.clone()
        }
    }

    struct FakeTransport {
        body: Result<String, WeatherError>,
    }

    impl Transport for FakeTransport {
        fn send(&self, _url: &str, _headers: &[(&str, &str)]) -> Result<String, WeatherError> {
            self.body.clone()
        }
    }

    fn sample_resolver(region: FakeRegionLookup) -> CityResolver<FakeRegionLookup> {
        let mut map = HashMap::new();
        map.insert("北京".to_string(), "101010100".to_string());
        map.insert("上海".to_string(), "101020100".to_string());
        CityResolver::new(region, CityCodeMap::from_map(map))
    }

    #[test]
    fn resolver_names_with_identical_normalization_share_codes() {
        let resolver = sample_resolver(FakeRegionLookup::beijing());
        let plain = resolver.resolve_by_name("北京").expect("code");
        let suffixed = resolver.resolve_by_name("北京市").expect("code");
        assert_eq!(plain, suffixed);
        assert_eq!(plain, "101010100");
    }

    #[test]
    fn resolver_unknown_name_is_city_not_found() {
        let resolver = sample_resolver(FakeRegionLookup::beijing());
        let error = resolver.resolve_by_name("不存在").expect_err("must fail");
        assert_eq!(error, WeatherError::CityNotFound("不存在".to_string()));
    }

    #[test]
    fn resolver_coordinates_probe_paths_in_declared_order() {
        let resolver = sample_resolver(FakeRegionLookup::beijing());
        let transport = FakeTransport {
            body: Ok(
                r#"getData({"result":{"station_id":"101020100"},"data":{"station":{"areaid":"101010100"}}})"#
                    .to_string(),
            ),
        };

        let code = resolver
            .resolve_by_coordinates(&transport, 31.23, 121.47, 1_767_796_061_347)
            .expect("code");
        assert_eq!(code, "101020100");
    }

    #[test]
    fn resolver_coordinates_accept_areaid_fallback_path() {
        let resolver = sample_resolver(FakeRegionLookup::beijing());
        let transport = FakeTransport {
            body: Ok(r#"getData({"data":{"station":{"areaid":"101260101"}}})"#.to_string()),
        };

        let code = resolver
            .resolve_by_coordinates(&transport, 26.57, 106.71, 0)
            .expect("code");
        assert_eq!(code, "101260101");
    }

    #[test]
    fn resolver_coordinates_without_station_fields_fail_location() {
        let resolver = sample_resolver(FakeRegionLookup::beijing());
        let transport = FakeTransport {
            body: Ok(r#"getData({"data":{"nothing":true}})"#.to_string()),
        };

        let error = resolver
            .resolve_by_coordinates(&transport, 1.0, 2.0, 0)
            .expect_err("must fail");
        assert!(matches!(error, WeatherError::LocationFailed(_)));
    }

    #[test]
    fn resolver_coordinates_propagate_transport_failure() {
        let resolver = sample_resolver(FakeRegionLookup::beijing());
        let transport = FakeTransport {
            body: Err(WeatherError::api_request_failed("u", "timeout")),
        };

        let error = resolver
            .resolve_by_coordinates(&transport, 1.0, 2.0, 0)
            .expect_err("must fail");
        assert!(error.retryable());
    }

    #[test]
    fn resolver_visitor_location_applies_isp_correction_and_code_lookup() {
        let region = FakeRegionLookup {
            region: Ok("中国|0|上海|电信|".to_string()),
            calls: Cell::new(0),
        };
        let resolver = sample_resolver(region);

        let visitor = resolver
            .visitor_location(Some("203.0.113.5"), &[])
            .expect("visitor");
        assert_eq!(visitor.city, "上海");
        assert_eq!(visitor.city_code, "101020100");
        assert_eq!(visitor.district, "");
    }

    #[test]
    fn resolver_visitor_cache_reused_without_explicit_ip() {
        let resolver = sample_resolver(FakeRegionLookup::beijing());

        resolver
            .visitor_location(Some("114.247.50.2"), &[])
            .expect("first");
        resolver.visitor_location(None, &[]).expect("cached");

        assert_eq!(resolver.region_lookup.calls.get(), 1);
    }

    #[test]
    fn resolver_visitor_cache_invalidated_by_new_explicit_ip() {
        let resolver = sample_resolver(FakeRegionLookup::beijing());

        resolver
            .visitor_location(Some("114.247.50.2"), &[])
            .expect("first");
        let second = resolver
            .visitor_location(Some("203.0.113.9"), &[])
            .expect("second");

        assert_eq!(resolver.region_lookup.calls.get(), 2);
        assert_eq!(second.ip, "203.0.113.9");
    }

    #[test]
    fn resolver_ip_without_headers_or_cache_fails_location() {
        let resolver = sample_resolver(FakeRegionLookup::beijing());
        let error = resolver.resolve_by_ip(None, &[]).expect_err("must fail");
        assert_eq!(error.code(), 1005);
    }

    #[test]
    fn resolver_ip_derives_from_proxy_headers() {
        let resolver = sample_resolver(FakeRegionLookup::beijing());
        let headers = [("X-Forwarded-For", "114.247.50.2, 10.0.0.1")];

        let code = resolver.resolve_by_ip(None, &headers).expect("code");
        assert_eq!(code, "101010100");
        assert_eq!(
            resolver.cached_visitor().map(|visitor| visitor.ip),
            Some("114.247.50.2".to_string())
        );
    }

    #[test]
    fn resolver_ip_with_unmapped_city_fails_location() {
        let region = FakeRegionLookup {
            region: Ok("中国|0|西域|楼兰|".to_string()),
            calls: Cell::new(0),
        };
        let resolver = sample_resolver(region);

        let error = resolver
            .resolve_by_ip(Some("198.51.100.7"), &[])
            .expect_err("must fail");
        assert!(matches!(error, WeatherError::LocationFailed(_)));

        // The visitor location itself is still cached with an empty code.
        let visitor = resolver.cached_visitor().expect("cached");
        assert_eq!(visitor.city, "楼兰");
        assert_eq!(visitor.city_code, "");
    }

    #[test]
    fn resolver_wraps_region_lookup_failures_as_location_failed() {
        let region = FakeRegionLookup {
            region: Err(WeatherError::api_request_failed("geo", "down")),
            calls: Cell::new(0),
        };
        let resolver = sample_resolver(region);

        let error = resolver
            .visitor_location(Some("198.51.100.7"), &[])
            .expect_err("must fail");
        assert_eq!(error.code(), 1005);
    }
}
