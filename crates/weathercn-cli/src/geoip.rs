//! IP geolocation collaborators.
//!
//! A [`RegionLookup`] resolves an IP to the provider-conventional pipe
//! hierarchy `country|region|province|city|isp`. Implementations that
//! receive a structured shape adapt it onto the pipe form so the
//! resolver parses one format. [`FallbackRegionLookup`] chains providers
//! in a fixed order, first success wins.

use std::net::IpAddr;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::WeatherError;
use crate::transport::Transport;

/// `lookup(ip) -> "country|region|province|city|isp"`.
pub trait RegionLookup {
    fn lookup(&self, ip: &str) -> Result<String, WeatherError>;
}

/// Trusted proxy-header sources, probed in order. The first
/// comma-separated token that parses as an IP wins.
pub const CLIENT_IP_HEADERS: [&str; 4] = ["X-Forwarded-For", "X-Real-IP", "Client-IP", "Remote-Addr"];

/// Telecom-operator keywords: a fourth hierarchy segment containing one
/// of these is an ISP name, not a city. Kept as data so deployments can
/// extend the list without touching resolver control flow.
pub fn default_isp_keywords() -> Vec<String> {
    ["电信", "联通", "移动", "铁通", "网通", "卫通"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionParts {
    pub province: String,
    pub city: String,
}

/// Split the pipe hierarchy and apply the ISP-keyword correction: when
/// the city segment names an operator or is empty, the province segment
/// stands in for the city. The administrative `市` particle is stripped
/// to match city-code table keys.
pub fn parse_region(region: &str, isp_keywords: &[String]) -> RegionParts {
    let segments: Vec<&str> = region.split('|').collect();
    let province = segments.get(2).copied().unwrap_or_default().to_string();
    let mut city = segments.get(3).copied().unwrap_or_default().to_string();

    let is_isp = isp_keywords
        .iter()
        .any(|keyword| !keyword.is_empty() && city.contains(keyword.as_str()));
    if is_isp || city.is_empty() {
        city = province.clone();
    }
    city = city.replace('市', "");

    RegionParts { province, city }
}

/// Derive the caller's IP from ordered proxy-header pairs.
pub fn client_ip_from_headers(headers: &[(&str, &str)]) -> Option<String> {
    for header in CLIENT_IP_HEADERS {
        let found = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(header))
            .map(|(_, value)| *value);
        if let Some(ip) = found.and_then(first_valid_ip) {
            return Some(ip);
        }
    }
    None
}

/// Ordered provider chain: the first successful lookup wins; when every
/// provider fails the last error is surfaced as `LocationFailed`.
pub struct FallbackRegionLookup {
    providers: Vec<Box<dyn RegionLookup>>,
}

impl FallbackRegionLookup {
    pub fn new(providers: Vec<Box<dyn RegionLookup>>) -> Self {
        Self { providers }
    }
}

impl RegionLookup for FallbackRegionLookup {
    fn lookup(&self, ip: &str) -> Result<String, WeatherError> {
        let mut last_error = WeatherError::LocationFailed("no region providers".to_string());
        for provider in &self.providers {
            match provider.lookup(ip) {
                Ok(region) if !region.is_empty() => return Ok(region),
                Ok(_) => {
                    last_error =
                        WeatherError::LocationFailed(format!("empty region for {ip}"));
                }
                Err(error) => last_error = error,
            }
        }
        Err(last_error)
    }
}

const PCONLINE_ENDPOINT: &str = "https://whois.pconline.com.cn/ipJson.jsp";

#[derive(Debug, Deserialize)]
struct PconlineResponse {
    #[serde(default)]
    pro: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    region: String,
}

/// HTTP provider over whois.pconline.com.cn, which answers a structured
/// `{ip, pro, city, region}` JSON shape.
pub struct PconlineLookup<T: Transport> {
    transport: T,
}

impl<T: Transport> PconlineLookup<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }
}

impl<T: Transport> RegionLookup for PconlineLookup<T> {
    fn lookup(&self, ip: &str) -> Result<String, WeatherError> {
        let url = format!("{PCONLINE_ENDPOINT}?ip={}&json=true", urlencoding::encode(ip));
        let body = self.transport.send(&url, &[])?;
        let parsed: PconlineResponse = serde_json::from_str(body.trim())
            .map_err(|error| WeatherError::DataParseFailed(format!("pconline payload: {error}")))?;

        if parsed.pro.is_empty() && parsed.city.is_empty() {
            return Err(WeatherError::LocationFailed(format!(
                "no region data for {ip}"
            )));
        }

        Ok(format!(
            "中国|{}|{}|{}|",
            parsed.region, parsed.pro, parsed.city
        ))
    }
}

fn first_valid_ip(value: &str) -> Option<String> {
    value
        .split(',')
        .map(str::trim)
        .find(|token| IpAddr::from_str(token).is_ok())
        .map(str::to_string)
}
