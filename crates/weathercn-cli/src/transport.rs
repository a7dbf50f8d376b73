//! Blocking HTTP transport seam.
//!
//! The upstream rejects requests that do not look like a mobile browser
//! session, so every call carries the same fixed header set with a
//! per-host `Host` value. Tests substitute [`Transport`] with canned
//! payloads.

use std::time::Duration;

use reqwest::blocking::Client;

use crate::error::WeatherError;

pub const TRANSPORT_TIMEOUT_SECS: u64 = 10;

pub const D1_HOST: &str = "d1.weather.com.cn";
pub const D7_HOST: &str = "d7.weather.com.cn";

const USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_0 like Mac OS X) \
AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.0 Mobile/15E148 Safari/604.1";
const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.9";
const REFERER: &str = "https://www.weather.com.cn/";

/// One blocking round-trip: `send(url, headers) -> body`. Fails with
/// [`WeatherError::ApiRequestFailed`] on non-2xx status or network
/// error, carrying the URL and the underlying cause.
pub trait Transport {
    fn send(&self, url: &str, headers: &[(&str, &str)]) -> Result<String, WeatherError>;
}

/// The fixed header set simulating a mobile browser on `host`.
pub fn browser_headers(host: &'static str) -> [(&'static str, &'static str); 6] {
    [
        ("Accept", ACCEPT),
        ("Accept-Language", ACCEPT_LANGUAGE),
        ("Connection", "keep-alive"),
        ("User-Agent", USER_AGENT),
        ("Referer", REFERER),
        ("Host", host),
    ]
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, WeatherError> {
        Self::with_timeout(TRANSPORT_TIMEOUT_SECS)
    }

    pub fn with_timeout(timeout_secs: u64) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|error| {
                WeatherError::api_request_failed("client init", error.to_string())
            })?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, url: &str, headers: &[(&str, &str)]) -> Result<String, WeatherError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request
            .send()
            .map_err(|error| WeatherError::api_request_failed(url, error.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|error| WeatherError::api_request_failed(url, error.to_string()))?;

        if !status.is_success() {
            return Err(WeatherError::api_request_failed(
                url,
                format!("HTTP status {}", status.as_u16()),
            ));
        }

        Ok(body)
    }
}
