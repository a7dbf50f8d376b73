//! Output records. Every field the upstream may omit defaults to an
//! empty string; absence is never an error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WeatherError;

/// IP-derived location tuple, distinct from a caller-specified location.
/// `city_code` stays empty when the city-code table has no match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitorLocation {
    pub ip: String,
    pub province: String,
    pub city: String,
    pub district: String,
    pub city_code: String,
}

/// Current-instant reading from the snapshot endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub city_code: String,
    pub city_name: String,
    pub temperature: String,
    pub weather: String,
    pub wind_direction: String,
    pub wind_power: String,
    pub humidity: String,
    pub time: String,
    pub date: String,
    pub aqi: String,
    pub air: String,
    pub pm25: String,
    pub rain: String,
    pub rain24h: String,
    pub atmospheric_pressure: String,
    pub visibility: String,
    pub city_name_en: String,
    pub temperature_f: String,
    pub wind_direction_en: String,
    pub wind_speed: String,
    pub weather_en: String,
    pub weather_code: String,
    pub limit_number: String,
}

/// One day of the multi-day forecast, ordered by date ascending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub date: String,
    pub day: String,
    pub weather: String,
    pub weather_day: String,
    pub weather_night: String,
    pub temp_max: String,
    pub temp_min: String,
    pub wind_day: String,
    pub wind_night: String,
    pub wind_power_day: String,
    pub wind_power_night: String,
    pub humidity_day: String,
    pub humidity_night: String,
}

/// One future-only hourly entry. `data_time` keeps the raw 12-character
/// provider timestamp, `time` the display `hh:mm` form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HourlyForecast {
    pub data_time: String,
    pub time: String,
    pub temperature: String,
    pub weather: String,
    pub wind_direction: String,
    pub wind_power: String,
    pub humidity: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AirQuality {
    pub aqi: String,
    pub pm25: String,
    pub air: String,
    pub temperature: String,
    pub humidity: String,
    pub weather: String,
    pub wind_direction: String,
    pub wind_speed: String,
    pub wind_speed_explicit: String,
    pub visibility: String,
    pub pressure: String,
    pub rain: String,
    pub rain24h: String,
    pub time: String,
    pub date: String,
}

/// One lifestyle index (clothing, UV, comfort, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherIndex {
    pub name: String,
    pub short_name: String,
    pub level: String,
    pub description: String,
    pub full_description: String,
}

/// Advisory detail block. Always optional: a failed detail fetch yields
/// the default (empty) value instead of an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherDetail {
    pub air_quality: Option<AirQuality>,
    pub indices: Vec<WeatherIndex>,
    pub city_info: Option<Value>,
    pub alarm: Option<Value>,
}

impl WeatherDetail {
    pub fn is_empty(&self) -> bool {
        self.air_quality.is_none()
            && self.indices.is_empty()
            && self.city_info.is_none()
            && self.alarm.is_none()
    }
}

/// The comprehensive payload: one multi-day pull sliced two ways plus
/// the filtered hourly sequence and the advisory detail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherBundle {
    pub detail: WeatherDetail,
    #[serde(rename = "7day")]
    pub seven_day: Vec<DailyForecast>,
    pub hourly: Vec<HourlyForecast>,
    #[serde(rename = "15day")]
    pub fifteen_day: Vec<DailyForecast>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherKind {
    Basic,
    Detail,
    SevenDay,
    Hourly,
    FifteenDay,
    Comprehensive,
}

impl WeatherKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Detail => "detail",
            Self::SevenDay => "7day",
            Self::Hourly => "hourly",
            Self::FifteenDay => "15day",
            Self::Comprehensive => "comprehensive",
        }
    }
}

impl std::str::FromStr for WeatherKind {
    type Err = WeatherError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "basic" => Ok(Self::Basic),
            "detail" => Ok(Self::Detail),
            "7day" => Ok(Self::SevenDay),
            "hourly" => Ok(Self::Hourly),
            "15day" => Ok(Self::FifteenDay),
            "comprehensive" => Ok(Self::Comprehensive),
            other => Err(WeatherError::invalid_parameter("type", other)),
        }
    }
}

/// Result payload of a single `get_weather` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WeatherData {
    Snapshot(WeatherSnapshot),
    Detail(WeatherDetail),
    Daily(Vec<DailyForecast>),
    Hourly(Vec<HourlyForecast>),
    Bundle(Box<WeatherBundle>),
}
