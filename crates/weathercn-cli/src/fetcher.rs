//! Upstream data pulls and normalization into the output records.
//!
//! Each endpoint serves an HTML/JS page with the payload assigned to a
//! JavaScript variable; extraction and code-table mapping happen here.
//! The clock is injected by the caller (the facade threads its `now_fn`
//! through) so the hourly staleness filter and the millisecond cache-
//! busting query parameter are testable with fixed instants.

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Asia::Shanghai;
use serde_json::Value;

use crate::codes::{aqi_category, weather_label, wind_power_label};
use crate::error::WeatherError;
use crate::extract::{extract_flat_variable, extract_variable};
use crate::geoip::RegionLookup;
use crate::model::{
    AirQuality, DailyForecast, HourlyForecast, WeatherBundle, WeatherDetail, WeatherIndex,
    WeatherSnapshot,
};
use crate::resolver::CityResolver;
use crate::transport::{D1_HOST, Transport, browser_headers};

const SNAPSHOT_BASE: &str = "https://d1.weather.com.cn/sk_2d";
const MULTI_DAY_BASE: &str = "https://d1.weather.com.cn/weixinfc";
const HOURLY_BASE: &str = "https://d1.weather.com.cn/wap_180h";
const DETAIL_BASE: &str = "https://d1.weather.com.cn/weather_index";

/// Hourly timestamps use the provider's wall clock, `YYYYMMDDhhmm`.
const HOURLY_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M";

/// Lifestyle-index prefixes inside the detail payload's `zs` object,
/// with display names used when the payload omits `<prefix>_name`.
const INDEX_PREFIXES: [(&str, &str); 30] = [
    ("ct", "穿衣指数"),
    ("lk", "路况指数"),
    ("dy", "钓鱼指数"),
    ("cl", "晨练指数"),
    ("nl", "夜生活指数"),
    ("uv", "紫外线强度指数"),
    ("gm", "感冒指数"),
    ("gj", "逛街指数"),
    ("pl", "空气污染扩散条件指数"),
    ("tr", "旅游指数"),
    ("co", "舒适度指数"),
    ("pj", "啤酒指数"),
    ("hc", "划船指数"),
    ("gl", "太阳镜指数"),
    ("wc", "风寒指数"),
    ("pk", "放风筝指数"),
    ("ac", "空调开启指数"),
    ("ls", "晾晒指数"),
    ("xc", "洗车指数"),
    ("xq", "心情指数"),
    ("zs", "中暑指数"),
    ("jt", "交通指数"),
    ("yh", "约会指数"),
    ("yd", "运动指数"),
    ("ag", "过敏指数"),
    ("mf", "美发指数"),
    ("ys", "雨伞指数"),
    ("fs", "防晒指数"),
    ("pp", "化妆指数"),
    ("gz", "干燥指数"),
];

/// The provider's wall clock for a UTC instant.
pub fn provider_local(now: DateTime<Utc>) -> NaiveDateTime {
    now.with_timezone(&Shanghai).naive_local()
}

fn endpoint_url(base: &str, code: &str, now: DateTime<Utc>) -> String {
    format!("{base}/{code}.html?_={}", now.timestamp_millis())
}

/// Current snapshot from the `sk_2d` endpoint.
pub fn fetch_snapshot<T, G>(
    transport: &T,
    resolver: &CityResolver<G>,
    code: &str,
    now: DateTime<Utc>,
) -> Result<WeatherSnapshot, WeatherError>
where
    T: Transport,
    G: RegionLookup,
{
    let url = endpoint_url(SNAPSHOT_BASE, code, now);
    let body = transport.send(&url, &browser_headers(D1_HOST))?;

    let data = extract_flat_variable(&body, "dataSK")?
        .ok_or_else(|| WeatherError::DataParseFailed("snapshot dataSK not found".to_string()))?;

    let local = provider_local(now);
    let wind_code = text_field(&data, "WS");

    Ok(WeatherSnapshot {
        city_code: code.to_string(),
        city_name: display_city_name(&data, resolver, code),
        temperature: text_field(&data, "temp"),
        weather: text_field(&data, "weather"),
        wind_direction: text_field(&data, "WD"),
        wind_power: wind_power_label(&wind_code).to_string(),
        humidity: text_field(&data, "SD"),
        time: non_empty_or(text_field(&data, "time"), || {
            local.format("%H:%M").to_string()
        }),
        date: non_empty_or(text_field(&data, "date"), || {
            local.format("%Y-%m-%d").to_string()
        }),
        aqi: text_field(&data, "aqi"),
        air: aqi_category(numeric_field(&data, "aqi")).to_string(),
        pm25: text_field(&data, "aqi_pm25"),
        rain: text_field(&data, "rain"),
        rain24h: text_field(&data, "rain24h"),
        atmospheric_pressure: text_field(&data, "qy"),
        visibility: text_field(&data, "njd"),
        city_name_en: text_field(&data, "nameen"),
        temperature_f: text_field(&data, "tempf"),
        wind_direction_en: text_field(&data, "wde"),
        wind_speed: text_field(&data, "wse"),
        weather_en: text_field(&data, "weathere"),
        weather_code: text_field(&data, "weathercode"),
        limit_number: text_field(&data, "limitnumber"),
    })
}

/// Multi-day forecast from the `weixinfc` endpoint, ordered by date
/// ascending as served.
pub fn fetch_multi_day<T: Transport>(
    transport: &T,
    code: &str,
    now: DateTime<Utc>,
) -> Result<Vec<DailyForecast>, WeatherError> {
    let url = endpoint_url(MULTI_DAY_BASE, code, now);
    let body = transport.send(&url, &browser_headers(D1_HOST))?;

    let fc = extract_variable(&body, "fc")?
        .ok_or_else(|| WeatherError::DataParseFailed("multi-day fc not found".to_string()))?;
    let entries = fc
        .get("f")
        .and_then(Value::as_array)
        .filter(|entries| !entries.is_empty())
        .ok_or_else(|| WeatherError::DataParseFailed("multi-day f entries missing".to_string()))?;

    Ok(entries.iter().map(daily_from_entry).collect())
}

fn daily_from_entry(entry: &Value) -> DailyForecast {
    let day_label = weather_label(&text_field(entry, "fa")).to_string();
    let night_label = weather_label(&text_field(entry, "fb")).to_string();
    let combined = if day_label == night_label {
        day_label.clone()
    } else {
        format!("{day_label}转{night_label}")
    };

    let wind_power_day = text_field(entry, "fg");
    let wind_power_night = text_field(entry, "fh");

    DailyForecast {
        date: text_field(entry, "fi"),
        day: text_field(entry, "fj"),
        weather: combined,
        weather_day: day_label,
        weather_night: night_label,
        temp_max: text_field(entry, "fc"),
        temp_min: text_field(entry, "fd"),
        wind_day: text_field(entry, "fe"),
        wind_night: text_field(entry, "ff"),
        wind_power_day: wind_power_label(&wind_power_day).to_string(),
        wind_power_night: wind_power_label(&wind_power_night).to_string(),
        humidity_day: text_field(entry, "fm"),
        humidity_night: text_field(entry, "fn"),
    }
}

/// Hourly forecast from the `wap_180h` endpoint, keeping only entries
/// strictly later than `now` on the provider's clock. Entries with
/// malformed or short timestamps are dropped without error.
pub fn fetch_hourly<T: Transport>(
    transport: &T,
    code: &str,
    now: DateTime<Utc>,
) -> Result<Vec<HourlyForecast>, WeatherError> {
    let url = endpoint_url(HOURLY_BASE, code, now);
    let body = transport.send(&url, &browser_headers(D1_HOST))?;

    let fc180 = extract_variable(&body, "fc180")?
        .ok_or_else(|| WeatherError::DataParseFailed("hourly fc180 not found".to_string()))?;
    let entries = fc180
        .get("jh")
        .and_then(Value::as_array)
        .filter(|entries| !entries.is_empty())
        .ok_or_else(|| WeatherError::DataParseFailed("hourly jh entries missing".to_string()))?;

    let cutoff = provider_local(now);
    let mut result = Vec::new();
    for entry in entries {
        let full_time = text_field(entry, "jf");
        if full_time.len() != 12 {
            continue;
        }
        let Ok(forecast_time) = NaiveDateTime::parse_from_str(&full_time, HOURLY_TIMESTAMP_FORMAT)
        else {
            continue;
        };
        if forecast_time <= cutoff {
            continue;
        }

        let display_time = format!(
            "{}:{}",
            full_time.get(8..10).unwrap_or_default(),
            full_time.get(10..12).unwrap_or_default()
        );
        let condition = text_field(entry, "ja");
        let wind_power = text_field(entry, "ji");
        result.push(HourlyForecast {
            data_time: full_time,
            time: display_time,
            temperature: text_field(entry, "jd"),
            weather: weather_label(&condition).to_string(),
            wind_direction: text_field(entry, "jh"),
            wind_power: wind_power_label(&wind_power).to_string(),
            humidity: text_field(entry, "je"),
        });
    }

    Ok(result)
}

/// Advisory detail from the `weather_index` endpoint. Never fails: any
/// transport or parse problem degrades to the empty detail.
pub fn fetch_detail<T: Transport>(transport: &T, code: &str, now: DateTime<Utc>) -> WeatherDetail {
    match fetch_detail_inner(transport, code, now) {
        Ok(detail) => detail,
        Err(error) => {
            log::warn!("weather detail for {code} degraded to empty: {error}");
            WeatherDetail::default()
        }
    }
}

fn fetch_detail_inner<T: Transport>(
    transport: &T,
    code: &str,
    now: DateTime<Utc>,
) -> Result<WeatherDetail, WeatherError> {
    let url = endpoint_url(DETAIL_BASE, code, now);
    let body = transport.send(&url, &browser_headers(D1_HOST))?;

    let mut detail = WeatherDetail::default();

    // Each block is best-effort: a malformed section is skipped, not
    // fatal for the others.
    if let Ok(Some(data)) = extract_flat_variable(&body, "dataSK") {
        detail.air_quality = Some(AirQuality {
            aqi: text_field(&data, "aqi"),
            pm25: text_field(&data, "aqi_pm25"),
            air: aqi_category(numeric_field(&data, "aqi")).to_string(),
            temperature: text_field(&data, "temp"),
            humidity: text_field(&data, "sd"),
            weather: text_field(&data, "weather"),
            wind_direction: text_field(&data, "WD"),
            wind_speed: text_field(&data, "WS"),
            wind_speed_explicit: text_field(&data, "wse"),
            visibility: text_field(&data, "njd"),
            pressure: text_field(&data, "qy"),
            rain: text_field(&data, "rain"),
            rain24h: text_field(&data, "rain24h"),
            time: text_field(&data, "time"),
            date: text_field(&data, "date"),
        });
    }

    if let Ok(Some(data_zs)) = extract_variable(&body, "dataZS") {
        if let Some(zs) = data_zs.get("zs") {
            detail.indices = indices_from_catalogue(zs);
        }
    }

    // cityDZ and alarmDZ nest objects, so they need the balanced scan.
    if let Ok(Some(city_dz)) = extract_variable(&body, "cityDZ") {
        if let Some(info) = city_dz.get("weatherinfo") {
            detail.city_info = Some(info.clone());
        }
    }

    if let Ok(Some(alarm)) = extract_variable(&body, "alarmDZ") {
        detail.alarm = Some(alarm);
    }

    Ok(detail)
}

fn indices_from_catalogue(zs: &Value) -> Vec<WeatherIndex> {
    let mut indices = Vec::new();
    for (prefix, display_name) in INDEX_PREFIXES {
        let name = zs.get(format!("{prefix}_name"));
        let hint = zs.get(format!("{prefix}_hint"));
        let short = zs.get(format!("{prefix}_des_s"));
        if name.is_none() && hint.is_none() && short.is_none() {
            continue;
        }

        indices.push(WeatherIndex {
            name: name
                .map(value_text)
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| display_name.to_string()),
            short_name: prefix.to_string(),
            level: hint.map(value_text).unwrap_or_default(),
            description: short.map(value_text).unwrap_or_default(),
            full_description: zs
                .get(format!("{prefix}_des"))
                .map(value_text)
                .unwrap_or_default(),
        });
    }
    indices
}

/// One pull per endpoint: `7day`/`15day` are slices of a single
/// multi-day fetch, hourly is truncated after the staleness filter, and
/// a failed detail never aborts the bundle.
pub fn fetch_all<T: Transport>(
    transport: &T,
    code: &str,
    hourly_limit: usize,
    now: DateTime<Utc>,
) -> Result<WeatherBundle, WeatherError> {
    let detail = fetch_detail(transport, code, now);

    let multi_day = fetch_multi_day(transport, code, now)?;
    let seven_day: Vec<DailyForecast> = multi_day.iter().take(7).cloned().collect();
    let fifteen_day: Vec<DailyForecast> = multi_day.into_iter().take(15).collect();

    let mut hourly = fetch_hourly(transport, code, now)?;
    hourly.truncate(hourly_limit);

    Ok(WeatherBundle {
        detail,
        seven_day,
        hourly,
        fifteen_day,
    })
}

/// Display-name priority: payload name, then the cached visitor city
/// when its resolved code matches, then reverse table lookup, then the
/// code itself.
fn display_city_name<G: RegionLookup>(
    data: &Value,
    resolver: &CityResolver<G>,
    code: &str,
) -> String {
    let payload_name = text_field(data, "cityname");
    if !payload_name.is_empty() {
        return payload_name;
    }

    if let Some(visitor) = resolver.cached_visitor() {
        if visitor.city_code == code && !visitor.city.is_empty() {
            return visitor.city;
        }
    }

    resolver
        .city_map()
        .name_for(code)
        .map(str::to_string)
        .unwrap_or_else(|| code.to_string())
}

fn text_field(data: &Value, key: &str) -> String {
    data.get(key).map(value_text).unwrap_or_default()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        _ => String::new(),
    }
}

fn numeric_field(data: &Value, key: &str) -> i64 {
    data.get(key)
        .and_then(|value| {
            value
                .as_i64()
                .or_else(|| value.as_str().and_then(|text| text.parse().ok()))
        })
        .unwrap_or(0)
}

fn non_empty_or(value: String, fallback: impl FnOnce() -> String) -> String {
    if value.is_empty() { fallback() } else { value }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::TimeZone;

    use super::*;
    use crate::citymap::CityCodeMap;

    struct FakeTransport {
        routes: Vec<(&'static str, Result<String, WeatherError>)>,
    }

    impl Transport for FakeTransport {
        fn send(&self, url: &str, _headers: &[(&str, &str)]) -> Result<String, WeatherError> {
            for (fragment, response) in &self.routes {
                if url.contains(fragment) {
                    return response.clone();
                }
            }
            Err(WeatherError::api_request_failed(url, "no route"))
        }
    }

    struct NoRegion;

    impl RegionLookup for NoRegion {
        fn lookup(&self, _ip: &str) -> Result<String, WeatherError> {
            Err(WeatherError::LocationFailed("unused".to_string()))
        }
    }

    fn resolver_with(entries: &[(&str, &str)]) -> CityResolver<NoRegion> {
        let map: HashMap<String, String> = entries
            .iter()
            .map(|(name, code)| (name.to_string(), code.to_string()))
            .collect();
        CityResolver::new(NoRegion, CityCodeMap::from_map(map))
    }

    /// 2026-01-07T19:30 on the provider's clock (11:30 UTC).
    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 7, 11, 30, 0)
            .single()
            .expect("time")
    }

    fn snapshot_body() -> String {
        concat!(
            r#"<html>var dataSK = {"cityname":"贵阳","temp":"3","weather":"多云","WD":"北风","#,
            r#""WS":"02","SD":"62%","time":"19:05","date":"2026-01-07","aqi":45,"aqi_pm25":"30","#,
            r#""rain":"0","rain24h":"0","qy":"889","njd":"18km","nameen":"guiyang","tempf":"37.4","#,
            r#""wde":"N","wse":"8km/h","weathere":"Cloudy","weathercode":"d01","limitnumber":""};"#,
            "</html>"
        )
        .to_string()
    }

    fn multi_day_body() -> String {
        concat!(
            r#"var fc = {"f":["#,
            r#"{"fa":"01","fb":"02","fc":"8","fd":"1","fe":"北风","ff":"北风","fg":"1","fh":"2","fi":"1/7","fj":"周三","fm":"60","fn":"70"},"#,
            r#"{"fa":"00","fb":"00","fc":"10","fd":"2","fe":"南风","ff":"南风","fg":"02","fh":"02","fi":"1/8","fj":"周四","fm":"55","fn":"65"},"#,
            r#"{"fa":"03","fb":"03","fc":"6","fd":"0","fe":"北风","ff":"北风","fg":"3","fh":"3","fi":"1/9","fj":"周五","fm":"80","fn":"85"}"#,
            r#"]};"#
        )
        .to_string()
    }

    fn many_day_body(days: usize) -> String {
        let entries: Vec<String> = (0..days)
            .map(|index| {
                format!(
                    r#"{{"fa":"01","fb":"01","fc":"8","fd":"1","fe":"北风","ff":"北风","fg":"1","fh":"1","fi":"1/{}","fj":"周三","fm":"60","fn":"70"}}"#,
                    index + 1
                )
            })
            .collect();
        format!(r#"var fc = {{"f":[{}]}};"#, entries.join(","))
    }

    fn hourly_body() -> String {
        concat!(
            r#"var fc180 = {"jh":["#,
            r#"{"jf":"202601071900","ja":"01","jd":"2","jh":"北风","ji":"1","je":"60"},"#,
            r#"{"jf":"202601072000","ja":"02","jd":"1","jh":"北风","ji":"2","je":"65"},"#,
            r#"{"jf":"abc","ja":"00","jd":"9","jh":"南风","ji":"1","je":"50"},"#,
            r#"{"jf":"202601072100","ja":"03","jd":"0","jh":"北风","ji":"02","je":"70"}"#,
            r#"]};"#
        )
        .to_string()
    }

    fn detail_body() -> String {
        concat!(
            r#"var dataSK = {"aqi":"120","aqi_pm25":"88","temp":"3","sd":"62%","weather":"霾","#,
            r#""WD":"静风","WS":"0级","wse":"2km/h","njd":"5km","qy":"1020","rain":"0","#,
            r#""rain24h":"0","time":"19:05","date":"2026-01-07"};"#,
            r#"var dataZS = {"zs":{"ct_name":"穿衣","ct_hint":"冷","ct_des_s":"建议棉衣","ct_des":"天冷，建议穿棉衣。","#,
            r#""uv_hint":"最弱","uv_des_s":"无需防晒","xc_des":"只有长描述","gm_name":""},};"#,
            r#"var cityDZ = {"weatherinfo":{"city":"101260101"}};"#,
            r#"var alarmDZ = {"w":[]};"#
        )
        .to_string()
    }

    #[test]
    fn snapshot_maps_payload_fields_and_code_tables() {
        let transport = FakeTransport {
            routes: vec![("sk_2d", Ok(snapshot_body()))],
        };
        let resolver = resolver_with(&[("贵阳", "101260101")]);

        let snapshot =
            fetch_snapshot(&transport, &resolver, "101260101", fixed_now()).expect("snapshot");

        assert_eq!(snapshot.city_name, "贵阳");
        assert_eq!(snapshot.temperature, "3");
        assert_eq!(snapshot.wind_power, "2级");
        assert_eq!(snapshot.aqi, "45");
        assert_eq!(snapshot.air, "优");
        assert_eq!(snapshot.weather_en, "Cloudy");
        assert_eq!(snapshot.limit_number, "");
    }

    #[test]
    fn snapshot_without_payload_name_uses_visitor_cache_when_code_matches() {
        let body = r#"var dataSK = {"temp":"3"};"#.to_string();
        let transport = FakeTransport {
            routes: vec![("sk_2d", Ok(body))],
        };
        let resolver = resolver_with(&[("贵阳", "101260101")]);

        // Seed the visitor cache through a resolver with a matching code.
        struct Guiyang;
        impl RegionLookup for Guiyang {
            fn lookup(&self, _ip: &str) -> Result<String, WeatherError> {
                Ok("中国|0|贵州|贵阳市|".to_string())
            }
        }
        let map: HashMap<String, String> =
            [("贵阳".to_string(), "101260101".to_string())].into();
        let caching_resolver = CityResolver::new(Guiyang, CityCodeMap::from_map(map));
        caching_resolver
            .visitor_location(Some("114.247.50.2"), &[])
            .expect("visitor");

        let snapshot = fetch_snapshot(&transport, &caching_resolver, "101260101", fixed_now())
            .expect("snapshot");
        assert_eq!(snapshot.city_name, "贵阳");

        // Without cache or payload name, the reverse table wins.
        let snapshot = fetch_snapshot(&transport, &resolver, "101260101", fixed_now())
            .expect("snapshot");
        assert_eq!(snapshot.city_name, "贵阳");

        // And an unmapped code falls back to the code itself.
        let empty_resolver = resolver_with(&[]);
        let snapshot = fetch_snapshot(&transport, &empty_resolver, "101260101", fixed_now())
            .expect("snapshot");
        assert_eq!(snapshot.city_name, "101260101");
    }

    #[test]
    fn snapshot_defaults_time_and_date_from_provider_clock() {
        let body = r#"var dataSK = {"temp":"3"};"#.to_string();
        let transport = FakeTransport {
            routes: vec![("sk_2d", Ok(body))],
        };
        let resolver = resolver_with(&[]);

        let snapshot =
            fetch_snapshot(&transport, &resolver, "101260101", fixed_now()).expect("snapshot");
        assert_eq!(snapshot.time, "19:30");
        assert_eq!(snapshot.date, "2026-01-07");
    }

    #[test]
    fn snapshot_missing_datask_is_parse_failure() {
        let transport = FakeTransport {
            routes: vec![("sk_2d", Ok("<html>maintenance</html>".to_string()))],
        };
        let resolver = resolver_with(&[]);

        let error = fetch_snapshot(&transport, &resolver, "101260101", fixed_now())
            .expect_err("must fail");
        assert_eq!(error.code(), 1003);
    }

    #[test]
    fn multi_day_composes_transition_label_only_when_conditions_differ() {
        let transport = FakeTransport {
            routes: vec![("weixinfc", Ok(multi_day_body()))],
        };

        let days = fetch_multi_day(&transport, "101260101", fixed_now()).expect("days");
        assert_eq!(days.len(), 3);
        assert_eq!(days[0].weather, "多云转阴");
        assert_eq!(days[1].weather, "晴");
        assert_eq!(days[2].weather, "小雨");
        assert_eq!(days[0].wind_power_day, "1级");
        assert_eq!(days[1].wind_power_day, "2级");
        assert_eq!(days[0].date, "1/7");
    }

    #[test]
    fn multi_day_empty_entries_is_parse_failure() {
        let transport = FakeTransport {
            routes: vec![("weixinfc", Ok(r#"var fc = {"f":[]};"#.to_string()))],
        };

        let error = fetch_multi_day(&transport, "101260101", fixed_now()).expect_err("must fail");
        assert_eq!(error.code(), 1003);
    }

    #[test]
    fn hourly_filter_keeps_only_strictly_future_entries() {
        let transport = FakeTransport {
            routes: vec![("wap_180h", Ok(hourly_body()))],
        };

        // Provider-local now is 19:30: the 19:00 entry is stale, the
        // malformed "abc" entry is dropped silently.
        let hours = fetch_hourly(&transport, "101260101", fixed_now()).expect("hours");
        assert_eq!(hours.len(), 2);
        assert_eq!(hours[0].data_time, "202601072000");
        assert_eq!(hours[0].time, "20:00");
        assert_eq!(hours[0].weather, "阴");
        assert_eq!(hours[1].data_time, "202601072100");
        assert_eq!(hours[1].wind_power, "2级");
    }

    #[test]
    fn hourly_entry_equal_to_now_is_excluded() {
        let body = concat!(
            r#"var fc180 = {"jh":["#,
            r#"{"jf":"202601071930","ja":"01","jd":"2","jh":"北风","ji":"1","je":"60"}"#,
            r#"]};"#
        )
        .to_string();
        let transport = FakeTransport {
            routes: vec![("wap_180h", Ok(body))],
        };

        let hours = fetch_hourly(&transport, "101260101", fixed_now()).expect("hours");
        assert!(hours.is_empty());
    }

    #[test]
    fn detail_parses_air_quality_and_index_catalogue() {
        let transport = FakeTransport {
            routes: vec![("weather_index", Ok(detail_body()))],
        };

        let detail = fetch_detail(&transport, "101260101", fixed_now());
        let air = detail.air_quality.expect("air quality");
        assert_eq!(air.aqi, "120");
        assert_eq!(air.air, "轻度污染");
        assert_eq!(air.humidity, "62%");

        // ct carries every field, uv lacks a name (display name kicks
        // in), xc has only the long description and is excluded, gm has
        // an empty name and nothing else but is still listed.
        let names: Vec<&str> = detail
            .indices
            .iter()
            .map(|index| index.short_name.as_str())
            .collect();
        assert_eq!(names, vec!["ct", "uv", "gm"]);

        let ct = detail
            .indices
            .iter()
            .find(|index| index.short_name == "ct")
            .expect("ct index");
        assert_eq!(ct.name, "穿衣");
        assert_eq!(ct.level, "冷");
        assert_eq!(ct.full_description, "天冷，建议穿棉衣。");

        let uv = detail
            .indices
            .iter()
            .find(|index| index.short_name == "uv")
            .expect("uv index");
        assert_eq!(uv.name, "紫外线强度指数");
        assert_eq!(uv.level, "最弱");

        assert!(detail.indices.iter().all(|index| index.short_name != "xc"));

        assert!(detail.city_info.is_some());
        assert!(detail.alarm.is_some());
    }

    #[test]
    fn detail_transport_failure_degrades_to_empty() {
        let transport = FakeTransport {
            routes: vec![(
                "weather_index",
                Err(WeatherError::api_request_failed("detail", "HTTP status 503")),
            )],
        };

        let detail = fetch_detail(&transport, "101260101", fixed_now());
        assert!(detail.is_empty());
    }

    #[test]
    fn fetch_all_slices_one_multi_day_pull_into_prefixes() {
        let transport = FakeTransport {
            routes: vec![
                ("weixinfc", Ok(many_day_body(17))),
                ("wap_180h", Ok(hourly_body())),
                ("weather_index", Ok(detail_body())),
            ],
        };

        let bundle =
            fetch_all(&transport, "101260101", 24, fixed_now()).expect("bundle");

        assert_eq!(bundle.seven_day.len(), 7);
        assert_eq!(bundle.fifteen_day.len(), 15);
        assert_eq!(bundle.seven_day[..], bundle.fifteen_day[..7]);
        assert_eq!(bundle.seven_day[0].date, "1/1");
        assert_eq!(bundle.fifteen_day[14].date, "1/15");
    }

    #[test]
    fn fetch_all_truncates_hourly_after_staleness_filter() {
        let transport = FakeTransport {
            routes: vec![
                ("weixinfc", Ok(multi_day_body())),
                ("wap_180h", Ok(hourly_body())),
                ("weather_index", Ok(detail_body())),
            ],
        };

        let bundle = fetch_all(&transport, "101260101", 1, fixed_now()).expect("bundle");
        assert_eq!(bundle.hourly.len(), 1);
        assert_eq!(bundle.hourly[0].data_time, "202601072000");
    }

    #[test]
    fn fetch_all_survives_detail_endpoint_failure() {
        let transport = FakeTransport {
            routes: vec![
                ("weixinfc", Ok(multi_day_body())),
                ("wap_180h", Ok(hourly_body())),
                (
                    "weather_index",
                    Err(WeatherError::api_request_failed("detail", "HTTP status 500")),
                ),
            ],
        };

        let bundle =
            fetch_all(&transport, "101260101", 24, fixed_now()).expect("bundle");
        assert!(bundle.detail.is_empty());
        assert!(!bundle.seven_day.is_empty());
        assert!(!bundle.hourly.is_empty());
        assert!(!bundle.fifteen_day.is_empty());
    }

    #[test]
    fn fetch_all_propagates_multi_day_failure() {
        let transport = FakeTransport {
            routes: vec![
                (
                    "weixinfc",
                    Err(WeatherError::api_request_failed("fc", "HTTP status 502")),
                ),
                ("wap_180h", Ok(hourly_body())),
                ("weather_index", Ok(detail_body())),
            ],
        };

        let error = fetch_all(&transport, "101260101", 24, fixed_now())
            .expect_err("must fail");
        assert!(error.retryable());
    }

    #[test]
    fn endpoint_urls_carry_millisecond_timestamp() {
        let url = endpoint_url(SNAPSHOT_BASE, "101010100", fixed_now());
        assert_eq!(
            url,
            format!(
                "https://d1.weather.com.cn/sk_2d/101010100.html?_={}",
                fixed_now().timestamp_millis()
            )
        );
    }
}
