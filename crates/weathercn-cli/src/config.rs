use std::collections::HashMap;
use std::path::PathBuf;

use crate::transport::TRANSPORT_TIMEOUT_SECS;

pub const CITY_CODE_MAP_ENV: &str = "WEATHERCN_CITY_CODE_MAP";
pub const TIMEOUT_SECS_ENV: &str = "WEATHERCN_TIMEOUT_SECS";

const DEFAULT_CITY_CODE_MAP: &str = "resources/city_code_map.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub city_map_path: PathBuf,
    pub timeout_secs: u64,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Self::from_pairs(std::env::vars())
    }

    pub(crate) fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: HashMap<String, String> = pairs
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self {
            city_map_path: resolve_city_map_path(&map),
            timeout_secs: resolve_timeout_secs(&map),
        }
    }
}

fn resolve_city_map_path(env_map: &HashMap<String, String>) -> PathBuf {
    env_map
        .get(CITY_CODE_MAP_ENV)
        .map(String::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CITY_CODE_MAP))
}

fn resolve_timeout_secs(env_map: &HashMap<String, String>) -> u64 {
    env_map
        .get(TIMEOUT_SECS_ENV)
        .map(String::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(TRANSPORT_TIMEOUT_SECS)
}
