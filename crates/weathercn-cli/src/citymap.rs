//! City-name → city-code table.
//!
//! The table is sourced externally (a JSON object file) and only
//! consumed here. Loading is deferred to first need and the result is
//! immutable afterwards; a missing or unreadable file degrades to an
//! empty table so lookups fail with `CityNotFound` instead of an I/O
//! error at construction time.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug)]
enum MapSource {
    Inline(HashMap<String, String>),
    File(PathBuf),
}

#[derive(Debug)]
pub struct CityCodeMap {
    source: MapSource,
    entries: OnceLock<HashMap<String, String>>,
}

impl CityCodeMap {
    pub fn from_map(map: HashMap<String, String>) -> Self {
        Self {
            source: MapSource::Inline(map),
            entries: OnceLock::new(),
        }
    }

    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            source: MapSource::File(path.into()),
            entries: OnceLock::new(),
        }
    }

    fn entries(&self) -> &HashMap<String, String> {
        self.entries.get_or_init(|| match &self.source {
            MapSource::Inline(map) => map.clone(),
            MapSource::File(path) => match std::fs::read_to_string(path) {
                Ok(payload) => serde_json::from_str(&payload).unwrap_or_else(|error| {
                    log::warn!("city code map {} unparsable: {error}", path.display());
                    HashMap::new()
                }),
                Err(error) => {
                    log::warn!("city code map {} unreadable: {error}", path.display());
                    HashMap::new()
                }
            },
        })
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Three-step lookup: exact raw name, exact normalized name, then a
    /// case-insensitive scan over normalized table keys. First match
    /// wins; empty codes never match.
    pub fn code_for(&self, name: &str) -> Option<&str> {
        let entries = self.entries();

        if let Some(code) = entries.get(name).filter(|code| !code.is_empty()) {
            return Some(code.as_str());
        }

        let normalized = normalize_city_name(name);
        if let Some(code) = entries.get(&normalized).filter(|code| !code.is_empty()) {
            return Some(code.as_str());
        }

        let folded = normalized.to_lowercase();
        entries
            .iter()
            .find(|(key, code)| {
                !code.is_empty() && normalize_city_name(key).to_lowercase() == folded
            })
            .map(|(_, code)| code.as_str())
    }

    /// Reverse lookup, derived on demand. When several names share one
    /// code the first match in table iteration order wins; the order is
    /// implementation-defined and not stable across runs.
    pub fn name_for(&self, code: &str) -> Option<&str> {
        if code.is_empty() {
            return None;
        }
        self.entries()
            .iter()
            .find(|(_, candidate)| candidate.as_str() == code)
            .map(|(name, _)| name.as_str())
    }
}

/// Strip administrative suffix particles (市/区/县/省) and every
/// non-alphanumeric, non-CJK character.
pub fn normalize_city_name(name: &str) -> String {
    let stripped: String = name
        .chars()
        .filter(|ch| !matches!(ch, '市' | '区' | '县' | '省'))
        .collect();
    non_name_chars().replace_all(&stripped, "").into_owned()
}

#[allow(clippy::expect_used)] // literal pattern, infallible at runtime
fn non_name_chars() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^\p{Han}a-zA-Z0-9]").expect("city name pattern"))
}
