//! Extraction of JSON values embedded in HTML/JavaScript payloads.
//!
//! The upstream endpoints serve `var <name> = {...};` assignments inside
//! otherwise opaque pages. Nested object literals cannot be bounded by a
//! regex alone, so [`extract_variable`] locates the assignment with a
//! pattern and then scans forward tracking brace depth. Flat fixed-shape
//! payloads get the cheaper [`extract_flat_variable`], and the JSONP
//! coordinate endpoint gets [`extract_jsonp`].

use regex::Regex;
use serde_json::Value;

use crate::error::WeatherError;

/// Extract the JSON object assigned to `var <var_name> = {...}`.
///
/// Returns `Ok(None)` when the variable is absent (callers decide
/// whether the field is optional) and `Err(DataParseFailed)` when the
/// assignment is present but its value cannot be decoded. Only the first
/// occurrence of the variable is considered.
pub fn extract_variable(text: &str, var_name: &str) -> Result<Option<Value>, WeatherError> {
    let pattern = Regex::new(&format!(
        r"var\s+{}\s*=\s*\{{",
        regex::escape(var_name)
    ))
    .map_err(|error| WeatherError::DataParseFailed(format!("variable pattern: {error}")))?;

    let Some(found) = pattern.find(text) else {
        return Ok(None);
    };

    let open = found.end() - 1;
    let Some(end) = balanced_end(text, open) else {
        return Err(WeatherError::DataParseFailed(format!(
            "unbalanced braces after var {var_name}"
        )));
    };

    let raw = &text[open..end];
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => Ok(Some(value)),
        // One retry after collapsing the provider's habitual trailing
        // comma before a closing brace sequence.
        Err(_) => {
            let repaired = strip_trailing_commas(raw);
            serde_json::from_str::<Value>(&repaired)
                .map(Some)
                .map_err(|error| {
                    WeatherError::DataParseFailed(format!("var {var_name}: {error}"))
                })
        }
    }
}

/// Extract a flat (non-nested) object assigned to `var <var_name>`,
/// bounded by a `{[^}]*}` regex. Suitable for the snapshot and alarm
/// payloads whose values never contain nested braces.
pub fn extract_flat_variable(text: &str, var_name: &str) -> Result<Option<Value>, WeatherError> {
    let pattern = Regex::new(&format!(
        r"var\s+{}\s*=\s*(\{{[^}}]*\}})",
        regex::escape(var_name)
    ))
    .map_err(|error| WeatherError::DataParseFailed(format!("variable pattern: {error}")))?;

    let Some(captures) = pattern.captures(text) else {
        return Ok(None);
    };
    let raw = captures
        .get(1)
        .map(|m| m.as_str())
        .unwrap_or_default();

    serde_json::from_str::<Value>(raw)
        .map(Some)
        .map_err(|error| WeatherError::DataParseFailed(format!("var {var_name}: {error}")))
}

/// Unwrap a JSONP `identifier(...)` envelope and parse the payload.
pub fn extract_jsonp(text: &str) -> Result<Value, WeatherError> {
    let trimmed = text.trim().trim_end_matches(';').trim_end();
    let open = trimmed
        .find('(')
        .ok_or_else(|| WeatherError::DataParseFailed("jsonp: missing callback wrapper".to_string()))?;

    let callback = &trimmed[..open];
    if callback.is_empty() || !is_identifier(callback) {
        return Err(WeatherError::DataParseFailed(format!(
            "jsonp: invalid callback identifier {callback:?}"
        )));
    }
    if !trimmed.ends_with(')') {
        return Err(WeatherError::DataParseFailed(
            "jsonp: missing closing parenthesis".to_string(),
        ));
    }

    let inner = &trimmed[open + 1..trimmed.len() - 1];
    serde_json::from_str::<Value>(inner)
        .map_err(|error| WeatherError::DataParseFailed(format!("jsonp payload: {error}")))
}

/// Scan from the opening brace at `open`, returning the exclusive end
/// offset of the balanced object, or `None` when the text runs out
/// before depth returns to zero.
fn balanced_end(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, byte) in text.as_bytes().iter().enumerate().skip(open) {
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn strip_trailing_commas(raw: &str) -> String {
    // `},}` → `}}` in a single pass, the one malformation the upstream
    // is known to produce.
    match Regex::new(r"\},\s*\}") {
        Ok(pattern) => pattern.replace_all(raw, "}}").into_owned(),
        Err(_) => raw.to_string(),
    }
}

fn is_identifier(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == '$' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '$')
}
