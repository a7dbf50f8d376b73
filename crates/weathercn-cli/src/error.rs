use thiserror::Error;

/// Domain error taxonomy. Every variant carries a stable numeric code so
/// callers (and the CLI envelope) can branch programmatically instead of
/// matching message text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WeatherError {
    #[error("city not found: {0}")]
    CityNotFound(String),
    #[error("api request failed ({url}): {message}")]
    ApiRequestFailed { url: String, message: String },
    #[error("data parse failed: {0}")]
    DataParseFailed(String),
    #[error("invalid parameter {name}: {value}")]
    InvalidParameter { name: String, value: String },
    #[error("location failed: {0}")]
    LocationFailed(String),
    #[error("unknown error: {0}")]
    Unknown(String),
}

impl WeatherError {
    pub fn code(&self) -> u16 {
        match self {
            WeatherError::CityNotFound(_) => 1001,
            WeatherError::ApiRequestFailed { .. } => 1002,
            WeatherError::DataParseFailed(_) => 1003,
            WeatherError::InvalidParameter { .. } => 1004,
            WeatherError::LocationFailed(_) => 1005,
            WeatherError::Unknown(_) => 9999,
        }
    }

    /// Transport failures are the only retryable class; not-found and
    /// parse failures are terminal for a given input.
    pub fn retryable(&self) -> bool {
        matches!(self, WeatherError::ApiRequestFailed { .. })
    }

    pub fn api_request_failed(url: impl Into<String>, message: impl Into<String>) -> Self {
        WeatherError::ApiRequestFailed {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn invalid_parameter(name: impl Into<String>, value: impl Into<String>) -> Self {
        WeatherError::InvalidParameter {
            name: name.into(),
            value: value.into(),
        }
    }
}
