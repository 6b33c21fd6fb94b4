use thiserror::Error;

/// Failures produced by the lookup helpers and by weather providers.
///
/// `InvalidLocation` and `UnknownKind` signal bad input and go straight back
/// to the caller. `SourceUnavailable` and `MalformedResponse` are per-source
/// failures; the aggregation layer turns them into an omitted column instead
/// of aborting the whole view.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    #[error("{provider} is unavailable: {reason}")]
    SourceUnavailable { provider: String, reason: String },

    #[error("{provider} returned an unusable response: {reason}")]
    MalformedResponse { provider: String, reason: String },

    #[error("Unknown measurement kind '{0}'")]
    UnknownKind(String),
}

impl WeatherError {
    pub fn unavailable(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable { provider: provider.into(), reason: reason.into() }
    }

    pub fn malformed(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedResponse { provider: provider.into(), reason: reason.into() }
    }

    /// True for failures that belong to a single source rather than to the caller's input.
    pub fn is_source_failure(&self) -> bool {
        matches!(self, Self::SourceUnavailable { .. } | Self::MalformedResponse { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_failures_are_classified() {
        assert!(WeatherError::unavailable("nws", "timeout").is_source_failure());
        assert!(WeatherError::malformed("nws", "no current").is_source_failure());
        assert!(!WeatherError::InvalidLocation(String::new()).is_source_failure());
        assert!(!WeatherError::UnknownKind("x".into()).is_source_failure());
    }

    #[test]
    fn messages_name_the_provider() {
        let err = WeatherError::unavailable("open_meteo", "HTTP 503");
        assert_eq!(err.to_string(), "open_meteo is unavailable: HTTP 503");
    }
}
