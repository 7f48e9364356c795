use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueParseError {
    #[error("'{0}' is not a whole number of seconds")]
    InvalidSeconds(String),
    #[error("A zero-length interval is not allowed")]
    ZeroInterval,
}

/// Parse a positive number of seconds, e.g. a polling interval. A trailing `s` is accepted, so `30` and `30s` are
/// equivalent.
pub fn parse_seconds(value: &str) -> Result<Duration, ValueParseError> {
    let trimmed = value.trim();
    let digits = trimmed.strip_suffix('s').unwrap_or(trimmed);
    let secs = digits.parse::<u64>().map_err(|_| ValueParseError::InvalidSeconds(value.to_string()))?;
    if secs == 0 {
        return Err(ValueParseError::ZeroInterval);
    }
    Ok(Duration::from_secs(secs))
}

/// Split a comma separated list into lower-case, trimmed, non-empty entries.
pub fn parse_list(value: &str) -> Vec<String> {
    value.split(',').map(|s| s.trim().to_ascii_lowercase()).filter(|s| !s.is_empty()).collect()
}
