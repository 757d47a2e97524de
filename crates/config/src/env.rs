use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

/// Read an environment variable, treating an empty value as unset.
pub(crate) fn var(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if value.trim().is_empty() => None,
        Ok(value) => Some(value),
        Err(_) => None,
    }
}

/// Parse an environment variable with `FromStr`, falling back to a default.
pub(crate) fn parsed<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(name) {
        Some(value) => value.parse().with_context(|| format!("invalid value for {name}")),
        None => Ok(default),
    }
}

/// Parse a boolean flag. Accepts `true/false`, `1/0`, `yes/no`, `on/off`.
pub(crate) fn flag(name: &str, default: bool) -> anyhow::Result<bool> {
    let Some(value) = var(name) else {
        return Ok(default);
    };

    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => anyhow::bail!("invalid value for {name}: expected a boolean, got '{other}'"),
    }
}

/// Parse a duration with human-friendly suffixes (`30s`, `2m`, `120`).
///
/// A bare number is interpreted as seconds.
pub(crate) fn duration(name: &str, default: Duration) -> anyhow::Result<Duration> {
    let Some(value) = var(name) else {
        return Ok(default);
    };

    if let Ok(secs) = value.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    duration_str::parse(&value).map_err(|e| anyhow::anyhow!("invalid value for {name}: {e}"))
}
