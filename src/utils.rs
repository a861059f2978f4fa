use chrono::{DateTime, TimeDelta, Timelike, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::env;

pub const DEFAULT_SESSION_DURATION_HOURS: f64 = 5.0;
/// One leap year. Longer windows are rejected as configuration errors.
pub const MAX_SESSION_DURATION_HOURS: f64 = 24.0 * 366.0;

/// Drops minutes, seconds and sub-second parts (UTC).
pub fn floor_to_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

/// Session length as a `TimeDelta`, millisecond resolution. Returns `None` for
/// non-finite, non-positive, sub-millisecond or longer-than-a-year hours.
pub fn hours_to_duration(hours: f64) -> Option<TimeDelta> {
    if !hours.is_finite() || hours <= 0.0 || hours > MAX_SESSION_DURATION_HOURS {
        return None;
    }
    let ms = (hours * 3_600_000.0).round();
    if ms < 1.0 {
        return None;
    }
    TimeDelta::try_milliseconds(ms as i64)
}

/// `ts + d`, pinned to the last representable instant instead of overflowing.
pub fn saturating_add(ts: DateTime<Utc>, d: TimeDelta) -> DateTime<Utc> {
    ts.checked_add_signed(d).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

pub fn minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 60_000.0
}

/// Token counts that slipped past upstream validation: negative, fractional or
/// non-finite values degrade to a usable integer instead of poisoning totals.
pub fn sanitize_count(raw: f64) -> u64 {
    if !raw.is_finite() || raw <= 0.0 {
        return 0;
    }
    if raw >= u64::MAX as f64 {
        return u64::MAX;
    }
    raw.floor() as u64
}

fn count_from_value(v: &Value) -> u64 {
    if let Some(u) = v.as_u64() {
        return u;
    }
    if let Some(f) = v.as_f64() {
        return sanitize_count(f);
    }
    if let Some(s) = v.as_str() {
        if let Ok(f) = s.trim().parse::<f64>() {
            return sanitize_count(f);
        }
    }
    0
}

pub(crate) fn deserialize_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    let n = v.as_ref().map(count_from_value).unwrap_or(0);
    if n == 0 {
        if let Some(raw) = v.as_ref().filter(|raw| !raw.is_null() && raw.as_u64() != Some(0)) {
            tracing::debug!(%raw, "token count zeroed");
        }
    }
    Ok(n)
}

pub(crate) fn deserialize_cost<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    let cost = match &v {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    let usable = cost.filter(|c| c.is_finite() && *c >= 0.0);
    if usable.is_none() {
        if let Some(raw) = v.as_ref().filter(|raw| !raw.is_null()) {
            tracing::debug!(%raw, "precomputed cost dropped");
        }
    }
    Ok(usable)
}

pub(crate) fn parse_f64_env(var: &str) -> anyhow::Result<Option<f64>> {
    match env::var(var) {
        Ok(s) => {
            let v = s
                .trim()
                .parse::<f64>()
                .map_err(|e| anyhow::anyhow!("{var}='{s}': {e}"))?;
            Ok(Some(v))
        }
        Err(_) => Ok(None),
    }
}

pub(crate) fn env_string(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
