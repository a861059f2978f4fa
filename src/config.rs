//! Engine configuration
//!
//! Defaults, JSON (partial objects allowed), and `CLAUDE_*` environment overrides:
//! - `CLAUDE_SESSION_HOURS`: billing window length in hours (default 5)
//! - `CLAUDE_COST_MODE`: auto|calculate|display
//! - `CLAUDE_DEFAULT_MODEL`: pricing model for events without a model id
//! - `CLAUDE_WINDOW_ROLLOVER`: split|gap

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::blocks::WindowRollover;
use crate::cost::CostMode;
use crate::pricing::DEFAULT_MODEL;
use crate::utils::{
    DEFAULT_SESSION_DURATION_HOURS, MAX_SESSION_DURATION_HOURS, env_string, hours_to_duration,
    parse_f64_env,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub session_duration_hours: f64,
    pub cost_mode: CostMode,
    pub default_model: String,
    pub rollover: WindowRollover,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session_duration_hours: DEFAULT_SESSION_DURATION_HOURS,
            cost_mode: CostMode::Auto,
            default_model: DEFAULT_MODEL.to_string(),
            rollover: WindowRollover::Split,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: EngineConfig = serde_json::from_str(json).context("parse engine config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults overlaid with environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(h) = parse_f64_env("CLAUDE_SESSION_HOURS")? {
            self.session_duration_hours = h;
        }
        if let Some(m) = env_string("CLAUDE_COST_MODE") {
            self.cost_mode = m.parse().context("CLAUDE_COST_MODE")?;
        }
        if let Some(m) = env_string("CLAUDE_DEFAULT_MODEL") {
            self.default_model = m;
        }
        if let Some(r) = env_string("CLAUDE_WINDOW_ROLLOVER") {
            self.rollover = r.parse().context("CLAUDE_WINDOW_ROLLOVER")?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        let h = self.session_duration_hours;
        if hours_to_duration(h).is_none() {
            anyhow::bail!(
                "session duration must be between 1ms and {MAX_SESSION_DURATION_HOURS}h, got {h}"
            );
        }
        if self.default_model.trim().is_empty() {
            anyhow::bail!("default model must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clear_env() {
        // SAFETY: env-mutating tests are serialized.
        unsafe {
            env::remove_var("CLAUDE_SESSION_HOURS");
            env::remove_var("CLAUDE_COST_MODE");
            env::remove_var("CLAUDE_DEFAULT_MODEL");
            env::remove_var("CLAUDE_WINDOW_ROLLOVER");
        }
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg = EngineConfig::from_json_str(r#"{"costMode": "calculate"}"#).unwrap();
        assert_eq!(cfg.cost_mode, CostMode::Calculate);
        assert_eq!(cfg.session_duration_hours, 5.0);
        assert_eq!(cfg.default_model, DEFAULT_MODEL);
        assert_eq!(cfg.rollover, WindowRollover::Split);
    }

    #[test]
    fn test_invalid_json_values() {
        assert!(EngineConfig::from_json_str(r#"{"sessionDurationHours": 0}"#).is_err());
        assert!(EngineConfig::from_json_str(r#"{"sessionDurationHours": 1e10}"#).is_err());
        assert!(EngineConfig::from_json_str(r#"{"sessionDurationHours": 1e-10}"#).is_err());
        assert!(EngineConfig::from_json_str(r#"{"sessionDurationHours": 8784}"#).is_ok());
        assert!(EngineConfig::from_json_str(r#"{"costMode": "free"}"#).is_err());
        assert!(EngineConfig::from_json_str(r#"{"rollover": "split_with_gap"}"#).is_ok());
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        unsafe {
            env::set_var("CLAUDE_SESSION_HOURS", "2.5");
            env::set_var("CLAUDE_COST_MODE", "display");
            env::set_var("CLAUDE_WINDOW_ROLLOVER", "gap");
        }
        let cfg = EngineConfig::from_env().unwrap();
        assert_eq!(cfg.session_duration_hours, 2.5);
        assert_eq!(cfg.cost_mode, CostMode::Display);
        assert_eq!(cfg.rollover, WindowRollover::SplitWithGap);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_rejects_bad_duration() {
        clear_env();
        unsafe { env::set_var("CLAUDE_SESSION_HOURS", "-1") };
        assert!(EngineConfig::from_env().is_err());
        unsafe { env::set_var("CLAUDE_SESSION_HOURS", "five") };
        assert!(EngineConfig::from_env().is_err());
        clear_env();
        assert_eq!(EngineConfig::from_env().unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_valid_config_runs_as_configured() {
        use crate::blocks::assemble;
        use crate::models::{CostSource, ResolvedEvent, TokenCounts, UsageEvent, Usd};
        use chrono::{TimeDelta, TimeZone, Utc};

        let base = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let events = [ResolvedEvent {
            event: UsageEvent::new(base, TokenCounts::new(1, 1, 0, 0)),
            cost: Usd::ZERO,
            cost_source: CostSource::Missing,
            estimated: false,
        }];
        for hours in [0.001, 2.5, 8784.0] {
            let json = format!(r#"{{"sessionDurationHours": {hours}}}"#);
            let cfg = EngineConfig::from_json_str(&json).unwrap();
            let blocks = assemble(&events, cfg.session_duration_hours, base);
            assert_eq!(
                Some(blocks[0].end - blocks[0].start),
                hours_to_duration(hours),
                "{hours}"
            );
        }
    }
}
