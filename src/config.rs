use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

pub const MAX_CACHE_TTL_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub alerts: AlertThresholds,
    pub windows: Windows,
    pub summary: SummarySettings,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlertThresholds {
    /// FSQS at or above this opens `low_first_session_quality`.
    pub fsqs_threshold: f64,
    /// THS below this opens `high_reliability_risk`.
    pub ths_threshold: f64,
    /// TCRS at or above this opens `churn_risk`.
    pub tcrs_threshold: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            fsqs_threshold: 50.0,
            ths_threshold: 55.0,
            tcrs_threshold: 0.6,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Windows {
    pub aggregate_days: i64,
    pub lookback_days: i64,
}

impl Default for Windows {
    fn default() -> Self {
        Self {
            aggregate_days: 30,
            lookback_days: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SummarySettings {
    pub history_limit: usize,
    pub cache_ttl_secs: u64,
}

impl Default for SummarySettings {
    fn default() -> Self {
        Self {
            history_limit: 10,
            cache_ttl_secs: 3600,
        }
    }
}

impl Settings {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let settings: Settings =
            toml::from_str(raw).map_err(|e| Error::Config(format!("invalid settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Defaults when `path` is `None`; a missing file at an explicit path is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Settings::default());
        };
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.alerts.tcrs_threshold) {
            return Err(Error::Config(format!(
                "alerts.tcrs_threshold must be within 0..=1, got {}",
                self.alerts.tcrs_threshold
            )));
        }
        if self.windows.lookback_days < 1 || self.windows.aggregate_days < 1 {
            return Err(Error::Config("lookback windows must be positive".to_string()));
        }
        if !(1..=MAX_CACHE_TTL_SECS).contains(&self.summary.cache_ttl_secs) {
            return Err(Error::Config(format!(
                "summary.cache_ttl_secs must be within 1..={MAX_CACHE_TTL_SECS}, got {}",
                self.summary.cache_ttl_secs
            )));
        }
        Ok(())
    }
}
