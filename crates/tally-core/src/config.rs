//! Threshold configuration
//!
//! Every tunable used by signal extraction, persona rules, AML heuristics and
//! the copy collaborator lives here.
//!
//! ## Configuration Resolution
//!
//! 1. Explicit path passed by the caller (`--config`)
//! 2. Override in data dir (~/.local/share/tally/config/tally.toml)
//! 3. Embedded defaults (compiled into binary)

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::Window;

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/tally.toml");

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TallyConfig {
    pub persona: PersonaThresholds,
    pub recurring: RecurringConfig,
    pub aml: AmlConfig,
    pub copy: CopyConfig,
}

/// Persona rule cascade thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaThresholds {
    pub subscription_recurring_min: u32,
    pub subscription_monthly_min_usd: f64,
    pub subscription_share_min: f64,
    pub util_flags: Vec<f64>,
    pub util_high: f64,
    pub util_savings_max: f64,
    pub savings_growth_min: f64,
    pub savings_net_inflow_min: f64,
    pub income_gap_days: f64,
    pub buffer_month_low: f64,
    pub buffer_very_low: f64,
}

impl Default for PersonaThresholds {
    fn default() -> Self {
        Self {
            subscription_recurring_min: 3,
            subscription_monthly_min_usd: 50.0,
            subscription_share_min: 0.10,
            util_flags: vec![0.30, 0.50, 0.80],
            util_high: 0.50,
            util_savings_max: 0.30,
            savings_growth_min: 0.02,
            savings_net_inflow_min: 200.0,
            income_gap_days: 45.0,
            buffer_month_low: 1.0,
            buffer_very_low: 0.5,
        }
    }
}

/// Recurring charge detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecurringConfig {
    pub min_occurrences: usize,
    pub monthly_gap_min: f64,
    pub monthly_gap_max: f64,
    pub weekly_gap_min: f64,
    pub weekly_gap_max: f64,
    pub amount_tolerance: f64,
    pub weekly_multiplier: f64,
}

impl Default for RecurringConfig {
    fn default() -> Self {
        Self {
            min_occurrences: 3,
            monthly_gap_min: 20.0,
            monthly_gap_max: 40.0,
            weekly_gap_min: 6.0,
            weekly_gap_max: 9.0,
            amount_tolerance: 0.10,
            weekly_multiplier: 4.0,
        }
    }
}

impl RecurringConfig {
    /// Monthly cadence: `[monthly_gap_min, monthly_gap_max)`
    pub fn is_monthly_gap(&self, mean_gap: f64) -> bool {
        mean_gap >= self.monthly_gap_min && mean_gap < self.monthly_gap_max
    }

    /// Weekly cadence: `(weekly_gap_min, weekly_gap_max)`
    pub fn is_weekly_gap(&self, mean_gap: f64) -> bool {
        mean_gap > self.weekly_gap_min && mean_gap < self.weekly_gap_max
    }
}

/// Educational AML-pattern heuristics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmlConfig {
    pub transfer_counterparty_min: usize,
    pub same_day_min_amount: f64,
    pub same_day_days_short: usize,
    pub same_day_days_long: usize,
    pub savings_label: String,
    pub elevated_alert_count: usize,
}

impl Default for AmlConfig {
    fn default() -> Self {
        Self {
            transfer_counterparty_min: 10,
            same_day_min_amount: 500.0,
            same_day_days_short: 10,
            same_day_days_long: 25,
            savings_label: "savings".to_string(),
            elevated_alert_count: 3,
        }
    }
}

impl AmlConfig {
    /// Qualifying same-day in/out days needed to alert for a window
    pub fn same_day_threshold(&self, window: Window) -> usize {
        match window {
            Window::Days30 => self.same_day_days_short,
            Window::Days180 => self.same_day_days_long,
        }
    }
}

/// Copy collaborator limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyConfig {
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub title_max_chars: usize,
    pub rationale_max_chars: usize,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 8,
            max_attempts: 1,
            backoff_ms: 250,
            title_max_chars: 60,
            rationale_max_chars: 320,
        }
    }
}

impl CopyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Delay before retry number `attempt` (1-based), doubling each time
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(10);
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

impl TallyConfig {
    /// Load configuration (explicit path, then data-dir override, then embedded)
    pub fn load(override_path: Option<&Path>) -> Result<Self> {
        let content = match override_path {
            Some(path) => fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("Failed to read {}: {}", path.display(), e))
            })?,
            None => match default_config_path() {
                Some(path) if path.exists() => fs::read_to_string(&path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?,
                _ => DEFAULT_CONFIG.to_string(),
            },
        };

        Self::parse(&content)
    }

    /// Embedded defaults only
    pub fn embedded() -> Result<Self> {
        Self::parse(DEFAULT_CONFIG)
    }

    /// Parse config from TOML content
    pub fn parse(content: &str) -> Result<Self> {
        let config: TallyConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.recurring.amount_tolerance <= 0.0 {
            return Err(Error::Config(
                "recurring.amount_tolerance must be positive".to_string(),
            ));
        }
        if self.copy.max_attempts == 0 {
            return Err(Error::Config("copy.max_attempts must be at least 1".to_string()));
        }
        if self.persona.util_flags.iter().any(|f| !f.is_finite() || *f < 0.0) {
            return Err(Error::Config(
                "persona.util_flags must be non-negative numbers".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("tally").join("config").join("tally.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_matches_defaults() {
        let config = TallyConfig::embedded().unwrap();
        assert_eq!(config, TallyConfig::default());
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let config = TallyConfig::parse(
            r#"
            [persona]
            util_high = 0.6

            [aml]
            same_day_days_short = 12
            "#,
        )
        .unwrap();

        assert_eq!(config.persona.util_high, 0.6);
        assert_eq!(config.persona.buffer_very_low, 0.5);
        assert_eq!(config.aml.same_day_threshold(Window::Days30), 12);
        assert_eq!(config.aml.same_day_threshold(Window::Days180), 25);
        assert_eq!(config.copy, CopyConfig::default());
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(TallyConfig::parse("[copy]\nmax_attempts = 0").is_err());
        assert!(TallyConfig::parse("[persona]\nutil_high = \"high\"").is_err());
    }

    #[test]
    fn test_gap_intervals() {
        let recurring = RecurringConfig::default();
        assert!(recurring.is_monthly_gap(20.0));
        assert!(recurring.is_monthly_gap(30.0));
        assert!(!recurring.is_monthly_gap(40.0));
        assert!(!recurring.is_weekly_gap(6.0));
        assert!(recurring.is_weekly_gap(7.0));
        assert!(!recurring.is_weekly_gap(9.0));
    }

    #[test]
    fn test_backoff_doubles() {
        let copy = CopyConfig::default();
        assert_eq!(copy.backoff(1), Duration::from_millis(250));
        assert_eq!(copy.backoff(2), Duration::from_millis(500));
        assert_eq!(copy.backoff(3), Duration::from_millis(1000));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tally.toml");
        fs::write(&path, "[copy]\ntimeout_secs = 2\n").unwrap();

        let config = TallyConfig::load(Some(&path)).unwrap();
        assert_eq!(config.copy.timeout(), Duration::from_secs(2));

        let missing = dir.path().join("missing.toml");
        assert!(TallyConfig::load(Some(&missing)).is_err());
    }
}
