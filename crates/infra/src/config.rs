//! Process configuration for the monitor.
//!
//! Precedence: defaults in code, then an optional TOML file, then `STOCKWATCH_*`
//! environment variables. The result is validated before use.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockwatch_monitoring::analyzers::{InventoryThresholds, PriceThresholds, SalesPatternThresholds};
use stockwatch_monitoring::{AutoResolvePolicy, EngineSettings, HealthPolicy};
use stockwatch_observability::LogSettings;

use crate::scan::ScanRunner;

const DEFAULT_CONFIG_FILES: [&str; 2] = ["stockwatch.toml", "config/stockwatch.toml"];

// Upper bounds keep derived durations and timestamps representable.
const MAX_PERIOD_SECS: u64 = 86_400;
const MAX_BACKOFF_MS: u64 = 60_000;
const MAX_LOOKBACK_DAYS: u32 = 3_650;
const MAX_MIN_AGE_HOURS: i64 = 24 * MAX_LOOKBACK_DAYS as i64;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub scan: ScanConfig,
    pub thresholds: ThresholdConfig,
    pub health: HealthConfig,
    pub logging: LogSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub interval_secs: u64,
    pub deadline_secs: u64,
    pub sale_window: usize,
    pub auto_resolve_batch: usize,
    pub auto_resolve_min_age_hours: i64,
    pub parallel_analyzers: bool,
    pub skip_duplicate_open_issues: bool,
    pub max_retries: u32,
    pub base_backoff_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            deadline_secs: 30,
            sale_window: 500,
            auto_resolve_batch: 2,
            auto_resolve_min_age_hours: 24,
            parallel_analyzers: true,
            skip_duplicate_open_issues: false,
            max_retries: 5,
            base_backoff_ms: 250,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub forecast_horizon_days: u32,
    pub inventory_relative_pct: u32,
    pub inventory_floor_units: u32,
    pub price_variance_pct: u32,
    pub sales_deviation_factor: u32,
    pub sales_trailing_days: u32,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            forecast_horizon_days: 7,
            inventory_relative_pct: 5,
            inventory_floor_units: 10,
            price_variance_pct: 5,
            sales_deviation_factor: 2,
            sales_trailing_days: 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub low_stock_floor: u32,
    pub critical_issue: u32,
    pub high_issue: u32,
    pub low_stock_product: u32,
    pub no_recent_sales: u32,
    pub weak_recent_sales: u32,
    pub adequate_daily_sales: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        let policy = HealthPolicy::default();
        Self {
            low_stock_floor: policy.low_stock_floor,
            critical_issue: policy.critical_issue_penalty,
            high_issue: policy.high_issue_penalty,
            low_stock_product: policy.low_stock_penalty,
            no_recent_sales: policy.no_recent_sales_penalty,
            weak_recent_sales: policy.weak_recent_sales_penalty,
            adequate_daily_sales: policy.adequate_daily_sales,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl MonitorConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = match resolve_config_path(options.config_path.as_deref()) {
            Some(path) => Self::from_file(&path)?,
            None if options.require_file => {
                let expected = options
                    .config_path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILES[0]));
                return Err(ConfigError::MissingConfigFile(expected));
            }
            None => Self::default(),
        };

        config.apply_env_overrides_from(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&raw)
            .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Apply `STOCKWATCH_<SECTION>_<KEY>` overrides read through `lookup`.
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        override_parsed(&read, "STOCKWATCH_SCAN_INTERVAL_SECS", &mut self.scan.interval_secs)?;
        override_parsed(&read, "STOCKWATCH_SCAN_DEADLINE_SECS", &mut self.scan.deadline_secs)?;
        override_parsed(&read, "STOCKWATCH_SCAN_SALE_WINDOW", &mut self.scan.sale_window)?;
        override_parsed(&read, "STOCKWATCH_SCAN_AUTO_RESOLVE_BATCH", &mut self.scan.auto_resolve_batch)?;
        override_parsed(
            &read,
            "STOCKWATCH_SCAN_AUTO_RESOLVE_MIN_AGE_HOURS",
            &mut self.scan.auto_resolve_min_age_hours,
        )?;
        override_parsed(&read, "STOCKWATCH_SCAN_PARALLEL_ANALYZERS", &mut self.scan.parallel_analyzers)?;
        override_parsed(
            &read,
            "STOCKWATCH_SCAN_SKIP_DUPLICATE_OPEN_ISSUES",
            &mut self.scan.skip_duplicate_open_issues,
        )?;
        override_parsed(&read, "STOCKWATCH_SCAN_MAX_RETRIES", &mut self.scan.max_retries)?;
        override_parsed(&read, "STOCKWATCH_SCAN_BASE_BACKOFF_MS", &mut self.scan.base_backoff_ms)?;

        override_parsed(
            &read,
            "STOCKWATCH_THRESHOLDS_FORECAST_HORIZON_DAYS",
            &mut self.thresholds.forecast_horizon_days,
        )?;
        override_parsed(
            &read,
            "STOCKWATCH_THRESHOLDS_INVENTORY_RELATIVE_PCT",
            &mut self.thresholds.inventory_relative_pct,
        )?;
        override_parsed(
            &read,
            "STOCKWATCH_THRESHOLDS_INVENTORY_FLOOR_UNITS",
            &mut self.thresholds.inventory_floor_units,
        )?;
        override_parsed(
            &read,
            "STOCKWATCH_THRESHOLDS_PRICE_VARIANCE_PCT",
            &mut self.thresholds.price_variance_pct,
        )?;
        override_parsed(
            &read,
            "STOCKWATCH_THRESHOLDS_SALES_DEVIATION_FACTOR",
            &mut self.thresholds.sales_deviation_factor,
        )?;
        override_parsed(
            &read,
            "STOCKWATCH_THRESHOLDS_SALES_TRAILING_DAYS",
            &mut self.thresholds.sales_trailing_days,
        )?;

        override_parsed(&read, "STOCKWATCH_HEALTH_LOW_STOCK_FLOOR", &mut self.health.low_stock_floor)?;
        override_parsed(&read, "STOCKWATCH_HEALTH_CRITICAL_ISSUE", &mut self.health.critical_issue)?;
        override_parsed(&read, "STOCKWATCH_HEALTH_HIGH_ISSUE", &mut self.health.high_issue)?;
        override_parsed(&read, "STOCKWATCH_HEALTH_LOW_STOCK_PRODUCT", &mut self.health.low_stock_product)?;
        override_parsed(&read, "STOCKWATCH_HEALTH_NO_RECENT_SALES", &mut self.health.no_recent_sales)?;
        override_parsed(&read, "STOCKWATCH_HEALTH_WEAK_RECENT_SALES", &mut self.health.weak_recent_sales)?;
        override_parsed(
            &read,
            "STOCKWATCH_HEALTH_ADEQUATE_DAILY_SALES",
            &mut self.health.adequate_daily_sales,
        )?;

        if let Some(value) = read("STOCKWATCH_LOGGING_LEVEL").or_else(|| read("STOCKWATCH_LOG_LEVEL")) {
            self.logging.level = value;
        }
        let format = read("STOCKWATCH_LOGGING_FORMAT").or_else(|| read("STOCKWATCH_LOG_FORMAT"));
        if let Some(value) = format {
            self.logging.format = value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                key: "STOCKWATCH_LOGGING_FORMAT".to_string(),
                value,
            })?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_scan(&self.scan)?;
        validate_thresholds(&self.thresholds)?;
        validate_health(&self.health)?;
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Validation("logging.level must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn engine_settings(&self) -> EngineSettings {
        let thresholds = &self.thresholds;
        EngineSettings {
            sale_window: self.scan.sale_window,
            deadline: Duration::from_secs(self.scan.deadline_secs),
            parallel_analyzers: self.scan.parallel_analyzers,
            skip_duplicate_open_issues: self.scan.skip_duplicate_open_issues,
            auto_resolve: AutoResolvePolicy {
                batch_size: self.scan.auto_resolve_batch,
                min_age: chrono::Duration::hours(self.scan.auto_resolve_min_age_hours),
            },
            inventory: InventoryThresholds {
                horizon_days: thresholds.forecast_horizon_days,
                relative: percent(thresholds.inventory_relative_pct),
                floor_units: Decimal::from(thresholds.inventory_floor_units),
            },
            price: PriceThresholds {
                variance: percent(thresholds.price_variance_pct),
            },
            sales_pattern: SalesPatternThresholds {
                trailing_days: thresholds.sales_trailing_days,
                deviation_factor: Decimal::from(thresholds.sales_deviation_factor),
            },
            health: HealthPolicy {
                low_stock_floor: self.health.low_stock_floor,
                critical_issue_penalty: self.health.critical_issue,
                high_issue_penalty: self.health.high_issue,
                low_stock_penalty: self.health.low_stock_product,
                no_recent_sales_penalty: self.health.no_recent_sales,
                weak_recent_sales_penalty: self.health.weak_recent_sales,
                adequate_daily_sales: self.health.adequate_daily_sales,
            },
        }
    }

    pub fn runner(&self) -> ScanRunner {
        ScanRunner {
            interval: Duration::from_secs(self.scan.interval_secs),
            max_retries: self.scan.max_retries,
            base_backoff: Duration::from_millis(self.scan.base_backoff_ms),
        }
    }
}

fn percent(value: u32) -> Decimal {
    Decimal::new(i64::from(value), 2)
}

fn override_parsed<T, R>(read: &R, key: &str, target: &mut T) -> Result<(), ConfigError>
where
    T: std::str::FromStr,
    R: Fn(&str) -> Option<String>,
{
    if let Some(value) = read(key) {
        *target = value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
            key: key.to_string(),
            value,
        })?;
    }
    Ok(())
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    DEFAULT_CONFIG_FILES
        .into_iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

fn validate_scan(scan: &ScanConfig) -> Result<(), ConfigError> {
    if !(1..=MAX_PERIOD_SECS).contains(&scan.interval_secs) {
        return Err(ConfigError::Validation(format!(
            "scan.interval_secs must be in range 1..={MAX_PERIOD_SECS}"
        )));
    }
    if !(1..=MAX_PERIOD_SECS).contains(&scan.deadline_secs) {
        return Err(ConfigError::Validation(format!(
            "scan.deadline_secs must be in range 1..={MAX_PERIOD_SECS}"
        )));
    }
    if !(1..=1000).contains(&scan.sale_window) {
        return Err(ConfigError::Validation(
            "scan.sale_window must be in range 1..=1000".to_string(),
        ));
    }
    if !(0..=MAX_MIN_AGE_HOURS).contains(&scan.auto_resolve_min_age_hours) {
        return Err(ConfigError::Validation(format!(
            "scan.auto_resolve_min_age_hours must be in range 0..={MAX_MIN_AGE_HOURS}"
        )));
    }
    if !(1..=MAX_BACKOFF_MS).contains(&scan.base_backoff_ms) {
        return Err(ConfigError::Validation(format!(
            "scan.base_backoff_ms must be in range 1..={MAX_BACKOFF_MS}"
        )));
    }
    Ok(())
}

fn validate_thresholds(thresholds: &ThresholdConfig) -> Result<(), ConfigError> {
    if !(1..=MAX_LOOKBACK_DAYS).contains(&thresholds.forecast_horizon_days) {
        return Err(ConfigError::Validation(format!(
            "thresholds.forecast_horizon_days must be in range 1..={MAX_LOOKBACK_DAYS}"
        )));
    }
    if !(1..=MAX_LOOKBACK_DAYS).contains(&thresholds.sales_trailing_days) {
        return Err(ConfigError::Validation(format!(
            "thresholds.sales_trailing_days must be in range 1..={MAX_LOOKBACK_DAYS}"
        )));
    }
    if thresholds.inventory_relative_pct > 100 || thresholds.price_variance_pct > 100 {
        return Err(ConfigError::Validation(
            "threshold percentages must be in range 0..=100".to_string(),
        ));
    }
    Ok(())
}

fn validate_health(health: &HealthConfig) -> Result<(), ConfigError> {
    let penalties = [
        health.critical_issue,
        health.high_issue,
        health.low_stock_product,
        health.no_recent_sales,
        health.weak_recent_sales,
    ];
    if penalties.iter().any(|penalty| *penalty > 100) {
        return Err(ConfigError::Validation(
            "health penalties must be in range 0..=100".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use stockwatch_observability::LogFormat;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_map_to_engine_defaults() {
        let config = MonitorConfig::default();
        config.validate().unwrap();

        let settings = config.engine_settings();
        let defaults = EngineSettings::default();
        assert_eq!(settings.sale_window, defaults.sale_window);
        assert_eq!(settings.deadline, defaults.deadline);
        assert_eq!(settings.skip_duplicate_open_issues, defaults.skip_duplicate_open_issues);
        assert_eq!(settings.auto_resolve, defaults.auto_resolve);
        assert_eq!(settings.inventory, defaults.inventory);
        assert_eq!(settings.price, defaults.price);
        assert_eq!(settings.sales_pattern, defaults.sales_pattern);
        assert_eq!(settings.health, defaults.health);
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let config = MonitorConfig::from_toml_str(
            r#"
            [scan]
            interval_secs = 60
            sale_window = 200

            [logging]
            format = "compact"
            "#,
        )
        .unwrap();

        assert_eq!(config.scan.interval_secs, 60);
        assert_eq!(config.scan.sale_window, 200);
        assert_eq!(config.scan.deadline_secs, 30);
        assert_eq!(config.thresholds, ThresholdConfig::default());
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn env_overrides_win_over_file_values() {
        let mut config = MonitorConfig::from_toml_str("[scan]\nmax_retries = 1\n").unwrap();
        config
            .apply_env_overrides_from(env(&[
                ("STOCKWATCH_SCAN_MAX_RETRIES", "7"),
                ("STOCKWATCH_SCAN_SKIP_DUPLICATE_OPEN_ISSUES", "true"),
                ("STOCKWATCH_THRESHOLDS_PRICE_VARIANCE_PCT", "10"),
                ("STOCKWATCH_LOG_LEVEL", "debug"),
                ("STOCKWATCH_LOGGING_FORMAT", "compact"),
            ]))
            .unwrap();

        assert_eq!(config.scan.max_retries, 7);
        assert!(config.engine_settings().skip_duplicate_open_issues);
        assert_eq!(config.engine_settings().price.variance, Decimal::new(10, 2));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut config = MonitorConfig::default();
        config
            .apply_env_overrides_from(env(&[("STOCKWATCH_SCAN_SALE_WINDOW", "  ")]))
            .unwrap();
        assert_eq!(config.scan.sale_window, 500);
    }

    #[test]
    fn malformed_env_value_is_reported_with_its_key() {
        let mut config = MonitorConfig::default();
        let err = config
            .apply_env_overrides_from(env(&[("STOCKWATCH_SCAN_PARALLEL_ANALYZERS", "maybe")]))
            .unwrap_err();

        match err {
            ConfigError::InvalidEnvOverride { key, value } => {
                assert_eq!(key, "STOCKWATCH_SCAN_PARALLEL_ANALYZERS");
                assert_eq!(value, "maybe");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn sale_window_is_bounded() {
        for window in [0, 1001] {
            let mut config = MonitorConfig::default();
            config.scan.sale_window = window;
            assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
        }

        let mut config = MonitorConfig::default();
        config.scan.sale_window = 1000;
        config.validate().unwrap();
    }

    #[test]
    fn oversized_periods_are_rejected_before_use() {
        let mut config = MonitorConfig::default();
        config
            .apply_env_overrides_from(env(&[(
                "STOCKWATCH_THRESHOLDS_SALES_TRAILING_DAYS",
                "4000000000",
            )]))
            .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(msg)) if msg.contains("sales_trailing_days")
        ));

        let mut config = MonitorConfig::default();
        config.scan.auto_resolve_min_age_hours = i64::MAX;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(msg)) if msg.contains("min_age_hours")
        ));

        let mut config = MonitorConfig::default();
        config.scan.interval_secs = u64::MAX;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(msg)) if msg.contains("interval_secs")
        ));

        let mut config = MonitorConfig::default();
        config.thresholds.forecast_horizon_days = 3_651;
        assert!(config.validate().is_err());

        let mut config = MonitorConfig::default();
        config.scan.interval_secs = 86_400;
        config.scan.deadline_secs = 86_400;
        config.scan.auto_resolve_min_age_hours = 24 * 3_650;
        config.thresholds.sales_trailing_days = 3_650;
        config.validate().unwrap();
        let settings = config.engine_settings();
        assert_eq!(settings.auto_resolve.min_age, chrono::Duration::days(3_650));
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let err = MonitorConfig::load(LoadOptions {
            config_path: Some(PathBuf::from("does/not/exist/stockwatch.toml")),
            require_file: true,
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingConfigFile(_)));
    }

    #[test]
    fn runner_settings_follow_scan_section() {
        let mut config = MonitorConfig::default();
        config.scan.interval_secs = 10;
        config.scan.base_backoff_ms = 100;

        let runner = config.runner();
        assert_eq!(runner.interval, Duration::from_secs(10));
        assert_eq!(runner.base_backoff, Duration::from_millis(100));
        assert_eq!(runner.max_retries, 5);
    }
}
