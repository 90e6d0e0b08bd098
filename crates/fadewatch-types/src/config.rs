use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{fading::FadingThresholds, FadewatchError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SamplerMode {
    #[default]
    Simulated,
    Netsh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub mode: SamplerMode,
    pub base_rssi_dbm: f64,
    pub noise_std_dev_db: f64,
    pub fade_probability: f64,
    pub fade_depth_min_db: u32,
    /// Exclusive upper bound of the simulated fade depth.
    pub fade_depth_max_db: u32,
    pub channel: Option<u16>,
    pub seed: Option<u64>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            mode: SamplerMode::Simulated,
            base_rssi_dbm: -50.0,
            noise_std_dev_db: 2.0,
            fade_probability: 0.10,
            fade_depth_min_db: 10,
            fade_depth_max_db: 25,
            channel: Some(6),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub interval_ms: u64,
    pub dispatch_context_len: usize,
    pub event_context_radius: usize,
    pub autostart: bool,
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            dispatch_context_len: 40,
            event_context_radius: 5,
            autostart: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub timeout_ms: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self { timeout_ms: 15_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpsConfig {
    pub log_level: String,
    pub log_file: Option<String>,
    pub export_dir: String,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            log_file: None,
            export_dir: "exports".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FadewatchConfig {
    #[serde(default)]
    pub sampler: SamplerConfig,
    #[serde(default)]
    pub classifier: FadingThresholds,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub ops: OpsConfig,
}

impl FadewatchConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|err| {
            FadewatchError::Configuration(format!(
                "unable to read config file {}: {err}",
                path_ref.display()
            ))
        })?;
        toml::from_str(&contents).map_err(|err| {
            FadewatchError::Configuration(format!(
                "failed to parse config file {}: {err}",
                path_ref.display()
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        validate_thresholds(&self.classifier)?;
        validate_interval(self.monitor.interval())?;
        if self.monitor.dispatch_context_len == 0 {
            return Err(FadewatchError::Configuration(
                "monitor.dispatch_context_len must be greater than zero".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.sampler.fade_probability) {
            return Err(FadewatchError::Configuration(
                "sampler.fade_probability must be between 0.0 and 1.0".into(),
            ));
        }
        if self.sampler.fade_depth_min_db >= self.sampler.fade_depth_max_db {
            return Err(FadewatchError::Configuration(
                "sampler.fade_depth_min_db must be below sampler.fade_depth_max_db".into(),
            ));
        }
        if !self.sampler.noise_std_dev_db.is_finite() || self.sampler.noise_std_dev_db <= 0.0 {
            return Err(FadewatchError::Configuration(
                "sampler.noise_std_dev_db must be a positive number".into(),
            ));
        }
        if self.analysis.timeout_ms == 0 {
            return Err(FadewatchError::Configuration(
                "analysis.timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Checks classifier thresholds before they are allowed to take effect.
///
/// A moderate threshold at or above the fast threshold is accepted: the rule
/// cascade simply never reaches the moderate rule for those deltas.
pub fn validate_thresholds(thresholds: &FadingThresholds) -> Result<()> {
    let named = [
        ("fast_threshold_db", thresholds.fast_threshold_db),
        ("slow_threshold_db", thresholds.slow_threshold_db),
        ("oscillation_threshold_db", thresholds.oscillation_threshold_db),
        ("moderate_threshold_db", thresholds.moderate_threshold_db),
    ];
    for (name, value) in named {
        if !value.is_finite() || value < 0.0 {
            return Err(FadewatchError::Configuration(format!(
                "classifier.{name} must be a non-negative number, got {value}"
            )));
        }
    }
    if thresholds.oscillation_count == 0 {
        return Err(FadewatchError::Configuration(
            "classifier.oscillation_count must be greater than zero".into(),
        ));
    }
    if thresholds.moderate_is_shadowed() {
        warn!(
            moderate = thresholds.moderate_threshold_db,
            fast = thresholds.fast_threshold_db,
            "moderate threshold is not below fast threshold; moderate variation will never be reported"
        );
    }
    Ok(())
}

pub fn validate_interval(interval: Duration) -> Result<()> {
    if interval.is_zero() {
        return Err(FadewatchError::Configuration(
            "monitor.interval_ms must be greater than zero".into(),
        ));
    }
    Ok(())
}
