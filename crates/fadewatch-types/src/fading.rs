use std::fmt;

use serde::{Deserialize, Serialize};

/// Named fading categories the classifier can assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FadingCategory {
    FastFading,
    SlowFading,
    MultipathFading,
    ModerateVariation,
}

impl FadingCategory {
    pub const ALL: [FadingCategory; 4] = [
        FadingCategory::FastFading,
        FadingCategory::SlowFading,
        FadingCategory::MultipathFading,
        FadingCategory::ModerateVariation,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FadingCategory::FastFading => "fast fading",
            FadingCategory::SlowFading => "slow fading",
            FadingCategory::MultipathFading => "multipath fading",
            FadingCategory::ModerateVariation => "moderate variation",
        }
    }
}

impl fmt::Display for FadingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Thresholds driving the fading rule cascade. All values are in dB except
/// `oscillation_count`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FadingThresholds {
    pub fast_threshold_db: f64,
    pub slow_threshold_db: f64,
    pub oscillation_threshold_db: f64,
    pub oscillation_count: usize,
    pub moderate_threshold_db: f64,
}

impl Default for FadingThresholds {
    fn default() -> Self {
        Self {
            fast_threshold_db: 10.0,
            slow_threshold_db: 8.0,
            oscillation_threshold_db: 5.0,
            oscillation_count: 3,
            moderate_threshold_db: 6.0,
        }
    }
}

impl FadingThresholds {
    /// True when the moderate rule can never fire because every delta large
    /// enough for it is already claimed by the fast rule.
    pub fn moderate_is_shadowed(&self) -> bool {
        self.moderate_threshold_db >= self.fast_threshold_db
    }
}
