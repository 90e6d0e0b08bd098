use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    fading::FadingCategory,
    sample::{ClassifiedSample, FrequencyBand},
};

/// Flat tabular row used when a session log is exported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub timestamp: DateTime<Utc>,
    pub rssi: f64,
    pub channel: Option<u16>,
    pub frequency_band: FrequencyBand,
    pub category: Option<FadingCategory>,
}

impl From<&ClassifiedSample> for ExportRow {
    fn from(entry: &ClassifiedSample) -> Self {
        Self {
            timestamp: entry.sample.timestamp,
            rssi: entry.sample.rssi,
            channel: entry.sample.channel,
            frequency_band: entry.sample.frequency_band,
            category: entry.category,
        }
    }
}
