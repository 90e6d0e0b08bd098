use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fading::FadingCategory;

/// Frequency band a reading was taken on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FrequencyBand {
    #[serde(rename = "2.4GHz")]
    Band2_4GHz,
    #[serde(rename = "5GHz")]
    Band5GHz,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl FrequencyBand {
    /// Infer the band from an 802.11 channel number.
    pub fn from_channel(channel: u16) -> Self {
        match channel {
            1..=14 => Self::Band2_4GHz,
            32..=177 => Self::Band5GHz,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for FrequencyBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Band2_4GHz => write!(f, "2.4GHz"),
            Self::Band5GHz => write!(f, "5GHz"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// One signal acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    /// Received signal strength in dBm.
    pub rssi: f64,
    pub channel: Option<u16>,
    pub frequency_band: FrequencyBand,
}

impl Sample {
    pub fn new(rssi: f64, channel: Option<u16>) -> Self {
        let frequency_band = channel
            .map(FrequencyBand::from_channel)
            .unwrap_or_default();
        Self {
            timestamp: Utc::now(),
            rssi,
            channel,
            frequency_band,
        }
    }
}

/// A sample as stored in the session log, together with its classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedSample {
    pub sample: Sample,
    pub category: Option<FadingCategory>,
    /// Current minus previous rssi, 0.0 for the first sample of a session.
    pub delta: f64,
}

impl ClassifiedSample {
    pub fn rssi(&self) -> f64 {
        self.sample.rssi
    }
}
