//! Signal acquisition abstraction layer.

use std::sync::Mutex;

use async_trait::async_trait;
use fadewatch_types::{
    config::{SamplerConfig, SamplerMode},
    sample::Sample,
    FadewatchError, Result,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tracing::{debug, info};

mod netsh;

pub use netsh::{parse_interfaces_output, quality_to_dbm, NetshSampler, NetshReading};

/// Source of one signal reading per call.
#[async_trait]
pub trait SignalSampler: Send + Sync {
    async fn sample(&self) -> Result<Sample>;
}

/// Synthetic signal around a fixed level with occasional deep fades.
pub struct SimulatedSampler {
    base_rssi_dbm: f64,
    noise: Normal<f64>,
    fade_probability: f64,
    fade_depth_db: (u32, u32),
    channel: Option<u16>,
    rng: Mutex<StdRng>,
}

impl SimulatedSampler {
    pub fn new(config: &SamplerConfig) -> Result<Self> {
        if !(config.noise_std_dev_db.is_finite() && config.noise_std_dev_db > 0.0) {
            return Err(sampler_error("noise deviation must be a positive number"));
        }
        let noise = Normal::new(0.0, config.noise_std_dev_db)
            .map_err(|err| sampler_error(format!("invalid noise deviation: {err}")))?;
        if !(0.0..=1.0).contains(&config.fade_probability) {
            return Err(sampler_error("fade probability must be within [0, 1]"));
        }
        if config.fade_depth_min_db >= config.fade_depth_max_db {
            return Err(sampler_error("fade depth range is empty"));
        }
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        info!(
            base = config.base_rssi_dbm,
            seeded = config.seed.is_some(),
            "simulated sampler ready"
        );
        Ok(Self {
            base_rssi_dbm: config.base_rssi_dbm,
            noise,
            fade_probability: config.fade_probability,
            fade_depth_db: (config.fade_depth_min_db, config.fade_depth_max_db),
            channel: config.channel,
            rng: Mutex::new(rng),
        })
    }
}

#[async_trait]
impl SignalSampler for SimulatedSampler {
    async fn sample(&self) -> Result<Sample> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| sampler_error("failed to lock simulator rng"))?;
        let noise = self.noise.sample(&mut *rng);
        let fade = if rng.gen_bool(self.fade_probability) {
            let (min, max) = self.fade_depth_db;
            -f64::from(rng.gen_range(min..max))
        } else {
            0.0
        };
        if fade != 0.0 {
            debug!(fade, "simulated fade injected");
        }
        Ok(Sample::new(self.base_rssi_dbm + noise + fade, self.channel))
    }
}

/// Sampler selected by configuration.
pub enum ConfiguredSampler {
    Simulated(SimulatedSampler),
    Netsh(NetshSampler),
}

impl ConfiguredSampler {
    pub fn from_config(config: &SamplerConfig) -> Result<Self> {
        match config.mode {
            SamplerMode::Simulated => Ok(Self::Simulated(SimulatedSampler::new(config)?)),
            SamplerMode::Netsh => Ok(Self::Netsh(NetshSampler::new())),
        }
    }
}

#[async_trait]
impl SignalSampler for ConfiguredSampler {
    async fn sample(&self) -> Result<Sample> {
        match self {
            Self::Simulated(sampler) => sampler.sample().await,
            Self::Netsh(sampler) => sampler.sample().await,
        }
    }
}

/// Generate an error aligned with acquisition semantics.
pub fn sampler_error(message: impl Into<String>) -> FadewatchError {
    FadewatchError::Acquisition(message.into())
}
