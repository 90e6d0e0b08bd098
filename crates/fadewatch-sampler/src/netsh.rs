use async_trait::async_trait;
use fadewatch_types::{sample::Sample, Result};
use tokio::process::Command;
use tracing::debug;

use crate::{sampler_error, SignalSampler};

const DEFAULT_NETSH: &str = "netsh";

/// Fields pulled out of `netsh wlan show interfaces`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetshReading {
    pub quality_pct: u8,
    pub channel: Option<u16>,
}

impl NetshReading {
    pub fn into_sample(self) -> Sample {
        Sample::new(quality_to_dbm(self.quality_pct), self.channel)
    }
}

/// Approximate dBm from the driver's signal quality percentage.
pub fn quality_to_dbm(quality_pct: u8) -> f64 {
    f64::from(quality_pct) / 2.0 - 100.0
}

/// Reads the connected interface's signal through `netsh` (Windows only).
pub struct NetshSampler {
    program: String,
}

impl NetshSampler {
    pub fn new() -> Self {
        Self {
            program: DEFAULT_NETSH.into(),
        }
    }

    async fn run_netsh(&self) -> Result<String> {
        let output = Command::new(&self.program)
            .args(["wlan", "show", "interfaces"])
            .output()
            .await
            .map_err(|err| sampler_error(format!("failed to run {}: {err}", self.program)))?;

        if !output.status.success() {
            return Err(sampler_error(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for NetshSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalSampler for NetshSampler {
    async fn sample(&self) -> Result<Sample> {
        let text = self.run_netsh().await?;
        let reading = parse_interfaces_output(&text)?;
        debug!(
            quality = reading.quality_pct,
            channel = ?reading.channel,
            "netsh reading"
        );
        Ok(reading.into_sample())
    }
}

/// Parses English or Portuguese `netsh wlan show interfaces` output.
///
/// Lines that do not carry a signal or channel value are skipped. A missing
/// signal line is an acquisition failure.
pub fn parse_interfaces_output(text: &str) -> Result<NetshReading> {
    let mut quality_pct = None;
    let mut channel = None;

    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "signal" | "sinal" => {
                quality_pct = value
                    .trim_end_matches('%')
                    .trim()
                    .parse::<u8>()
                    .ok()
                    .filter(|pct| *pct <= 100);
            }
            "channel" | "canal" => {
                channel = value.parse::<u16>().ok().filter(|ch| *ch > 0);
            }
            _ => {}
        }
    }

    let quality_pct =
        quality_pct.ok_or_else(|| sampler_error("no signal line in netsh output"))?;
    Ok(NetshReading {
        quality_pct,
        channel,
    })
}
