//! Monitoring loop tying signal acquisition to classification and analysis.

mod runner;
mod session;

pub use runner::{run_tick, MonitoringLoop, TickOutcome};
pub use session::{
    DashboardView, MonitorSession, MonitorSettings, MonitorState, ThresholdKnob, TickStats,
};

use fadewatch_types::FadewatchError;

pub fn monitor_error(message: impl Into<String>) -> FadewatchError {
    FadewatchError::Monitor(message.into())
}
