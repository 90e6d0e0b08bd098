use std::{
    fmt,
    ops::RangeInclusive,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use fadewatch_analysis::{AnalysisDispatcher, DispatchStats};
use fadewatch_history::{HistorySnapshot, SessionHistory};
use fadewatch_types::{
    analysis::{AnalysisReport, AnalysisRequest, AnalysisTrigger, DispatchStatus},
    config::{validate_interval, validate_thresholds, FadewatchConfig},
    fading::FadingThresholds,
    Result,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, RwLock};
use tracing::info;

use crate::monitor_error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitorState {
    Stopped,
    Running,
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorState::Stopped => write!(f, "stopped"),
            MonitorState::Running => write!(f, "running"),
        }
    }
}

/// Settings read once at the start of every tick.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSettings {
    pub thresholds: FadingThresholds,
    pub interval: Duration,
    pub dispatch_context_len: usize,
    pub event_context_radius: usize,
}

impl MonitorSettings {
    pub fn from_config(config: &FadewatchConfig) -> Self {
        Self {
            thresholds: config.classifier,
            interval: config.monitor.interval(),
            dispatch_context_len: config.monitor.dispatch_context_len,
            event_context_radius: config.monitor.event_context_radius,
        }
    }

    pub(crate) fn rate_of_change(&self, delta: f64) -> f64 {
        delta.abs() / self.interval.as_secs_f64()
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self::from_config(&FadewatchConfig::default())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    pub ticks: u64,
    pub misses: u64,
}

#[derive(Default)]
pub(crate) struct TickCounters {
    ticks: AtomicU64,
    misses: AtomicU64,
}

impl TickCounters {
    pub(crate) fn tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> TickStats {
        TickStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Threshold the presentation layer can step at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdKnob {
    Fast,
    Slow,
    Moderate,
}

impl ThresholdKnob {
    pub fn label(self) -> &'static str {
        match self {
            ThresholdKnob::Fast => "fast",
            ThresholdKnob::Slow => "slow",
            ThresholdKnob::Moderate => "moderate",
        }
    }

    /// Values accepted when stepping, in dB.
    pub fn range(self) -> RangeInclusive<f64> {
        match self {
            ThresholdKnob::Fast => 5.0..=20.0,
            ThresholdKnob::Slow => 1.0..=30.0,
            ThresholdKnob::Moderate => 1.0..=20.0,
        }
    }

    fn value_mut(self, thresholds: &mut FadingThresholds) -> &mut f64 {
        match self {
            ThresholdKnob::Fast => &mut thresholds.fast_threshold_db,
            ThresholdKnob::Slow => &mut thresholds.slow_threshold_db,
            ThresholdKnob::Moderate => &mut thresholds.moderate_threshold_db,
        }
    }
}

/// Everything the dashboard needs for one frame.
#[derive(Debug, Clone)]
pub struct DashboardView {
    pub state: MonitorState,
    pub history: HistorySnapshot,
    pub latest_report: Option<AnalysisReport>,
    pub analysis_busy: bool,
    pub analysis: DispatchStats,
    pub settings: MonitorSettings,
    pub ticks: TickStats,
}

/// Session state shared by the monitoring loop and the presentation layer.
#[derive(Clone)]
pub struct MonitorSession {
    history: SessionHistory,
    dispatcher: AnalysisDispatcher,
    settings: Arc<RwLock<MonitorSettings>>,
    state: Arc<watch::Sender<MonitorState>>,
    pub(crate) counters: Arc<TickCounters>,
}

impl MonitorSession {
    pub fn new(settings: MonitorSettings, dispatcher: AnalysisDispatcher) -> Self {
        let (state, _) = watch::channel(MonitorState::Stopped);
        Self {
            history: SessionHistory::new(),
            dispatcher,
            settings: Arc::new(RwLock::new(settings)),
            state: Arc::new(state),
            counters: Arc::new(TickCounters::default()),
        }
    }

    pub fn history(&self) -> &SessionHistory {
        &self.history
    }

    pub fn dispatcher(&self) -> &AnalysisDispatcher {
        &self.dispatcher
    }

    pub fn state(&self) -> MonitorState {
        *self.state.borrow()
    }

    pub(crate) fn set_state(&self, state: MonitorState) {
        self.state.send_replace(state);
    }

    pub(crate) fn watch_state(&self) -> watch::Receiver<MonitorState> {
        self.state.subscribe()
    }

    pub async fn settings(&self) -> MonitorSettings {
        self.settings.read().await.clone()
    }

    /// Replaces the classifier thresholds from the next tick on.
    pub async fn set_thresholds(&self, thresholds: FadingThresholds) -> Result<()> {
        validate_thresholds(&thresholds)?;
        self.settings.write().await.thresholds = thresholds;
        info!(?thresholds, "classifier thresholds updated");
        Ok(())
    }

    /// Moves one threshold by `step_db` and returns the thresholds now in
    /// effect. Steps leaving the knob's range are rejected.
    pub async fn step_threshold(
        &self,
        knob: ThresholdKnob,
        step_db: f64,
    ) -> Result<FadingThresholds> {
        let mut settings = self.settings.write().await;
        let mut thresholds = settings.thresholds;
        let value = knob.value_mut(&mut thresholds);
        *value += step_db;
        let stepped = *value;
        let range = knob.range();
        if !range.contains(&stepped) {
            return Err(monitor_error(format!(
                "{} threshold must stay within {}-{} dB",
                knob.label(),
                range.start(),
                range.end()
            )));
        }
        validate_thresholds(&thresholds)?;
        settings.thresholds = thresholds;
        info!(?thresholds, knob = knob.label(), "classifier threshold stepped");
        Ok(thresholds)
    }

    /// Replaces the tick interval from the next wait on.
    pub async fn set_interval(&self, interval: Duration) -> Result<()> {
        validate_interval(interval)?;
        self.settings.write().await.interval = interval;
        info!(interval_ms = interval.as_millis() as u64, "tick interval updated");
        Ok(())
    }

    pub async fn reset(&self) {
        self.history.reset().await;
    }

    pub fn latest_report(&self) -> Option<AnalysisReport> {
        self.dispatcher.latest()
    }

    pub fn tick_stats(&self) -> TickStats {
        self.counters.snapshot()
    }

    /// Requests an analysis of the event logged at `index`, with up to
    /// `event_context_radius` samples on each side as context.
    pub async fn analyze_event(&self, index: usize) -> Result<DispatchStatus> {
        let settings = self.settings().await;
        let entry = self
            .history
            .get(index)
            .await
            .ok_or_else(|| monitor_error(format!("no sample logged at index {index}")))?;
        let category = entry
            .category
            .ok_or_else(|| monitor_error(format!("sample {index} is not a fading event")))?;

        let radius = settings.event_context_radius;
        let context = self
            .history
            .window(index.saturating_sub(radius), index + radius + 1)
            .await
            .iter()
            .map(|entry| entry.rssi())
            .collect();

        let request = AnalysisRequest::new(AnalysisTrigger::OnDemand { event_index: index }, context)
            .with_category(Some(category))
            .with_radio(entry.sample.channel, entry.sample.frequency_band)
            .with_event_delta(entry.delta)
            .with_rate_of_change(settings.rate_of_change(entry.delta));
        info!(index, %category, "on-demand analysis requested");
        Ok(self.dispatcher.request_report(request).await)
    }

    pub async fn dashboard(&self, recent_samples: usize, recent_events: usize) -> DashboardView {
        DashboardView {
            state: self.state(),
            history: self.history.snapshot(recent_samples, recent_events).await,
            latest_report: self.latest_report(),
            analysis_busy: self.dispatcher.is_busy().await,
            analysis: self.dispatcher.stats().await,
            settings: self.settings().await,
            ticks: self.tick_stats(),
        }
    }
}
