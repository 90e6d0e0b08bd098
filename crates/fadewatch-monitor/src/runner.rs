use std::sync::Arc;

use fadewatch_sampler::SignalSampler;
use fadewatch_types::{
    analysis::{AnalysisRequest, AnalysisTrigger, DispatchStatus},
    fading::FadingCategory,
};
use tokio::{sync::Mutex, task::JoinHandle, time::sleep};
use tracing::{debug, info, warn};

use crate::{MonitorSession, MonitorSettings, MonitorState};

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// The sampler had no reading; nothing was logged.
    Missed,
    Recorded {
        index: usize,
        category: Option<FadingCategory>,
        dispatch: Option<DispatchStatus>,
    },
}

/// Acquire one sample, log it with its classification and, when it is an
/// event, ask the dispatcher for a report.
pub async fn run_tick<S>(
    sampler: &S,
    session: &MonitorSession,
    settings: &MonitorSettings,
) -> TickOutcome
where
    S: SignalSampler + ?Sized,
{
    session.counters.tick();
    let sample = match sampler.sample().await {
        Ok(sample) => sample,
        Err(err) => {
            session.counters.miss();
            warn!("no reading this tick: {err}");
            return TickOutcome::Missed;
        }
    };

    let recorded = session
        .history()
        .record(sample, &settings.thresholds, settings.dispatch_context_len)
        .await;
    let (index, entry) = (recorded.index, recorded.entry);
    let Some(category) = entry.category else {
        return TickOutcome::Recorded {
            index,
            category: None,
            dispatch: None,
        };
    };

    info!(index, %category, delta = entry.delta, rssi = entry.rssi(), "fading event detected");
    let request = AnalysisRequest::new(AnalysisTrigger::Periodic, recorded.context)
        .with_category(Some(category))
        .with_radio(entry.sample.channel, entry.sample.frequency_band)
        .with_event_delta(entry.delta)
        .with_rate_of_change(settings.rate_of_change(entry.delta));
    let status = session.dispatcher().request_report(request).await;
    debug!(index, ?status, "analysis dispatched");

    TickOutcome::Recorded {
        index,
        category: Some(category),
        dispatch: Some(status),
    }
}

/// Owns the sampler and the background task that ticks while running.
pub struct MonitoringLoop<S>
where
    S: SignalSampler + 'static,
{
    sampler: Arc<S>,
    session: MonitorSession,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<S> MonitoringLoop<S>
where
    S: SignalSampler + 'static,
{
    pub fn new(sampler: S, session: MonitorSession) -> Self {
        Self {
            sampler: Arc::new(sampler),
            session,
            task: Mutex::new(None),
        }
    }

    pub fn session(&self) -> &MonitorSession {
        &self.session
    }

    pub fn state(&self) -> MonitorState {
        self.session.state()
    }

    /// Moves `Stopped -> Running`. Returns false when already running.
    pub async fn start(&self) -> bool {
        let mut task = self.task.lock().await;
        if self.session.state() == MonitorState::Running {
            return false;
        }
        self.session.set_state(MonitorState::Running);
        *task = Some(tokio::spawn(run_loop(
            Arc::clone(&self.sampler),
            self.session.clone(),
        )));
        true
    }

    /// Moves `Running -> Stopped`, waits for the loop to exit and cancels any
    /// outstanding analysis.
    pub async fn stop(&self) {
        let mut task = self.task.lock().await;
        self.session.set_state(MonitorState::Stopped);
        if let Some(handle) = task.take() {
            if let Err(err) = handle.await {
                warn!("monitoring task ended abnormally: {err}");
            }
        }
        drop(task);
        self.session.dispatcher().cancel().await;
    }

    pub async fn toggle(&self) -> MonitorState {
        match self.state() {
            MonitorState::Running => self.stop().await,
            MonitorState::Stopped => {
                self.start().await;
            }
        }
        self.state()
    }
}

async fn run_loop<S>(sampler: Arc<S>, session: MonitorSession)
where
    S: SignalSampler + ?Sized,
{
    let mut state = session.watch_state();
    info!("monitoring loop started");
    loop {
        if *state.borrow_and_update() == MonitorState::Stopped {
            break;
        }
        let settings = session.settings().await;
        run_tick(sampler.as_ref(), &session, &settings).await;

        tokio::select! {
            _ = sleep(settings.interval) => {}
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    info!("monitoring loop stopped");
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, time::Duration};

    use async_trait::async_trait;
    use fadewatch_analysis::{AnalysisCollaborator, AnalysisDispatcher};
    use fadewatch_types::{
        analysis::AnalysisReport, fading::FadingThresholds, sample::Sample, Result,
    };

    use super::*;
    use crate::{monitor_error, ThresholdKnob, TickStats};

    /// Replays a fixed script; `None` entries and an empty script fail.
    struct ScriptedSampler {
        script: std::sync::Mutex<VecDeque<Option<f64>>>,
    }

    impl ScriptedSampler {
        fn new(values: &[Option<f64>]) -> Self {
            Self {
                script: std::sync::Mutex::new(values.iter().copied().collect()),
            }
        }

        fn readings(values: &[f64]) -> Self {
            Self::new(&values.iter().map(|v| Some(*v)).collect::<Vec<_>>())
        }
    }

    #[async_trait]
    impl SignalSampler for ScriptedSampler {
        async fn sample(&self) -> Result<Sample> {
            match self.script.lock().unwrap().pop_front() {
                Some(Some(rssi)) => Ok(Sample::new(rssi, Some(6))),
                _ => Err(monitor_error("scripted miss")),
            }
        }
    }

    struct SteadySampler;

    #[async_trait]
    impl SignalSampler for SteadySampler {
        async fn sample(&self) -> Result<Sample> {
            Ok(Sample::new(-50.0, Some(36)))
        }
    }

    #[derive(Default)]
    struct RecordingCollaborator {
        requests: std::sync::Mutex<Vec<AnalysisRequest>>,
    }

    #[async_trait]
    impl AnalysisCollaborator for RecordingCollaborator {
        async fn submit(&self, request: &AnalysisRequest) -> Result<String> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(format!("seen {}", request.rssi_context.len()))
        }
    }

    fn session_with(collaborator: Arc<RecordingCollaborator>) -> MonitorSession {
        let dispatcher = AnalysisDispatcher::new(collaborator, Duration::from_secs(2));
        MonitorSession::new(MonitorSettings::default(), dispatcher)
    }

    async fn run_script(sampler: &ScriptedSampler, session: &MonitorSession) -> Vec<TickOutcome> {
        let settings = session.settings().await;
        let mut outcomes = Vec::new();
        while !sampler.script.lock().unwrap().is_empty() {
            outcomes.push(run_tick(sampler, session, &settings).await);
        }
        outcomes
    }

    async fn wait_for_report(session: &MonitorSession) -> AnalysisReport {
        let mut rx = session.dispatcher().watch();
        let report = tokio::time::timeout(Duration::from_secs(2), rx.wait_for(Option::is_some))
            .await
            .expect("report in time")
            .expect("dispatcher alive")
            .clone();
        report.expect("report present")
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..400 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn event_tick_dispatches_trailing_context() {
        let collaborator = Arc::new(RecordingCollaborator::default());
        let session = session_with(collaborator.clone());
        let sampler = ScriptedSampler::readings(&[-50.0, -50.0, -50.0, -50.0, -61.0]);

        let outcomes = run_script(&sampler, &session).await;
        assert_eq!(
            outcomes[4],
            TickOutcome::Recorded {
                index: 4,
                category: Some(FadingCategory::FastFading),
                dispatch: Some(DispatchStatus::Started),
            }
        );
        assert!(outcomes[..4]
            .iter()
            .all(|o| matches!(o, TickOutcome::Recorded { category: None, dispatch: None, .. })));

        let report = wait_for_report(&session).await;
        assert_eq!(report.category, Some(FadingCategory::FastFading));
        assert_eq!(report.trigger, AnalysisTrigger::Periodic);

        let requests = collaborator.requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].rssi_context, vec![-50.0, -50.0, -50.0, -50.0, -61.0]);
        assert_eq!(requests[0].channel, Some(6));
        assert_eq!(requests[0].event_delta_db, Some(-11.0));
        assert_eq!(requests[0].rate_of_change_db_per_s, Some(22.0));
    }

    #[tokio::test]
    async fn dispatch_context_is_capped() {
        let collaborator = Arc::new(RecordingCollaborator::default());
        let session = session_with(collaborator.clone());
        let mut values = vec![-50.0; 45];
        values.push(-65.0);
        run_script(&ScriptedSampler::readings(&values), &session).await;

        wait_for_report(&session).await;
        let requests = collaborator.requests.lock().unwrap().clone();
        assert_eq!(requests[0].rssi_context.len(), 40);
        assert_eq!(requests[0].rssi_context.last(), Some(&-65.0));
    }

    #[tokio::test]
    async fn failed_acquisition_skips_the_tick() {
        let session = session_with(Arc::default());
        let sampler = ScriptedSampler::new(&[Some(-50.0), None, Some(-51.0)]);

        let outcomes = run_script(&sampler, &session).await;
        assert_eq!(outcomes[1], TickOutcome::Missed);
        assert_eq!(session.history().len().await, 2);
        assert_eq!(session.history().get(1).await.map(|e| e.delta), Some(-1.0));
        assert_eq!(session.tick_stats(), TickStats { ticks: 3, misses: 1 });
    }

    #[tokio::test]
    async fn threshold_change_applies_to_later_ticks_only() {
        let session = session_with(Arc::default());
        run_script(
            &ScriptedSampler::readings(&[-50.0, -50.0, -50.0, -50.0, -62.0]),
            &session,
        )
        .await;

        session
            .set_thresholds(FadingThresholds {
                fast_threshold_db: 30.0,
                ..FadingThresholds::default()
            })
            .await
            .expect("valid thresholds");
        run_script(&ScriptedSampler::readings(&[-62.0, -62.0, -50.0]), &session).await;

        let history = session.history();
        assert_eq!(
            history.get(4).await.and_then(|e| e.category),
            Some(FadingCategory::FastFading)
        );
        assert_ne!(
            history.get(7).await.and_then(|e| e.category),
            Some(FadingCategory::FastFading)
        );
    }

    #[tokio::test]
    async fn invalid_settings_keep_previous_values() {
        let session = session_with(Arc::default());
        let before = session.settings().await;

        assert!(session.set_interval(Duration::ZERO).await.is_err());
        assert!(session
            .set_thresholds(FadingThresholds {
                slow_threshold_db: -3.0,
                ..FadingThresholds::default()
            })
            .await
            .is_err());
        assert_eq!(session.settings().await, before);

        session
            .set_interval(Duration::from_millis(250))
            .await
            .expect("valid interval");
        assert_eq!(session.settings().await.interval, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn stepped_fast_threshold_changes_classification() {
        let session = session_with(Arc::default());
        let thresholds = session
            .step_threshold(ThresholdKnob::Fast, 2.0)
            .await
            .expect("within range");
        assert_eq!(thresholds.fast_threshold_db, 12.0);
        assert_eq!(session.settings().await.thresholds, thresholds);

        let outcomes = run_script(
            &ScriptedSampler::readings(&[-50.0, -49.0, -50.0, -50.0, -61.0]),
            &session,
        )
        .await;
        assert!(matches!(
            outcomes[4],
            TickOutcome::Recorded {
                category: Some(FadingCategory::ModerateVariation),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn threshold_steps_outside_range_are_rejected() {
        let session = session_with(Arc::default());
        let before = session.settings().await.thresholds;

        assert!(session
            .step_threshold(ThresholdKnob::Fast, 11.0)
            .await
            .is_err());
        assert!(session
            .step_threshold(ThresholdKnob::Moderate, -6.0)
            .await
            .is_err());
        assert_eq!(session.settings().await.thresholds, before);

        let shadowed = session
            .step_threshold(ThresholdKnob::Moderate, 5.0)
            .await
            .expect("shadowing is accepted");
        assert_eq!(shadowed.moderate_threshold_db, 11.0);
        assert!(shadowed.moderate_is_shadowed());
    }

    #[tokio::test]
    async fn dashboard_reports_dispatch_counters() {
        let session = session_with(Arc::default());
        run_script(
            &ScriptedSampler::readings(&[-50.0, -50.0, -50.0, -50.0, -61.0]),
            &session,
        )
        .await;
        wait_for_report(&session).await;

        let view = session.dashboard(10, 10).await;
        assert_eq!(view.analysis.completed, 1);
        assert_eq!(view.analysis.failed, 0);
        assert_eq!(view.history.event_count, 1);
    }

    #[tokio::test]
    async fn on_demand_analysis_uses_clamped_event_context() {
        let collaborator = Arc::new(RecordingCollaborator::default());
        let session = session_with(collaborator.clone());
        let mut values = vec![-50.0, -50.0, -50.0, -50.0, -61.0];
        values.extend([-61.0; 7]);
        run_script(&ScriptedSampler::readings(&values), &session).await;
        wait_for_report(&session).await;
        session.dispatcher().cancel().await;
        collaborator.requests.lock().unwrap().clear();

        let status = session.analyze_event(4).await.expect("event analysis");
        assert_eq!(status, DispatchStatus::Started);
        wait_until(|| !collaborator.requests.lock().unwrap().is_empty()).await;

        let request = collaborator.requests.lock().unwrap()[0].clone();
        assert_eq!(request.trigger, AnalysisTrigger::OnDemand { event_index: 4 });
        assert_eq!(request.rssi_context.len(), 10);
        assert_eq!(request.rssi_context[4], -61.0);
        assert_eq!(request.category, Some(FadingCategory::FastFading));
        assert_eq!(request.rate_of_change_db_per_s, Some(22.0));

        assert!(session.analyze_event(0).await.is_err());
        assert!(session.analyze_event(999).await.is_err());
    }

    #[tokio::test]
    async fn reset_cold_starts_the_session() {
        let session = session_with(Arc::default());
        run_script(
            &ScriptedSampler::readings(&[-50.0, -50.0, -50.0, -50.0, -61.0]),
            &session,
        )
        .await;
        session.reset().await;
        assert_eq!(session.history().len().await, 0);
        assert_eq!(session.history().event_count().await, 0);

        let outcomes = run_script(
            &ScriptedSampler::readings(&[-61.0, -40.0, -61.0, -40.0]),
            &session,
        )
        .await;
        assert!(outcomes
            .iter()
            .all(|o| matches!(o, TickOutcome::Recorded { category: None, .. })));
    }

    #[tokio::test]
    async fn loop_runs_until_stopped() {
        let session = session_with(Arc::default());
        session
            .set_interval(Duration::from_millis(5))
            .await
            .expect("interval");
        let monitor = MonitoringLoop::new(SteadySampler, session.clone());

        assert!(monitor.start().await);
        assert!(!monitor.start().await);
        assert_eq!(monitor.state(), MonitorState::Running);

        tokio::time::sleep(Duration::from_millis(60)).await;
        monitor.stop().await;
        assert_eq!(monitor.state(), MonitorState::Stopped);

        let logged = session.history().len().await;
        assert!(logged > 0);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(session.history().len().await, logged);
    }

    #[tokio::test]
    async fn stop_interrupts_the_interval_wait() {
        let session = session_with(Arc::default());
        session
            .set_interval(Duration::from_secs(30))
            .await
            .expect("interval");
        let monitor = MonitoringLoop::new(SteadySampler, session.clone());

        monitor.start().await;
        let history = session.history().clone();
        for _ in 0..400 {
            if history.len().await == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(history.len().await, 1);

        tokio::time::timeout(Duration::from_secs(1), monitor.stop())
            .await
            .expect("stop without waiting out the interval");
        assert_eq!(history.len().await, 1);
    }

    #[tokio::test]
    async fn loop_can_restart_after_stop() {
        let session = session_with(Arc::default());
        session
            .set_interval(Duration::from_millis(5))
            .await
            .expect("interval");
        let monitor = MonitoringLoop::new(SteadySampler, session.clone());

        assert_eq!(monitor.toggle().await, MonitorState::Running);
        assert_eq!(monitor.toggle().await, MonitorState::Stopped);
        let first_run = session.history().len().await;
        assert_eq!(monitor.toggle().await, MonitorState::Running);
        tokio::time::sleep(Duration::from_millis(30)).await;
        monitor.stop().await;
        assert!(session.history().len().await > first_run);
    }
}
