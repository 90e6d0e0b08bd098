use std::{sync::Arc, time::Duration};

use fadewatch_types::analysis::{AnalysisReport, AnalysisRequest, DispatchStatus};
use futures::{stream::BoxStream, StreamExt};
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::AnalysisCollaborator;

/// Counters describing what the dispatcher has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub completed: u64,
    pub failed: u64,
    /// Pending requests evicted by a newer one before they were submitted.
    pub superseded: u64,
    pub cancelled: u64,
}

#[derive(Default)]
struct DispatchState {
    in_flight: Option<Uuid>,
    pending: Option<AnalysisRequest>,
    worker: Option<JoinHandle<()>>,
    stats: DispatchStats,
}

struct DispatcherInner {
    collaborator: Arc<dyn AnalysisCollaborator>,
    timeout: Duration,
    state: Mutex<DispatchState>,
    latest: watch::Sender<Option<AnalysisReport>>,
}

/// Sends analysis requests to the collaborator, one at a time.
///
/// While a call is outstanding, new requests wait in a single pending slot;
/// a newer request replaces the waiting one, which is then never submitted.
/// Every completed call, success or failure, becomes the latest report.
#[derive(Clone)]
pub struct AnalysisDispatcher {
    inner: Arc<DispatcherInner>,
}

impl AnalysisDispatcher {
    pub fn new(collaborator: Arc<dyn AnalysisCollaborator>, timeout: Duration) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            inner: Arc::new(DispatcherInner {
                collaborator,
                timeout,
                state: Mutex::new(DispatchState::default()),
                latest,
            }),
        }
    }

    /// Hands `request` to the collaborator or parks it in the pending slot.
    /// Never waits for the collaborator.
    pub async fn request_report(&self, request: AnalysisRequest) -> DispatchStatus {
        let mut state = self.inner.state.lock().await;
        if state.in_flight.is_some() {
            let request_id = request.id;
            let superseded = match state.pending.replace(request) {
                Some(evicted) => {
                    debug!(evicted = %evicted.id, replacement = %request_id, "pending analysis superseded");
                    state.stats.superseded += 1;
                    true
                }
                None => false,
            };
            return DispatchStatus::Queued { superseded };
        }

        debug!(request = %request.id, trigger = ?request.trigger, "analysis started");
        state.in_flight = Some(request.id);
        let inner = Arc::clone(&self.inner);
        state.worker = Some(tokio::spawn(drive(inner, request)));
        DispatchStatus::Started
    }

    /// Aborts the outstanding call and drops the pending request.
    pub async fn cancel(&self) {
        let mut state = self.inner.state.lock().await;
        if let Some(worker) = state.worker.take() {
            worker.abort();
        }
        let mut dropped = 0;
        if state.in_flight.take().is_some() {
            dropped += 1;
        }
        if state.pending.take().is_some() {
            dropped += 1;
        }
        if dropped > 0 {
            state.stats.cancelled += dropped;
            info!(dropped, "outstanding analysis cancelled");
        }
    }

    pub async fn is_busy(&self) -> bool {
        self.inner.state.lock().await.in_flight.is_some()
    }

    pub async fn stats(&self) -> DispatchStats {
        self.inner.state.lock().await.stats
    }

    pub fn latest(&self) -> Option<AnalysisReport> {
        self.inner.latest.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Option<AnalysisReport>> {
        self.inner.latest.subscribe()
    }

    /// Stream of reports as they become the latest one.
    pub fn subscribe(&self) -> BoxStream<'static, AnalysisReport> {
        WatchStream::new(self.inner.latest.subscribe())
            .filter_map(|report| async move { report })
            .boxed()
    }
}

enum Completion {
    /// The call no longer owns the in-flight slot; its result is dropped.
    Stale,
    Next(AnalysisRequest),
    Idle,
}

impl DispatchState {
    /// Ends the call for `request_id` and promotes the pending request.
    fn complete(&mut self, request_id: Uuid, failed: bool) -> Completion {
        if self.in_flight != Some(request_id) {
            return Completion::Stale;
        }
        if failed {
            self.stats.failed += 1;
        } else {
            self.stats.completed += 1;
        }
        match self.pending.take() {
            Some(next) => {
                self.in_flight = Some(next.id);
                Completion::Next(next)
            }
            None => {
                self.in_flight = None;
                self.worker = None;
                Completion::Idle
            }
        }
    }
}

async fn drive(inner: Arc<DispatcherInner>, mut request: AnalysisRequest) {
    loop {
        let report = inner.call(&request).await;

        let mut state = inner.state.lock().await;
        let next = match state.complete(request.id, report.is_failure()) {
            Completion::Stale => {
                debug!(request = %request.id, "stale analysis result dropped");
                return;
            }
            Completion::Next(next) => Some(next),
            Completion::Idle => None,
        };
        if report.is_failure() {
            warn!(request = %report.request_id, reason = report.text(), "analysis failed");
        } else {
            info!(request = %report.request_id, "analysis completed");
        }
        inner.latest.send_replace(Some(report));

        match next {
            Some(next) => {
                debug!(request = %next.id, "pending analysis started");
                request = next;
            }
            None => return,
        }
    }
}

impl DispatcherInner {
    async fn call(&self, request: &AnalysisRequest) -> AnalysisReport {
        match tokio::time::timeout(self.timeout, self.collaborator.submit(request)).await {
            Ok(Ok(text)) if text.trim().is_empty() => {
                AnalysisReport::failed(request, "collaborator returned an empty response")
            }
            Ok(Ok(text)) => AnalysisReport::completed(request, text),
            Ok(Err(err)) => AnalysisReport::failed(request, err.to_string()),
            Err(_) => AnalysisReport::failed(
                request,
                format!(
                    "collaborator did not answer within {} ms",
                    self.timeout.as_millis()
                ),
            ),
        }
    }
}
