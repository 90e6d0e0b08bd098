use std::{collections::BTreeMap, sync::Arc};

use fadewatch_classifier::{classify, WINDOW_LEN};
use fadewatch_types::{
    export::ExportRow,
    fading::{FadingCategory, FadingThresholds},
    sample::{ClassifiedSample, Sample},
};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{EventIndex, SampleLog};

#[derive(Debug, Default)]
struct HistoryInner {
    log: SampleLog,
    events: EventIndex,
}

/// Shared handle over the log and its event index.
///
/// Every write takes the lock once for the whole append + index update, so
/// readers see a session either before or after a sample, never half of it.
#[derive(Clone, Default)]
pub struct SessionHistory {
    inner: Arc<RwLock<HistoryInner>>,
}

/// Read-only view handed to presentation code.
#[derive(Debug, Clone, Default)]
pub struct HistorySnapshot {
    pub total_samples: usize,
    pub recent: Vec<ClassifiedSample>,
    /// Most recent events as `(log index, entry)`, oldest first.
    pub events: Vec<(usize, ClassifiedSample)>,
    pub event_count: usize,
    pub counts: BTreeMap<FadingCategory, usize>,
}

/// What [`SessionHistory::record`] stored.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSample {
    pub index: usize,
    pub entry: ClassifiedSample,
    /// Trailing rssi values ending at this sample; empty unless it is an event.
    pub context: Vec<f64>,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies `sample` against the trailing window and appends it.
    ///
    /// When the sample is an event, the last `context_len` rssi values
    /// (the new one included) are read under the same lock.
    pub async fn record(
        &self,
        sample: Sample,
        thresholds: &FadingThresholds,
        context_len: usize,
    ) -> RecordedSample {
        let mut guard = self.inner.write().await;
        let mut window = guard.log.tail_rssi(WINDOW_LEN - 1);
        window.push(sample.rssi);
        let classification = classify(&window, thresholds);

        let entry = ClassifiedSample {
            sample: sample.clone(),
            category: classification.category,
            delta: classification.delta,
        };
        let index = guard
            .log
            .append(sample, classification.category, classification.delta);
        guard.events.observe(index, classification.category);
        let context = if entry.category.is_some() {
            guard.log.tail_rssi(context_len)
        } else {
            Vec::new()
        };
        debug!(
            index,
            rssi = entry.sample.rssi,
            delta = entry.delta,
            category = ?entry.category,
            "sample recorded"
        );
        RecordedSample {
            index,
            entry,
            context,
        }
    }

    /// Atomically replaces the log and the event index with empty ones.
    pub async fn reset(&self) {
        let mut guard = self.inner.write().await;
        let dropped = guard.log.len();
        guard.log.clear();
        guard.events.clear();
        info!(dropped, "session history reset");
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.log.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.log.is_empty()
    }

    pub async fn get(&self, index: usize) -> Option<ClassifiedSample> {
        self.inner.read().await.log.get(index).cloned()
    }

    pub async fn tail(&self, n: usize) -> Vec<ClassifiedSample> {
        self.inner.read().await.log.tail(n).to_vec()
    }

    pub async fn tail_rssi(&self, n: usize) -> Vec<f64> {
        self.inner.read().await.log.tail_rssi(n)
    }

    pub async fn window(&self, start: usize, end: usize) -> Vec<ClassifiedSample> {
        self.inner.read().await.log.window(start, end).to_vec()
    }

    pub async fn recent_events(&self, n: usize) -> Vec<usize> {
        self.inner.read().await.events.recent(n).to_vec()
    }

    pub async fn event_count(&self) -> usize {
        self.inner.read().await.events.len()
    }

    pub async fn count_by_category(&self) -> BTreeMap<FadingCategory, usize> {
        self.inner.read().await.events.count_by_category()
    }

    pub async fn export_rows(&self) -> Vec<ExportRow> {
        self.inner.read().await.log.export_rows()
    }

    pub async fn snapshot(&self, recent_samples: usize, recent_events: usize) -> HistorySnapshot {
        let guard = self.inner.read().await;
        let events = guard
            .events
            .recent(recent_events)
            .iter()
            .filter_map(|&index| guard.log.get(index).map(|entry| (index, entry.clone())))
            .collect();
        HistorySnapshot {
            total_samples: guard.log.len(),
            recent: guard.log.tail(recent_samples).to_vec(),
            events,
            event_count: guard.events.len(),
            counts: guard.events.count_by_category(),
        }
    }
}
