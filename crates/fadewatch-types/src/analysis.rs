use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{fading::FadingCategory, sample::FrequencyBand};

/// What caused an analysis request to be issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisTrigger {
    /// Raised by the monitoring loop when a tick produced a category.
    Periodic,
    /// Requested by the operator for a logged event.
    OnDemand { event_index: usize },
}

/// Structured context handed to the reasoning collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub id: Uuid,
    pub trigger: AnalysisTrigger,
    /// Recent rssi values, oldest first.
    pub rssi_context: Vec<f64>,
    pub category: Option<FadingCategory>,
    pub channel: Option<u16>,
    pub frequency_band: FrequencyBand,
    /// Rssi change of the triggering sample relative to its predecessor.
    pub event_delta_db: Option<f64>,
    /// Observed change at the event divided by the sampling interval.
    pub rate_of_change_db_per_s: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl AnalysisRequest {
    pub fn new(trigger: AnalysisTrigger, rssi_context: Vec<f64>) -> Self {
        Self {
            id: Uuid::new_v4(),
            trigger,
            rssi_context,
            category: None,
            channel: None,
            frequency_band: FrequencyBand::Unknown,
            event_delta_db: None,
            rate_of_change_db_per_s: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_category(mut self, category: Option<FadingCategory>) -> Self {
        self.category = category;
        self
    }

    pub fn with_radio(mut self, channel: Option<u16>, band: FrequencyBand) -> Self {
        self.channel = channel;
        self.frequency_band = band;
        self
    }

    pub fn with_event_delta(mut self, delta: f64) -> Self {
        self.event_delta_db = Some(delta);
        self
    }

    pub fn with_rate_of_change(mut self, rate: f64) -> Self {
        self.rate_of_change_db_per_s = Some(rate);
        self
    }

    /// Largest absolute consecutive change inside the context window.
    pub fn max_step_db(&self) -> f64 {
        self.rssi_context
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).abs())
            .fold(0.0, f64::max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReportOutcome {
    Completed { text: String },
    Failed { reason: String },
}

/// Result of one collaborator call, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub request_id: Uuid,
    pub trigger: AnalysisTrigger,
    pub category: Option<FadingCategory>,
    pub outcome: ReportOutcome,
    pub completed_at: DateTime<Utc>,
}

impl AnalysisReport {
    pub fn completed(request: &AnalysisRequest, text: String) -> Self {
        Self::from_outcome(request, ReportOutcome::Completed { text })
    }

    pub fn failed(request: &AnalysisRequest, reason: impl Into<String>) -> Self {
        Self::from_outcome(
            request,
            ReportOutcome::Failed {
                reason: reason.into(),
            },
        )
    }

    fn from_outcome(request: &AnalysisRequest, outcome: ReportOutcome) -> Self {
        Self {
            request_id: request.id,
            trigger: request.trigger,
            category: request.category,
            outcome,
            completed_at: Utc::now(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, ReportOutcome::Failed { .. })
    }

    pub fn text(&self) -> &str {
        match &self.outcome {
            ReportOutcome::Completed { text } => text,
            ReportOutcome::Failed { reason } => reason,
        }
    }
}

/// Immediate answer of the dispatcher to a new request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    /// No call was outstanding; the request went straight to the collaborator.
    Started,
    /// A call is outstanding; the request waits in the pending slot.
    /// `superseded` is true when it evicted an older pending request.
    Queued { superseded: bool },
}
