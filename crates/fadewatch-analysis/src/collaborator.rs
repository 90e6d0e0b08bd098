use async_trait::async_trait;
use fadewatch_types::{analysis::AnalysisRequest, Result};
use tracing::info;

/// External service that turns an analysis request into explanatory text.
#[async_trait]
pub trait AnalysisCollaborator: Send + Sync {
    async fn submit(&self, request: &AnalysisRequest) -> Result<String>;
}

/// Offline collaborator that explains an event from the size of its drop.
pub struct HeuristicCollaborator;

impl HeuristicCollaborator {
    pub fn new() -> Self {
        Self
    }

    fn explain(request: &AnalysisRequest) -> String {
        let drop = request
            .event_delta_db
            .unwrap_or_else(|| request.max_step_db())
            .abs();

        let mut text = match request.category {
            Some(category) => format!("[{category}] "),
            None => String::new(),
        };
        if drop > 15.0 {
            text.push_str(&format!(
                "The {drop:.1} dB drop was very abrupt. This indicates severe shadow fading or a \
                 blocked line of sight, for example a thick concrete wall or a metal door closing."
            ));
        } else if drop > 8.0 {
            text.push_str(&format!(
                "A {drop:.1} dB variation was detected. It has fast-fading characteristics, most \
                 likely multipath reflections from people moving nearby or objects close to the antenna."
            ));
        } else {
            text.push_str(
                "Light variation. It is probably ambient noise or co-channel interference.",
            );
        }
        if let Some(rate) = request.rate_of_change_db_per_s {
            text.push_str(&format!(" Observed rate of change: {rate:.1} dB/s."));
        }
        text
    }
}

impl Default for HeuristicCollaborator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalysisCollaborator for HeuristicCollaborator {
    async fn submit(&self, request: &AnalysisRequest) -> Result<String> {
        info!(
            request = %request.id,
            category = ?request.category,
            context = request.rssi_context.len(),
            "heuristic analysis"
        );
        Ok(Self::explain(request))
    }
}
