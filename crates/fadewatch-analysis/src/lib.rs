//! Bridge between detected fading events and an external reasoning service.

mod collaborator;
mod dispatcher;

pub use collaborator::{AnalysisCollaborator, HeuristicCollaborator};
pub use dispatcher::{AnalysisDispatcher, DispatchStats};

use fadewatch_types::FadewatchError;

pub fn analysis_error(message: impl Into<String>) -> FadewatchError {
    FadewatchError::Analysis(message.into())
}
