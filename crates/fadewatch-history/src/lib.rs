//! Session history: the append-only sample log and its derived event index.

mod events;
mod log;
mod session;

pub use events::EventIndex;
pub use log::SampleLog;
pub use session::{HistorySnapshot, RecordedSample, SessionHistory};
