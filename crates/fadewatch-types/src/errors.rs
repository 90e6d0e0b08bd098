use thiserror::Error;

pub type Result<T, E = FadewatchError> = std::result::Result<T, E>;

/// Unified error type covering common failure scenarios across subsystems.
#[derive(Debug, Error)]
pub enum FadewatchError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("acquisition error: {0}")]
    Acquisition(String),
    #[error("analysis error: {0}")]
    Analysis(String),
    #[error("monitor error: {0}")]
    Monitor(String),
    #[error("operational error: {0}")]
    Ops(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
