//! Shared domain types for the fadewatch project.

pub mod analysis;
pub mod config;
pub mod export;
pub mod fading;
pub mod sample;

mod errors;

pub use errors::{FadewatchError, Result};
