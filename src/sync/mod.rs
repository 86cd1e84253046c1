//! Sync module - keeps the inbox playlist in line with the show library
//!
//! - `paginator`: drains offset-paged listings
//! - `batch`: chunked, ordered playlist mutations
//! - `classifier`: finished / new episode rules
//! - `playlist_state`: playlist resolution and contents
//! - `engine`: the reconciliation run tying them together

mod batch;
mod classifier;
mod engine;
mod error;
pub(crate) mod paginator;
mod playlist_state;

pub use classifier::NewEpisodePolicy;
pub use engine::{EngineOptions, ReconciliationEngine};
pub use error::{Stage, SyncError};
