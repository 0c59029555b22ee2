//! Ports layer: Trait definitions for external collaborators.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the diagnosis pipeline and the outside world (prediction service,
//! history store, profile store, wall clock).

mod history;
mod prediction;
mod profile;

pub use history::{Clock, FixedClock, HistoryStore, SystemClock};
pub use prediction::{BoxError, PredictionError, PredictionService};
pub use profile::ProfileStore;
