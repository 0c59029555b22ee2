//! Adapters layer: Concrete implementations of ports.
//!
//! These modules contain the actual integration with external libraries:
//! - `http`: reqwest client for the prediction service
//! - `sqlite`: SQLite for health history and user profiles
//! - `sanitize`: identifier/credential filtering for logs

pub mod http;
pub mod sanitize;
pub mod sqlite;

// Re-export storage error for lib.rs
pub use sqlite::StorageError;
