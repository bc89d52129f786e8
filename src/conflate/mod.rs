//! Matching primary features against the secondary dataset.

pub mod decision;
pub mod index;
pub mod orchestrator;
pub mod params;

pub use orchestrator::{conflate, ConflationResult};
pub use params::ConflateParams;
