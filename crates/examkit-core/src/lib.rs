//! examkit-core: the timed exam session engine.
//!
//! This crate holds the data model, the session state machine with its
//! clock and integrity monitor, the submission packager, and the scoring
//! statistics that every examkit front end builds on.

pub mod clock;
pub mod engine;
pub mod error;
pub mod integrity;
pub mod model;
pub mod parser;
pub mod report;
pub mod session;
pub mod statistics;
pub mod submission;
pub mod traits;
