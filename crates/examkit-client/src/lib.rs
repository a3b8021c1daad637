//! examkit-client: exam backend integrations.
//!
//! Implements the question set provider and submission gateway over HTTP,
//! plus in-memory versions for tests and offline runs.

pub mod config;
pub mod http;
pub mod mock;

pub use config::{create_client, load_config, load_config_from, ExamkitConfig};
pub use examkit_core::error::ProviderError;
pub use http::HttpExamClient;
