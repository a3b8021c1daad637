//! Collaborator interfaces for the session engine.
//!
//! The question set provider and the grading gateway are implemented by
//! `examkit-client`; the environment capability is implemented by whatever
//! surface hosts the session (a browser bridge, a terminal, a test).

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::model::{Question, SessionConfig, TestResult};
use crate::submission::SubmissionPayload;

// ---------------------------------------------------------------------------
// Question set provider
// ---------------------------------------------------------------------------

/// Backend that turns a session configuration into an ordered question list.
#[async_trait]
pub trait QuestionSetProvider: Send + Sync {
    /// Human-readable provider name (e.g. "http").
    fn name(&self) -> &str;

    /// Generate the question set for a session.
    async fn generate(&self, config: &SessionConfig) -> Result<Vec<Question>, ProviderError>;
}

// ---------------------------------------------------------------------------
// Grading gateway
// ---------------------------------------------------------------------------

/// Backend that grades a submission.
#[async_trait]
pub trait SubmissionGateway: Send + Sync {
    /// Send one submission attempt and return the graded result.
    async fn submit(&self, payload: &SubmissionPayload) -> Result<TestResult, ProviderError>;
}

// ---------------------------------------------------------------------------
// Environment capability
// ---------------------------------------------------------------------------

/// Handler invoked with a free-form detail string when a signal fires.
///
/// Returns `false` once it no longer wants signals; the source then drops it.
pub type SignalHandler = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Source of visibility and fullscreen transitions.
pub trait EnvironmentEvents {
    /// Register a handler for the viewing surface becoming hidden.
    fn on_visibility_lost(&mut self, handler: SignalHandler);

    /// Register a handler for the surface leaving fullscreen.
    fn on_fullscreen_exited(&mut self, handler: SignalHandler);
}

#[derive(Default)]
struct Handlers {
    visibility_lost: Vec<SignalHandler>,
    fullscreen_exited: Vec<SignalHandler>,
}

/// An environment whose signals are raised by calling code.
///
/// Cloning shares the registered handlers, so one clone can be handed to the
/// engine while another keeps emitting.
#[derive(Clone, Default)]
pub struct ManualEnvironment {
    handlers: Arc<Mutex<Handlers>>,
}

impl ManualEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire every registered visibility-loss handler, dropping those that
    /// have unsubscribed.
    pub fn emit_visibility_lost(&self, detail: &str) {
        let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        handlers.visibility_lost.retain(|handler| handler(detail));
    }

    /// Fire every registered fullscreen-exit handler, dropping those that
    /// have unsubscribed.
    pub fn emit_fullscreen_exited(&self, detail: &str) {
        let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        handlers.fullscreen_exited.retain(|handler| handler(detail));
    }

    pub fn handler_count(&self) -> usize {
        let handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        handlers.visibility_lost.len() + handlers.fullscreen_exited.len()
    }
}

impl EnvironmentEvents for ManualEnvironment {
    fn on_visibility_lost(&mut self, handler: SignalHandler) {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .visibility_lost
            .push(handler);
    }

    fn on_fullscreen_exited(&mut self, handler: SignalHandler) {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .fullscreen_exited
            .push(handler);
    }
}
