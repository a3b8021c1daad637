//! Error taxonomy for the exam session engine.
//!
//! Configuration errors are rejected before a session exists, provider
//! errors cover both suspension points (question fetch and submission), and
//! session errors are operations rejected by the state machine. Integrity
//! events are never errors.

use thiserror::Error;

use crate::model::QuestionId;
use crate::session::SessionStatus;

/// A session configuration that must not be sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("no stream selected")]
    MissingStream,

    #[error("at least one subject must be selected")]
    NoSubjects,

    #[error("at least one topic must be selected")]
    NoTopics,

    #[error("question count must be at least 1")]
    ZeroQuestions,

    #[error("question count {requested} exceeds the maximum of {max}")]
    TooManyQuestions { requested: u32, max: u32 },
}

/// Failures talking to the question set provider or the grading service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The backend answered with a non-success status. `message` is the
    /// backend's own human-readable text, surfaced verbatim.
    #[error("{message} (HTTP {status})")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The provider returned no questions.
    #[error("the question set provider returned no questions")]
    EmptyQuestionSet,

    /// The question list cannot back a session (e.g. duplicate ids).
    #[error("invalid question set: {0}")]
    InvalidQuestionSet(String),

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Returns `true` if offering the user a retry makes sense.
    ///
    /// Retries are always user-initiated; nothing in the engine retries on
    /// its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Timeout(_) | ProviderError::NetworkError(_) => true,
            ProviderError::ApiError { status, .. } => *status >= 500 || *status == 429,
            ProviderError::EmptyQuestionSet => true,
            ProviderError::InvalidQuestionSet(_) | ProviderError::InvalidResponse(_) => false,
        }
    }

    /// Message to show next to the retry affordance.
    pub fn user_message(&self) -> String {
        match self {
            ProviderError::ApiError { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Operations the session state machine refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session is {status}, not active")]
    NotActive { status: SessionStatus },

    #[error("a submission is already in flight")]
    DuplicateSubmission,

    #[error("time is up, the exam can only be submitted or abandoned")]
    TimeExpired,

    #[error("question {0} is not part of this session")]
    UnknownQuestion(QuestionId),

    #[error("option {option} is out of range for question {question_id} ({option_count} options)")]
    OptionOutOfRange {
        question_id: QuestionId,
        option: i32,
        option_count: usize,
    },
}

/// Why a session could not be started.
#[derive(Debug, Error)]
pub enum StartError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}
