//! HTTP question set provider and grading gateway.
//!
//! Talks to the exam backend's `POST /tests/generate` and
//! `POST /tests/submit` endpoints.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use examkit_core::error::ProviderError;
use examkit_core::model::{Question, SessionConfig, TestResult};
use examkit_core::submission::SubmissionPayload;
use examkit_core::traits::{QuestionSetProvider, SubmissionGateway};

const GENERATE_PATH: &str = "/tests/generate";
const SUBMIT_PATH: &str = "/tests/submit";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Client for the exam backend.
pub struct HttpExamClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpExamClient {
    /// Build a client. `timeout` bounds every request end to end.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, ProviderError> {
        let timeout = timeout.unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NetworkError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, ProviderError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.timeout.as_secs())
                } else {
                    ProviderError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: error_message(&body, status),
            });
        }

        response.json::<R>().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(self.timeout.as_secs())
            } else {
                ProviderError::InvalidResponse(format!("failed to parse response: {e}"))
            }
        })
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    questions: Option<Vec<Question>>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Pull the human-readable message out of an error body.
fn error_message(body: &str, status: reqwest::StatusCode) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.message.or(b.error))
        .filter(|m| !m.trim().is_empty())
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        })
}

#[async_trait]
impl QuestionSetProvider for HttpExamClient {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, config), fields(stream = %config.stream_id, count = config.requested_question_count))]
    async fn generate(&self, config: &SessionConfig) -> Result<Vec<Question>, ProviderError> {
        let response: GenerateResponse = self.post_json(GENERATE_PATH, config).await?;
        let questions = response.questions.unwrap_or_default();
        if questions.is_empty() {
            return Err(ProviderError::EmptyQuestionSet);
        }
        debug!(received = questions.len(), "question set fetched");
        Ok(questions)
    }
}

#[async_trait]
impl SubmissionGateway for HttpExamClient {
    #[instrument(skip(self, payload), fields(answers = payload.answers.len()))]
    async fn submit(&self, payload: &SubmissionPayload) -> Result<TestResult, ProviderError> {
        self.post_json(SUBMIT_PATH, payload).await
    }
}
