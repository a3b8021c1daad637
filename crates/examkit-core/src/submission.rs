//! Submission packaging and the one-shot submit protocol.
//!
//! [`build_payload`] flattens a session into the grading service's request
//! shape. [`submit_attempt`] sends exactly one request with a deadline. The
//! single-in-flight guarantee lives in the state machine's `Submitting`
//! status, not here.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::error::ProviderError;
use crate::integrity::IntegrityEvent;
use crate::model::{DifficultySelection, QuestionId, SessionConfig, TestResult};
use crate::session::{ExamSession, UNANSWERED};
use crate::traits::SubmissionGateway;

/// One answer row in the submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEntry {
    pub question_id: QuestionId,
    /// Option index, or `-1` when unanswered or cleared.
    pub selected_option: i32,
    /// Whole seconds spent viewing the question.
    pub time_taken: u64,
}

/// Body of `POST /tests/submit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub stream_id: String,
    pub subject_ids: Vec<String>,
    pub topic_ids: Vec<String>,
    pub answers: Vec<AnswerEntry>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub difficulty: DifficultySelection,
    pub cheating_attempts: Vec<IntegrityEvent>,
    pub tab_switch_count: u32,
}

impl SubmissionPayload {
    pub fn unanswered_count(&self) -> usize {
        self.answers
            .iter()
            .filter(|a| a.selected_option == UNANSWERED)
            .count()
    }
}

/// Package a session for grading. Answers follow the original question
/// order regardless of how the user navigated.
pub fn build_payload(
    session: &ExamSession,
    config: &SessionConfig,
    visibility_lost: u32,
    end_time: DateTime<Utc>,
) -> SubmissionPayload {
    let answers = session
        .questions()
        .iter()
        .map(|q| AnswerEntry {
            question_id: q.id.clone(),
            selected_option: session
                .answer(&q.id)
                .map(|a| a.wire_value())
                .unwrap_or(UNANSWERED),
            time_taken: session.time_spent(&q.id).as_secs_f64().round() as u64,
        })
        .collect();

    SubmissionPayload {
        stream_id: config.stream_id.clone(),
        subject_ids: config.subject_ids.iter().cloned().collect(),
        topic_ids: config.topic_ids.iter().cloned().collect(),
        answers,
        start_time: session.start_time(),
        end_time,
        difficulty: config.difficulty,
        cheating_attempts: session.integrity_log().to_vec(),
        tab_switch_count: visibility_lost,
    }
}

/// Send one submission attempt, giving up after `timeout`.
#[instrument(skip(gateway, payload), fields(answers = payload.answers.len()))]
pub async fn submit_attempt(
    gateway: &dyn SubmissionGateway,
    payload: &SubmissionPayload,
    timeout: Duration,
) -> Result<TestResult, ProviderError> {
    let result = tokio::time::timeout(timeout, gateway.submit(payload))
        .await
        .map_err(|_| ProviderError::Timeout(timeout.as_secs()))??;

    if !result.per_question.is_empty() && result.per_question.len() != payload.answers.len() {
        warn!(
            expected = payload.answers.len(),
            received = result.per_question.len(),
            "graded result does not cover every submitted answer"
        );
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, Question, QuestionOption, ResultSummary};
    use crate::session::{SessionMachine, SubmitTrigger};
    use async_trait::async_trait;

    fn machine(n: usize) -> SessionMachine {
        let questions = (0..n)
            .map(|i| Question {
                id: QuestionId::new(format!("q{i}")),
                text: String::new(),
                options: vec![
                    QuestionOption { text: "a".into() },
                    QuestionOption { text: "b".into() },
                ],
                difficulty: Difficulty::Easy,
            })
            .collect();
        let config = SessionConfig {
            stream_id: "stream-1".into(),
            subject_ids: ["math".to_string(), "bio".to_string()].into(),
            topic_ids: ["algebra".to_string()].into(),
            difficulty: DifficultySelection::Hard,
            requested_question_count: n as u32,
        };
        SessionMachine::new(config, questions, || {}).unwrap()
    }

    #[test]
    fn all_unanswered_payload() {
        let mut m = machine(5);
        let payload = m.begin_submission(SubmitTrigger::Manual).unwrap();
        assert_eq!(payload.answers.len(), 5);
        assert!(payload.answers.iter().all(|a| a.selected_option == -1));
        assert_eq!(payload.unanswered_count(), 5);
        assert_eq!(payload.tab_switch_count, 0);
        assert!(payload.cheating_attempts.is_empty());
    }

    #[test]
    fn payload_keeps_original_order() {
        let mut m = machine(4);
        for index in [3, 1, 2, 0, 3] {
            m.navigate_to(index);
            m.answer_current(1).unwrap();
        }
        m.clear_answer(&QuestionId::new("q2")).unwrap();

        let payload = m.begin_submission(SubmitTrigger::Manual).unwrap();
        let ids: Vec<&str> = payload
            .answers
            .iter()
            .map(|a| a.question_id.as_str())
            .collect();
        assert_eq!(ids, ["q0", "q1", "q2", "q3"]);
        let selected: Vec<i32> = payload.answers.iter().map(|a| a.selected_option).collect();
        assert_eq!(selected, [1, 1, -1, 1]);
    }

    #[test]
    fn payload_carries_session_metadata() {
        let mut m = machine(1);
        let start = m.session().start_time();
        let payload = m.begin_submission(SubmitTrigger::Timer).unwrap();
        assert_eq!(payload.stream_id, "stream-1");
        assert_eq!(payload.subject_ids, ["bio", "math"]);
        assert_eq!(payload.topic_ids, ["algebra"]);
        assert_eq!(payload.difficulty, DifficultySelection::Hard);
        assert_eq!(payload.start_time, start);
        assert!(payload.end_time >= start);

        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("cheatingAttempts").is_some());
        assert!(json.get("tabSwitchCount").is_some());
        assert_eq!(json["answers"][0]["selectedOption"], -1);
        assert_eq!(json["answers"][0]["timeTaken"], 0);
    }

    struct SlowGateway;

    #[async_trait]
    impl SubmissionGateway for SlowGateway {
        async fn submit(&self, _: &SubmissionPayload) -> Result<TestResult, ProviderError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(TestResult {
                summary: ResultSummary {
                    total_questions: 0,
                    correct_answers: 0,
                    wrong_answers: 0,
                    skipped_questions: 0,
                    percentage: 0.0,
                    score: 0.0,
                    time_taken_minutes: 0.0,
                },
                per_question: vec![],
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hung_submission_times_out() {
        let mut m = machine(1);
        let payload = m.begin_submission(SubmitTrigger::Manual).unwrap();
        let err = submit_attempt(&SlowGateway, &payload, Duration::from_secs(30))
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::Timeout(30));
    }
}
