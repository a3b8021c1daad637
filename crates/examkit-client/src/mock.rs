//! In-memory question source and grader for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use examkit_core::error::ProviderError;
use examkit_core::model::{
    Difficulty, Question, QuestionId, QuestionOption, QuestionOutcome, ResultSummary,
    SessionConfig, TestResult,
};
use examkit_core::submission::SubmissionPayload;
use examkit_core::traits::{QuestionSetProvider, SubmissionGateway};

/// Build `n` four-option questions `q1..qn`, cycling through difficulties.
pub fn sample_questions(n: usize) -> Vec<Question> {
    (0..n)
        .map(|i| Question {
            id: QuestionId::new(format!("q{}", i + 1)),
            text: format!("Sample question {}?", i + 1),
            options: ["A", "B", "C", "D"]
                .iter()
                .map(|t| QuestionOption {
                    text: format!("Option {t}"),
                })
                .collect(),
            difficulty: Difficulty::ALL[i % Difficulty::ALL.len()],
        })
        .collect()
}

/// A question source that serves a fixed list.
///
/// The list is truncated to the requested count, so one mock can back
/// sessions of different sizes.
pub struct MockQuestionProvider {
    questions: Vec<Question>,
    error: Option<ProviderError>,
    delay: Option<Duration>,
    call_count: AtomicU32,
    last_config: Mutex<Option<SessionConfig>>,
}

impl MockQuestionProvider {
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions,
            error: None,
            delay: None,
            call_count: AtomicU32::new(0),
            last_config: Mutex::new(None),
        }
    }

    /// Serve [`sample_questions`].
    pub fn with_sample(n: usize) -> Self {
        Self::new(sample_questions(n))
    }

    /// Fail every fetch with `error`.
    pub fn failing(error: ProviderError) -> Self {
        Self {
            error: Some(error),
            ..Self::new(Vec::new())
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_config(&self) -> Option<SessionConfig> {
        self.last_config
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl QuestionSetProvider for MockQuestionProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, config: &SessionConfig) -> Result<Vec<Question>, ProviderError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self
            .last_config
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(config.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = &self.error {
            return Err(err.clone());
        }

        let wanted = config.requested_question_count as usize;
        Ok(self.questions.iter().take(wanted).cloned().collect())
    }
}

/// A grader that scores submissions against an answer key.
///
/// Unless overridden, option 0 is correct for every question.
pub struct MockGateway {
    key: HashMap<QuestionId, (usize, Difficulty)>,
    delay: Option<Duration>,
    failures_remaining: AtomicU32,
    failure: ProviderError,
    call_count: AtomicU32,
    payloads: Mutex<Vec<SubmissionPayload>>,
}

impl MockGateway {
    pub fn new(questions: &[Question]) -> Self {
        Self {
            key: questions
                .iter()
                .map(|q| (q.id.clone(), (0, q.difficulty)))
                .collect(),
            delay: None,
            failures_remaining: AtomicU32::new(0),
            failure: ProviderError::NetworkError("connection reset".into()),
            call_count: AtomicU32::new(0),
            payloads: Mutex::new(Vec::new()),
        }
    }

    pub fn with_correct_option(mut self, id: impl Into<QuestionId>, option: usize) -> Self {
        let id = id.into();
        let difficulty = self.key.get(&id).map(|(_, d)| *d).unwrap_or_default();
        self.key.insert(id, (option, difficulty));
        self
    }

    /// Delay every response. Uses tokio time, so paused-clock tests can
    /// advance past it.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail the next `n` submissions with `error`, then grade normally.
    pub fn failing_first(mut self, n: u32, error: ProviderError) -> Self {
        self.failures_remaining = AtomicU32::new(n);
        self.failure = error;
        self
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Every payload received, in order.
    pub fn payloads(&self) -> Vec<SubmissionPayload> {
        self.payloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn grade(&self, payload: &SubmissionPayload) -> TestResult {
        let per_question: Vec<QuestionOutcome> = payload
            .answers
            .iter()
            .map(|a| {
                let (correct, difficulty) = self
                    .key
                    .get(&a.question_id)
                    .copied()
                    .unwrap_or((0, Difficulty::default()));
                QuestionOutcome {
                    question_id: a.question_id.clone(),
                    selected_option_index: a.selected_option,
                    correct_option_index: correct as i32,
                    is_correct: a.selected_option == correct as i32,
                    difficulty,
                    explanation: None,
                }
            })
            .collect();

        let total = per_question.len() as u32;
        let correct = per_question.iter().filter(|q| q.is_correct).count() as u32;
        let skipped = per_question.iter().filter(|q| q.is_skipped()).count() as u32;
        let percentage = if total == 0 {
            0.0
        } else {
            correct as f64 / total as f64 * 100.0
        };
        let elapsed = (payload.end_time - payload.start_time).num_seconds().max(0);

        TestResult {
            summary: ResultSummary {
                total_questions: total,
                correct_answers: correct,
                wrong_answers: total - correct - skipped,
                skipped_questions: skipped,
                percentage,
                score: correct as f64,
                time_taken_minutes: elapsed as f64 / 60.0,
            },
            per_question,
        }
    }
}

#[async_trait]
impl SubmissionGateway for MockGateway {
    async fn submit(&self, payload: &SubmissionPayload) -> Result<TestResult, ProviderError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.payloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(payload.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .failures_remaining
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(self.failure.clone());
        }

        Ok(self.grade(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use examkit_core::model::DifficultySelection;
    use examkit_core::submission::AnswerEntry;

    fn config(count: u32) -> SessionConfig {
        SessionConfig {
            stream_id: "s".into(),
            subject_ids: ["a".to_string()].into(),
            topic_ids: ["b".to_string()].into(),
            difficulty: DifficultySelection::Mixed,
            requested_question_count: count,
        }
    }

    fn payload(selections: &[i32]) -> SubmissionPayload {
        let start = Utc::now();
        SubmissionPayload {
            stream_id: "s".into(),
            subject_ids: vec!["a".into()],
            topic_ids: vec!["b".into()],
            answers: selections
                .iter()
                .enumerate()
                .map(|(i, &s)| AnswerEntry {
                    question_id: QuestionId::new(format!("q{}", i + 1)),
                    selected_option: s,
                    time_taken: 10,
                })
                .collect(),
            start_time: start,
            end_time: start + chrono::Duration::seconds(90),
            difficulty: DifficultySelection::Mixed,
            cheating_attempts: vec![],
            tab_switch_count: 0,
        }
    }

    #[tokio::test]
    async fn provider_truncates_to_requested_count() {
        let provider = MockQuestionProvider::with_sample(10);
        let questions = provider.generate(&config(4)).await.unwrap();
        assert_eq!(questions.len(), 4);
        assert_eq!(questions[0].id.as_str(), "q1");
        assert_eq!(provider.call_count(), 1);
        assert_eq!(provider.last_config().unwrap().requested_question_count, 4);
    }

    #[tokio::test]
    async fn failing_provider() {
        let provider = MockQuestionProvider::failing(ProviderError::EmptyQuestionSet);
        let err = provider.generate(&config(4)).await.unwrap_err();
        assert_eq!(err, ProviderError::EmptyQuestionSet);
    }

    #[tokio::test]
    async fn gateway_grades_against_key() {
        let questions = sample_questions(3);
        let gateway = MockGateway::new(&questions).with_correct_option("q2", 2);

        let result = gateway.submit(&payload(&[0, 2, -1])).await.unwrap();
        assert_eq!(result.summary.correct_answers, 2);
        assert_eq!(result.summary.skipped_questions, 1);
        assert_eq!(result.summary.wrong_answers, 0);
        assert_eq!(result.summary.time_taken_minutes, 1.5);
        assert_eq!(result.per_question[1].difficulty, questions[1].difficulty);
    }

    #[tokio::test]
    async fn gateway_fails_first_then_grades() {
        let gateway = MockGateway::new(&sample_questions(2))
            .failing_first(1, ProviderError::Timeout(30));

        assert!(gateway.submit(&payload(&[0, 1])).await.is_err());
        assert!(gateway.submit(&payload(&[0, 1])).await.is_ok());
        assert_eq!(gateway.call_count(), 2);
        assert_eq!(gateway.payloads().len(), 2);
    }
}
