//! Core data model types for examkit.
//!
//! Questions and session configurations arrive from the question set
//! provider, test results arrive from the grading service. All wire names
//! follow the backend's camelCase JSON.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Upper bound on the number of questions a single session may request.
pub const MAX_QUESTION_COUNT: u32 = 200;

/// Opaque question identifier, unique within a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(String);

impl QuestionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QuestionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for QuestionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Difficulty tag carried by every question.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Difficulty {
    #[serde(alias = "easy")]
    Easy,
    #[default]
    #[serde(alias = "medium")]
    Medium,
    #[serde(alias = "hard")]
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "Easy"),
            Difficulty::Medium => write!(f, "Medium"),
            Difficulty::Hard => write!(f, "Hard"),
        }
    }
}

/// Difficulty requested for a generated test.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DifficultySelection {
    Easy,
    Medium,
    Hard,
    #[default]
    Mixed,
}

impl fmt::Display for DifficultySelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DifficultySelection::Easy => write!(f, "Easy"),
            DifficultySelection::Medium => write!(f, "Medium"),
            DifficultySelection::Hard => write!(f, "Hard"),
            DifficultySelection::Mixed => write!(f, "Mixed"),
        }
    }
}

impl FromStr for DifficultySelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "easy" => Ok(DifficultySelection::Easy),
            "medium" => Ok(DifficultySelection::Medium),
            "hard" => Ok(DifficultySelection::Hard),
            "mixed" | "any" => Ok(DifficultySelection::Mixed),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

/// One answer option. Correctness is resolved server-side and never
/// deserialized into the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub text: String,
}

/// A single multiple-choice question as served by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    #[serde(alias = "_id")]
    pub id: QuestionId,
    /// Question body; may contain markup.
    pub text: String,
    pub options: Vec<QuestionOption>,
    #[serde(default)]
    pub difficulty: Difficulty,
}

impl Question {
    pub fn option_count(&self) -> usize {
        self.options.len()
    }
}

/// The subject hierarchy and size of a test to generate.
///
/// Created once before a session starts and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub stream_id: String,
    pub subject_ids: BTreeSet<String>,
    pub topic_ids: BTreeSet<String>,
    #[serde(default)]
    pub difficulty: DifficultySelection,
    #[serde(rename = "questionCount")]
    pub requested_question_count: u32,
}

impl SessionConfig {
    /// Reject configurations that must never reach the provider.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stream_id.trim().is_empty() {
            return Err(ConfigError::MissingStream);
        }
        if self.subject_ids.is_empty() {
            return Err(ConfigError::NoSubjects);
        }
        if self.topic_ids.is_empty() {
            return Err(ConfigError::NoTopics);
        }
        if self.requested_question_count == 0 {
            return Err(ConfigError::ZeroQuestions);
        }
        if self.requested_question_count > MAX_QUESTION_COUNT {
            return Err(ConfigError::TooManyQuestions {
                requested: self.requested_question_count,
                max: MAX_QUESTION_COUNT,
            });
        }
        Ok(())
    }
}

/// Aggregate figures computed by the grading service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSummary {
    pub total_questions: u32,
    pub correct_answers: u32,
    pub wrong_answers: u32,
    pub skipped_questions: u32,
    pub percentage: f64,
    pub score: f64,
    #[serde(default)]
    pub time_taken_minutes: f64,
}

/// Grading outcome of one question, aligned with the original order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOutcome {
    pub question_id: QuestionId,
    /// `-1` when the question was skipped.
    pub selected_option_index: i32,
    pub correct_option_index: i32,
    pub is_correct: bool,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub explanation: Option<String>,
}

impl QuestionOutcome {
    pub fn is_skipped(&self) -> bool {
        self.selected_option_index < 0
    }
}

/// Graded response to a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub summary: ResultSummary,
    #[serde(default, alias = "questions")]
    pub per_question: Vec<QuestionOutcome>,
}
