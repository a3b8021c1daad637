//! Derived statistics for a graded test.
//!
//! Everything here is a pure function of a [`TestResult`]: the same input
//! always produces the same analysis.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{Difficulty, QuestionId, ResultSummary, TestResult};

/// `part / whole * 100`, or 0 when `whole` is 0.
fn percent(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Share of all questions answered correctly.
pub fn accuracy(correct: u32, total: u32) -> f64 {
    percent(correct, total)
}

/// Questions the student actually answered.
pub fn attempted_questions(total: u32, skipped: u32) -> u32 {
    total.saturating_sub(skipped)
}

/// Share of attempted questions answered correctly.
pub fn attempt_accuracy(correct: u32, total: u32, skipped: u32) -> f64 {
    percent(correct, attempted_questions(total, skipped))
}

/// Letter grade banded on the result percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    #[serde(rename = "B+")]
    BPlus,
    B,
    C,
    D,
}

impl Grade {
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 90.0 {
            Grade::APlus
        } else if percentage >= 80.0 {
            Grade::A
        } else if percentage >= 70.0 {
            Grade::BPlus
        } else if percentage >= 60.0 {
            Grade::B
        } else if percentage >= 50.0 {
            Grade::C
        } else {
            Grade::D
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grade::APlus => write!(f, "A+"),
            Grade::A => write!(f, "A"),
            Grade::BPlus => write!(f, "B+"),
            Grade::B => write!(f, "B"),
            Grade::C => write!(f, "C"),
            Grade::D => write!(f, "D"),
        }
    }
}

/// Correct/total counts for one difficulty bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DifficultyStats {
    pub total: u32,
    pub correct: u32,
    pub percentage: f64,
}

/// Per-difficulty breakdown, always holding all three buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DifficultyBreakdown {
    pub easy: DifficultyStats,
    pub medium: DifficultyStats,
    pub hard: DifficultyStats,
}

impl DifficultyBreakdown {
    pub fn get(&self, difficulty: Difficulty) -> &DifficultyStats {
        match difficulty {
            Difficulty::Easy => &self.easy,
            Difficulty::Medium => &self.medium,
            Difficulty::Hard => &self.hard,
        }
    }

    fn get_mut(&mut self, difficulty: Difficulty) -> &mut DifficultyStats {
        match difficulty {
            Difficulty::Easy => &mut self.easy,
            Difficulty::Medium => &mut self.medium,
            Difficulty::Hard => &mut self.hard,
        }
    }
}

/// Count total and correct questions per difficulty tag.
pub fn difficulty_breakdown(result: &TestResult) -> DifficultyBreakdown {
    let mut breakdown = DifficultyBreakdown::default();
    for outcome in &result.per_question {
        let bucket = breakdown.get_mut(outcome.difficulty);
        bucket.total += 1;
        if outcome.is_correct {
            bucket.correct += 1;
        }
    }
    for difficulty in Difficulty::ALL {
        let bucket = breakdown.get_mut(difficulty);
        bucket.percentage = percent(bucket.correct, bucket.total);
    }
    breakdown
}

/// One row of the answer review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionReview {
    /// 1-based position in the original order.
    pub number: usize,
    pub question_id: QuestionId,
    pub selected_option: Option<usize>,
    pub correct_option: Option<usize>,
    pub is_correct: bool,
    pub difficulty: Difficulty,
    pub explanation: Option<String>,
}

impl QuestionReview {
    pub fn is_skipped(&self) -> bool {
        self.selected_option.is_none()
    }
}

/// Display-ready statistics for a graded test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultAnalysis {
    pub summary: ResultSummary,
    pub accuracy: f64,
    pub attempted_questions: u32,
    pub attempt_accuracy: f64,
    pub grade: Grade,
    pub by_difficulty: DifficultyBreakdown,
    /// Average seconds per question, from the reported time taken.
    pub avg_seconds_per_question: f64,
    pub review: Vec<QuestionReview>,
}

fn wire_index(value: i32) -> Option<usize> {
    usize::try_from(value).ok()
}

/// Compute every derived statistic for a result.
pub fn analyze(result: &TestResult) -> ResultAnalysis {
    let s = &result.summary;

    let review = result
        .per_question
        .iter()
        .enumerate()
        .map(|(i, q)| QuestionReview {
            number: i + 1,
            question_id: q.question_id.clone(),
            selected_option: wire_index(q.selected_option_index),
            correct_option: wire_index(q.correct_option_index),
            is_correct: q.is_correct,
            difficulty: q.difficulty,
            explanation: q.explanation.clone(),
        })
        .collect();

    let avg_seconds_per_question = if s.total_questions == 0 {
        0.0
    } else {
        s.time_taken_minutes * 60.0 / s.total_questions as f64
    };

    ResultAnalysis {
        summary: s.clone(),
        accuracy: accuracy(s.correct_answers, s.total_questions),
        attempted_questions: attempted_questions(s.total_questions, s.skipped_questions),
        attempt_accuracy: attempt_accuracy(
            s.correct_answers,
            s.total_questions,
            s.skipped_questions,
        ),
        grade: Grade::from_percentage(s.percentage),
        by_difficulty: difficulty_breakdown(result),
        avg_seconds_per_question,
        review,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuestionOutcome;

    fn summary(total: u32, correct: u32, skipped: u32, percentage: f64) -> ResultSummary {
        ResultSummary {
            total_questions: total,
            correct_answers: correct,
            wrong_answers: total - correct - skipped,
            skipped_questions: skipped,
            percentage,
            score: correct as f64,
            time_taken_minutes: 10.0,
        }
    }

    fn outcome(id: &str, difficulty: Difficulty, selected: i32, correct: bool) -> QuestionOutcome {
        QuestionOutcome {
            question_id: QuestionId::new(id),
            selected_option_index: selected,
            correct_option_index: 1,
            is_correct: correct,
            difficulty,
            explanation: None,
        }
    }

    #[test]
    fn twenty_question_reference_case() {
        let result = TestResult {
            summary: summary(20, 15, 2, 75.0),
            per_question: vec![],
        };
        let a = analyze(&result);
        assert!((a.accuracy - 75.0).abs() < 1e-9);
        assert_eq!(a.attempted_questions, 18);
        assert!((a.attempt_accuracy - 250.0 / 3.0).abs() < 1e-9);
        assert_eq!(a.grade, Grade::BPlus);
        assert!((a.avg_seconds_per_question - 30.0).abs() < 1e-9);
    }

    #[test]
    fn zero_questions_do_not_divide_by_zero() {
        let result = TestResult {
            summary: summary(0, 0, 0, 0.0),
            per_question: vec![],
        };
        let a = analyze(&result);
        assert_eq!(a.accuracy, 0.0);
        assert_eq!(a.attempt_accuracy, 0.0);
        assert_eq!(a.attempted_questions, 0);
        assert_eq!(a.avg_seconds_per_question, 0.0);
        assert_eq!(a.by_difficulty, DifficultyBreakdown::default());
    }

    #[test]
    fn all_skipped_attempt_accuracy_is_zero() {
        assert_eq!(attempt_accuracy(0, 5, 5), 0.0);
        // Inconsistent payloads never underflow.
        assert_eq!(attempted_questions(3, 7), 0);
    }

    #[test]
    fn grade_bands() {
        let cases = [
            (100.0, Grade::APlus),
            (90.0, Grade::APlus),
            (89.99, Grade::A),
            (80.0, Grade::A),
            (70.0, Grade::BPlus),
            (69.9, Grade::B),
            (60.0, Grade::B),
            (50.0, Grade::C),
            (49.9, Grade::D),
            (0.0, Grade::D),
        ];
        for (pct, grade) in cases {
            assert_eq!(Grade::from_percentage(pct), grade, "at {pct}%");
        }
        assert_eq!(Grade::BPlus.to_string(), "B+");
        assert_eq!(serde_json::to_string(&Grade::APlus).unwrap(), "\"A+\"");
    }

    #[test]
    fn breakdown_by_difficulty() {
        let result = TestResult {
            summary: summary(5, 3, 1, 60.0),
            per_question: vec![
                outcome("a", Difficulty::Easy, 1, true),
                outcome("b", Difficulty::Easy, 0, false),
                outcome("c", Difficulty::Hard, 1, true),
                outcome("d", Difficulty::Hard, 1, true),
                outcome("e", Difficulty::Hard, -1, false),
            ],
        };
        let a = analyze(&result);
        assert_eq!(a.by_difficulty.easy.total, 2);
        assert_eq!(a.by_difficulty.easy.correct, 1);
        assert!((a.by_difficulty.easy.percentage - 50.0).abs() < 1e-9);
        assert_eq!(a.by_difficulty.medium, DifficultyStats::default());
        assert_eq!(a.by_difficulty.get(Difficulty::Hard).correct, 2);
        assert!((a.by_difficulty.hard.percentage - 200.0 / 3.0).abs() < 1e-9);

        assert_eq!(a.review.len(), 5);
        assert_eq!(a.review[0].number, 1);
        assert!(a.review[4].is_skipped());
        assert_eq!(a.review[4].correct_option, Some(1));
    }

    #[test]
    fn analysis_is_deterministic() {
        let result = TestResult {
            summary: summary(3, 2, 0, 66.7),
            per_question: vec![
                outcome("a", Difficulty::Medium, 1, true),
                outcome("b", Difficulty::Medium, 1, true),
                outcome("c", Difficulty::Easy, 0, false),
            ],
        };
        assert_eq!(analyze(&result), analyze(&result));
    }
}
