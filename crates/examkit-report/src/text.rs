//! Plain-text result report.

use std::fmt::Write;

use examkit_core::model::Difficulty;
use examkit_core::statistics::ResultAnalysis;

/// Letter label for an option index, `-` when none.
pub(crate) fn option_label(index: Option<usize>) -> String {
    match index {
        Some(i) if i < 26 => char::from(b'A' + i as u8).to_string(),
        Some(i) => (i + 1).to_string(),
        None => "-".to_string(),
    }
}

pub(crate) fn format_minutes(minutes: f64) -> String {
    let total_secs = (minutes * 60.0).round().max(0.0) as u64;
    format!("{}m {:02}s", total_secs / 60, total_secs % 60)
}

/// Render the analysis for a terminal.
pub fn render_text(analysis: &ResultAnalysis) -> String {
    let s = &analysis.summary;
    let mut out = String::new();

    // Writes to a String cannot fail.
    let _ = writeln!(
        out,
        "Score: {} / {}  ({:.1}%)  Grade {}",
        s.score, s.total_questions, s.percentage, analysis.grade
    );
    let _ = writeln!(
        out,
        "Correct {}  Wrong {}  Skipped {}",
        s.correct_answers, s.wrong_answers, s.skipped_questions
    );
    let _ = writeln!(
        out,
        "Accuracy {:.1}%  Attempted {}  Accuracy on attempted {:.1}%",
        analysis.accuracy, analysis.attempted_questions, analysis.attempt_accuracy
    );
    let _ = writeln!(
        out,
        "Time taken {}  ({:.0}s per question)",
        format_minutes(s.time_taken_minutes),
        analysis.avg_seconds_per_question
    );

    let _ = writeln!(out, "\nBy difficulty:");
    for difficulty in Difficulty::ALL {
        let bucket = analysis.by_difficulty.get(difficulty);
        if bucket.total == 0 {
            continue;
        }
        let _ = writeln!(
            out,
            "  {:<7} {:>3}/{:<3} {:>5.1}%",
            difficulty.to_string(),
            bucket.correct,
            bucket.total,
            bucket.percentage
        );
    }

    if !analysis.review.is_empty() {
        let _ = writeln!(out, "\nReview:");
        for row in &analysis.review {
            let mark = if row.is_skipped() {
                "skipped"
            } else if row.is_correct {
                "correct"
            } else {
                "wrong"
            };
            let _ = writeln!(
                out,
                "  {:>3}. {:<12} yours {}  answer {}  {}",
                row.number,
                row.question_id.as_str(),
                option_label(row.selected_option),
                option_label(row.correct_option),
                mark
            );
            if let Some(explanation) = &row.explanation {
                let _ = writeln!(out, "       {explanation}");
            }
        }
    }

    out
}
