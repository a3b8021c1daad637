pub mod init;
pub mod score;
pub mod take;
pub mod validate;

use comfy_table::{Cell, Table};

use examkit_core::model::Difficulty;
use examkit_core::statistics::ResultAnalysis;

/// Print the headline figures as a table on stderr.
pub fn print_summary(analysis: &ResultAnalysis) {
    let s = &analysis.summary;

    let mut table = Table::new();
    table.set_header(vec!["Score", "Percentage", "Grade", "Correct", "Wrong", "Skipped"]);
    table.add_row(vec![
        Cell::new(format!("{} / {}", s.score, s.total_questions)),
        Cell::new(format!("{:.1}%", s.percentage)),
        Cell::new(analysis.grade),
        Cell::new(s.correct_answers),
        Cell::new(s.wrong_answers),
        Cell::new(s.skipped_questions),
    ]);

    let mut by_difficulty = Table::new();
    by_difficulty.set_header(vec!["Difficulty", "Correct", "Total", "Accuracy"]);
    for difficulty in Difficulty::ALL {
        let bucket = analysis.by_difficulty.get(difficulty);
        by_difficulty.add_row(vec![
            Cell::new(difficulty),
            Cell::new(bucket.correct),
            Cell::new(bucket.total),
            Cell::new(format!("{:.1}%", bucket.percentage)),
        ]);
    }

    eprintln!("\n{table}\n{by_difficulty}");
}
