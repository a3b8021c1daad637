//! The `examkit validate` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use examkit_core::clock::exam_duration_secs;
use examkit_core::parser;

pub fn execute(session_path: PathBuf) -> Result<()> {
    let config = parser::parse_session_config(&session_path)?;
    config
        .validate()
        .with_context(|| format!("invalid session file: {}", session_path.display()))?;

    let minutes = exam_duration_secs(config.requested_question_count as usize) / 60;
    println!(
        "Session: {} ({} subjects, {} topics, {} difficulty)",
        config.stream_id,
        config.subject_ids.len(),
        config.topic_ids.len(),
        config.difficulty
    );
    println!(
        "{} questions, {minutes} minutes",
        config.requested_question_count
    );

    let content = std::fs::read_to_string(&session_path)?;
    let warnings = parser::lint_session_file(&content, &session_path)?;
    for w in &warnings {
        println!("  WARNING: {}", w.message);
    }

    if warnings.is_empty() {
        println!("Session file valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
