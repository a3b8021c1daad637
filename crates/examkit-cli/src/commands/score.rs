//! The `examkit score` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use examkit_core::report::load_test_result;
use examkit_core::statistics::analyze;
use examkit_report::{generate_html, render_text};

use super::print_summary;

pub fn execute(result_path: PathBuf, format: String, output: Option<PathBuf>) -> Result<()> {
    let result = load_test_result(&result_path)?;
    if result.per_question.len() != result.summary.total_questions as usize {
        eprintln!(
            "Warning: {} graded questions listed but the summary reports {}",
            result.per_question.len(),
            result.summary.total_questions
        );
    }
    let analysis = analyze(&result);

    let rendered = match format.as_str() {
        "text" => render_text(&analysis),
        "json" => serde_json::to_string_pretty(&analysis).context("failed to serialize analysis")?,
        "html" => {
            let title = result_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "result".to_string());
            generate_html(&analysis, &title)
        }
        other => anyhow::bail!("unknown format: {other}"),
    };

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            print_summary(&analysis);
            eprintln!("Report written to: {}", path.display());
        }
        None => println!("{rendered}"),
    }

    Ok(())
}
