//! TOML session configuration parser.
//!
//! Loads session configurations from TOML files and lints them.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::clock::exam_duration_secs;
use crate::model::{DifficultySelection, SessionConfig};

/// Intermediate TOML structure for session files.
#[derive(Debug, Deserialize)]
struct TomlSessionFile {
    session: TomlSession,
}

#[derive(Debug, Deserialize)]
struct TomlSession {
    stream_id: String,
    #[serde(default)]
    subject_ids: Vec<String>,
    #[serde(default)]
    topic_ids: Vec<String>,
    #[serde(default = "default_difficulty")]
    difficulty: String,
    question_count: u32,
}

fn default_difficulty() -> String {
    "mixed".to_string()
}

/// Parse a session configuration file.
pub fn parse_session_config(path: &Path) -> Result<SessionConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read session file: {}", path.display()))?;

    parse_session_config_str(&content, path)
}

/// Parse a TOML string into a `SessionConfig` (useful for testing).
pub fn parse_session_config_str(content: &str, source_path: &Path) -> Result<SessionConfig> {
    let parsed: TomlSessionFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;
    let s = parsed.session;

    let difficulty: DifficultySelection = s
        .difficulty
        .parse()
        .map_err(|e: String| anyhow::anyhow!("{}", e))?;

    Ok(SessionConfig {
        stream_id: s.stream_id,
        subject_ids: s.subject_ids.into_iter().collect(),
        topic_ids: s.topic_ids.into_iter().collect(),
        difficulty,
        requested_question_count: s.question_count,
    })
}

/// A non-fatal observation about a session file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    pub message: String,
}

/// Lint a session file. Hard errors come from [`SessionConfig::validate`];
/// these are things worth pointing out that still produce a valid session.
pub fn lint_session_file(content: &str, source_path: &Path) -> Result<Vec<ValidationWarning>> {
    let parsed: TomlSessionFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;
    let s = parsed.session;
    let mut warnings = Vec::new();

    for (label, ids) in [("subject", &s.subject_ids), ("topic", &s.topic_ids)] {
        let unique: BTreeSet<&String> = ids.iter().collect();
        if unique.len() != ids.len() {
            warnings.push(ValidationWarning {
                message: format!("duplicate {label} ids are ignored"),
            });
        }
        if ids.iter().any(|id| id.trim().is_empty()) {
            warnings.push(ValidationWarning {
                message: format!("blank {label} id"),
            });
        }
    }

    let minutes = exam_duration_secs(s.question_count as usize) / 60;
    if minutes > 120 {
        warnings.push(ValidationWarning {
            message: format!(
                "{} questions make a {minutes}-minute exam",
                s.question_count
            ),
        });
    }

    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SAMPLE: &str = r#"
[session]
stream_id = "engineering"
subject_ids = ["physics", "chemistry"]
topic_ids = ["kinematics", "thermodynamics", "kinematics"]
difficulty = "Hard"
question_count = 25
"#;

    #[test]
    fn parse_sample() {
        let config = parse_session_config_str(SAMPLE, &PathBuf::from("s.toml")).unwrap();
        assert_eq!(config.stream_id, "engineering");
        assert_eq!(config.subject_ids.len(), 2);
        assert_eq!(config.topic_ids.len(), 2);
        assert_eq!(config.difficulty, DifficultySelection::Hard);
        assert_eq!(config.requested_question_count, 25);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn difficulty_defaults_to_mixed() {
        let toml = r#"
[session]
stream_id = "medical"
subject_ids = ["biology"]
topic_ids = ["cells"]
question_count = 5
"#;
        let config = parse_session_config_str(toml, &PathBuf::from("s.toml")).unwrap();
        assert_eq!(config.difficulty, DifficultySelection::Mixed);
    }

    #[test]
    fn unknown_difficulty_is_an_error() {
        let toml = SAMPLE.replace("\"Hard\"", "\"brutal\"");
        let err = parse_session_config_str(&toml, &PathBuf::from("s.toml")).unwrap_err();
        assert!(err.to_string().contains("unknown difficulty"));
    }

    #[test]
    fn lint_flags_duplicates_and_long_exams() {
        let warnings = lint_session_file(SAMPLE, &PathBuf::from("s.toml")).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("duplicate topic"));

        let long = SAMPLE.replace("question_count = 25", "question_count = 100");
        let warnings = lint_session_file(&long, &PathBuf::from("s.toml")).unwrap();
        assert!(warnings.iter().any(|w| w.message.contains("150-minute")));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        assert!(parse_session_config(&path).is_ok());
        assert!(parse_session_config(&dir.path().join("missing.toml")).is_err());
    }
}
