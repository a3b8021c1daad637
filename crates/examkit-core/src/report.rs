//! Persisted session records.
//!
//! A [`SessionRecord`] is what `examkit take` saves after grading: the
//! payload that was sent and the result that came back.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::CompletedSession;
use crate::model::TestResult;
use crate::session::SubmitTrigger;
use crate::submission::SubmissionPayload;

/// A graded session on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub trigger: SubmitTrigger,
    pub payload: SubmissionPayload,
    pub result: TestResult,
}

impl From<&CompletedSession> for SessionRecord {
    fn from(done: &CompletedSession) -> Self {
        Self {
            session_id: done.session_id,
            created_at: Utc::now(),
            trigger: done.trigger,
            payload: done.payload.clone(),
            result: done.result.clone(),
        }
    }
}

impl SessionRecord {
    /// Save the record as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize session record")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write session record to {}", path.display()))?;
        Ok(())
    }

    /// Load a record from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read session record from {}", path.display()))?;
        serde_json::from_str(&content).context("failed to parse session record JSON")
    }
}

/// Load a graded result from either a saved [`SessionRecord`] or a bare
/// `TestResult` as returned by the grading service.
pub fn load_test_result(path: &Path) -> Result<TestResult> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read result from {}", path.display()))?;

    if let Ok(record) = serde_json::from_str::<SessionRecord>(&content) {
        return Ok(record.result);
    }
    serde_json::from_str::<TestResult>(&content)
        .with_context(|| format!("failed to parse result JSON: {}", path.display()))
}
