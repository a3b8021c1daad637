//! CLI integration tests using assert_cmd.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn examkit() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("examkit").unwrap()
}

/// A command isolated from the user's config files and environment.
fn examkit_in(dir: &Path) -> Command {
    let mut cmd = examkit();
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env_remove("EXAMKIT_SERVER_URL")
        .env_remove("RUST_LOG");
    cmd
}

fn write_session(dir: &Path, question_count: u32) -> std::path::PathBuf {
    let path = dir.join("session.toml");
    std::fs::write(
        &path,
        format!(
            r#"[session]
stream_id = "engineering"
subject_ids = ["physics"]
topic_ids = ["optics", "waves"]
difficulty = "medium"
question_count = {question_count}
"#
        ),
    )
    .unwrap();
    path
}

const RESULT_JSON: &str = r#"{
    "summary": {
        "totalQuestions": 4,
        "correctAnswers": 3,
        "wrongAnswers": 0,
        "skippedQuestions": 1,
        "percentage": 75.0,
        "score": 3,
        "timeTakenMinutes": 5.0
    },
    "perQuestion": [
        {"questionId": "q1", "selectedOptionIndex": 0, "correctOptionIndex": 0, "isCorrect": true, "difficulty": "Easy"},
        {"questionId": "q2", "selectedOptionIndex": 2, "correctOptionIndex": 2, "isCorrect": true, "difficulty": "Medium"},
        {"questionId": "q3", "selectedOptionIndex": 1, "correctOptionIndex": 1, "isCorrect": true, "difficulty": "Hard"},
        {"questionId": "q4", "selectedOptionIndex": -1, "correctOptionIndex": 3, "isCorrect": false, "difficulty": "Hard",
         "explanation": "Snell's law."}
    ]
}"#;

#[test]
fn validate_valid_session() {
    let dir = TempDir::new().unwrap();
    let path = write_session(dir.path(), 10);

    examkit()
        .arg("validate")
        .arg("--session")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("10 questions, 15 minutes"))
        .stdout(predicate::str::contains("Session file valid."));
}

#[test]
fn validate_rejects_zero_questions() {
    let dir = TempDir::new().unwrap();
    let path = write_session(dir.path(), 0);

    examkit()
        .arg("validate")
        .arg("--session")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn validate_nonexistent_file() {
    examkit()
        .arg("validate")
        .arg("--session")
        .arg("nonexistent.toml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    examkit_in(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created examkit.toml"))
        .stdout(predicate::str::contains("Created sessions/example.toml"));

    assert!(dir.path().join("examkit.toml").exists());
    assert!(dir.path().join("sessions/example.toml").exists());

    examkit_in(dir.path())
        .arg("validate")
        .arg("--session")
        .arg("sessions/example.toml")
        .assert()
        .success()
        .stdout(predicate::str::contains("Session file valid."));
}

#[test]
fn init_skips_existing() {
    let dir = TempDir::new().unwrap();

    examkit_in(dir.path()).arg("init").assert().success();

    examkit_in(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn score_text() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("result.json");
    std::fs::write(&path, RESULT_JSON).unwrap();

    examkit()
        .arg("score")
        .arg("--result")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Grade B+"))
        .stdout(predicate::str::contains("Snell's law."));
}

#[test]
fn score_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("result.json");
    std::fs::write(&path, RESULT_JSON).unwrap();

    let output = examkit()
        .arg("score")
        .arg("--result")
        .arg(&path)
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let analysis: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(analysis["grade"], "B+");
    assert_eq!(analysis["attempted_questions"], 3);
    assert_eq!(analysis["attempt_accuracy"], 100.0);
    assert_eq!(analysis["by_difficulty"]["hard"]["total"], 2);
}

#[test]
fn score_html_to_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("result.json");
    std::fs::write(&path, RESULT_JSON).unwrap();
    let out = dir.path().join("reports/result.html");

    examkit()
        .arg("score")
        .arg("--result")
        .arg(&path)
        .arg("--format")
        .arg("html")
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stderr(predicate::str::contains("Report written to"));

    let html = std::fs::read_to_string(&out).unwrap();
    assert!(html.contains("<html"));
    assert!(html.contains("Snell&#x27;s law."));
}

#[test]
fn score_unknown_format() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("result.json");
    std::fs::write(&path, RESULT_JSON).unwrap();

    examkit()
        .arg("score")
        .arg("--result")
        .arg(&path)
        .arg("--format")
        .arg("sarif")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown format"));
}

#[test]
fn take_offline_and_save() {
    let dir = TempDir::new().unwrap();
    let session = write_session(dir.path(), 3);
    let out = dir.path().join("out");

    examkit_in(dir.path())
        .arg("take")
        .arg("--session")
        .arg(&session)
        .arg("--offline")
        .arg("--format")
        .arg("json")
        .arg("--output")
        .arg(&out)
        .write_stdin("a 1\nn\na B\nf\nn\nbogus\ns\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("Submitting"))
        .stderr(predicate::str::contains("unknown command: bogus"));

    let saved: Vec<_> = std::fs::read_dir(&out)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().is_some_and(|e| e == "json"))
        .collect();
    assert_eq!(saved.len(), 1);

    let record: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&saved[0]).unwrap()).unwrap();
    let answers = record["payload"]["answers"].as_array().unwrap();
    assert_eq!(answers.len(), 3);
    assert_eq!(answers[0]["selectedOption"], 0);
    assert_eq!(answers[1]["selectedOption"], 1);
    assert_eq!(answers[2]["selectedOption"], -1);
    assert_eq!(record["payload"]["streamId"], "engineering");
    assert_eq!(record["trigger"], "manual");
    assert_eq!(record["result"]["summary"]["correctAnswers"], 1);
    assert_eq!(record["result"]["summary"]["skippedQuestions"], 1);
}

#[test]
fn take_offline_quit_submits_nothing() {
    let dir = TempDir::new().unwrap();
    let session = write_session(dir.path(), 3);
    let out = dir.path().join("out");

    examkit_in(dir.path())
        .arg("take")
        .arg("--session")
        .arg(&session)
        .arg("--offline")
        .arg("--format")
        .arg("json")
        .arg("--output")
        .arg(&out)
        .write_stdin("a 2\nq\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("abandoned with 1 answered"));

    assert!(!out.exists());
}

#[test]
fn take_rejects_unknown_format() {
    let dir = TempDir::new().unwrap();
    let session = write_session(dir.path(), 3);

    examkit_in(dir.path())
        .arg("take")
        .arg("--session")
        .arg(&session)
        .arg("--offline")
        .arg("--format")
        .arg("pdf")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown format: pdf"));
}

#[test]
fn help_output() {
    examkit()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Timed exam session engine"));
}

#[test]
fn version_output() {
    examkit()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("examkit"));
}
