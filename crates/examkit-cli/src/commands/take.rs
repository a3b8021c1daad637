//! The `examkit take` command.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use examkit_client::mock::{sample_questions, MockGateway, MockQuestionProvider};
use examkit_client::{create_client, load_config_from};
use examkit_core::engine::{ExamEngine, SessionCommand, SessionObserver, SessionOutcome};
use examkit_core::error::{ProviderError, SessionError};
use examkit_core::integrity::{IntegrityEvent, IntegrityEventKind};
use examkit_core::parser;
use examkit_core::report::SessionRecord;
use examkit_core::session::{AnswerState, SessionMachine, SubmitTrigger};
use examkit_core::traits::{ManualEnvironment, QuestionSetProvider, SubmissionGateway};
use examkit_report::{render_text, write_html_report};

use super::print_summary;

const HELP: &str = "\
Commands:
  a <n>     answer the current question with option n (1-based, or a letter)
  c         clear the current answer
  n / p     next / previous question
  g <n>     go to question n
  f         flag or unflag the current question
  status    show the current question again
  s         submit
  q         quit without submitting";

/// Console observer: redraws the current question and reports progress.
struct ConsoleObserver;

impl SessionObserver for ConsoleObserver {
    fn on_state_changed(&self, machine: &SessionMachine) {
        let session = machine.session();
        let progress = machine.progress();
        let question = session.current_question();
        let flag = if session.is_flagged(&question.id) {
            " [flagged]"
        } else {
            ""
        };

        eprintln!(
            "\n[{}/{}] {} | answered {}/{} | flagged {}{}",
            progress.current_index + 1,
            progress.total,
            format_clock(progress.remaining_secs),
            progress.answered,
            progress.total,
            progress.flagged,
            flag
        );
        eprintln!("{}", question.text);

        let selected = match session.answer(&question.id) {
            Some(AnswerState::Selected(i)) => Some(i),
            _ => None,
        };
        for (i, option) in question.options.iter().enumerate() {
            let marker = if selected == Some(i) { '*' } else { ' ' };
            eprintln!(" {marker} {}) {}", option_letter(i), option.text);
        }
    }

    fn on_tick(&self, remaining_secs: u64) {
        if remaining_secs % 60 == 0 || remaining_secs == 30 || remaining_secs <= 10 {
            eprintln!("  {} remaining", format_clock(remaining_secs));
        }
    }

    fn on_time_expired(&self) {
        eprintln!("\nTime is up. Submitting your answers.");
    }

    fn on_integrity_event(&self, event: &IntegrityEvent, visibility_lost: u32) {
        let what = match event.kind {
            IntegrityEventKind::VisibilityLost => "tab switch",
            IntegrityEventKind::FullscreenExited => "fullscreen exit",
        };
        eprintln!("  Warning: {what} recorded ({visibility_lost} tab switches so far)");
    }

    fn on_command_rejected(&self, error: &SessionError) {
        eprintln!("  Rejected: {error}");
    }

    fn on_submitting(&self, trigger: SubmitTrigger) {
        match trigger {
            SubmitTrigger::Manual => eprintln!("\nSubmitting..."),
            SubmitTrigger::Timer => eprintln!("Submitting..."),
        }
    }

    fn on_submission_failed(&self, error: &ProviderError) {
        eprintln!(
            "  Submission failed: {}. Your answers are kept; type `s` to try again.",
            error.user_message()
        );
    }
}

enum Input {
    Command(SessionCommand),
    Help,
}

fn option_letter(index: usize) -> char {
    u8::try_from(index)
        .ok()
        .filter(|i| *i < 26)
        .map(|i| char::from(b'A' + i))
        .unwrap_or('?')
}

fn format_clock(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Parse a 1-based number or a single option letter into a 0-based index.
fn parse_index(arg: &str) -> Option<usize> {
    if let Ok(n) = arg.parse::<usize>() {
        return n.checked_sub(1);
    }
    let mut chars = arg.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => {
            Some((c.to_ascii_uppercase() as u8 - b'A') as usize)
        }
        _ => None,
    }
}

fn parse_line(line: &str) -> Result<Option<Input>, String> {
    let mut parts = line.split_whitespace();
    let Some(word) = parts.next() else {
        return Ok(None);
    };
    let arg = parts.next();

    let command = match (word.to_ascii_lowercase().as_str(), arg) {
        ("a", Some(arg)) => {
            let index = parse_index(arg).ok_or_else(|| format!("not an option: {arg}"))?;
            let option = i32::try_from(index).map_err(|_| format!("not an option: {arg}"))?;
            SessionCommand::AnswerCurrent { option }
        }
        ("c", None) => SessionCommand::AnswerCurrent { option: -1 },
        ("n", None) => SessionCommand::Next,
        ("p", None) => SessionCommand::Previous,
        ("g", Some(arg)) => {
            let n: usize = arg
                .parse()
                .map_err(|_| format!("not a question number: {arg}"))?;
            let index = n
                .checked_sub(1)
                .ok_or_else(|| "questions are numbered from 1".to_string())?;
            SessionCommand::Navigate(index)
        }
        ("f", None) => SessionCommand::ToggleFlagCurrent,
        ("status", None) => SessionCommand::Refresh,
        ("s", None) => SessionCommand::Submit,
        ("q", None) => SessionCommand::Abandon,
        ("help" | "?", _) => return Ok(Some(Input::Help)),
        _ => return Err(format!("unknown command: {} (type `help`)", line.trim())),
    };
    Ok(Some(Input::Command(command)))
}

/// Read commands from stdin on a plain thread so a pending read never holds
/// up shutdown.
fn spawn_input_reader(tx: mpsc::Sender<SessionCommand>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match parse_line(&line) {
                Ok(Some(Input::Command(command))) => {
                    if tx.blocking_send(command).is_err() {
                        break;
                    }
                }
                Ok(Some(Input::Help)) => eprintln!("{HELP}"),
                Ok(None) => {}
                Err(msg) => eprintln!("  {msg}"),
            }
        }
    });
}

pub async fn execute(
    session_path: PathBuf,
    config_path: Option<PathBuf>,
    output: Option<PathBuf>,
    format: String,
    offline: bool,
) -> Result<()> {
    let session_config = parser::parse_session_config(&session_path)?;
    session_config
        .validate()
        .with_context(|| format!("invalid session file: {}", session_path.display()))?;

    let config = load_config_from(config_path.as_deref())?;

    let formats: Vec<&str> = if format == "all" {
        vec!["text", "json", "html"]
    } else {
        format.split(',').map(str::trim).collect()
    };
    for fmt in &formats {
        anyhow::ensure!(
            matches!(*fmt, "text" | "json" | "html"),
            "unknown format: {fmt}"
        );
    }

    let (provider, gateway) = if offline {
        let questions = sample_questions(session_config.requested_question_count as usize);
        let provider: Arc<dyn QuestionSetProvider> =
            Arc::new(MockQuestionProvider::new(questions.clone()));
        let gateway: Arc<dyn SubmissionGateway> = Arc::new(MockGateway::new(&questions));
        (provider, gateway)
    } else {
        let client = Arc::new(create_client(&config)?);
        let provider: Arc<dyn QuestionSetProvider> = client.clone();
        let gateway: Arc<dyn SubmissionGateway> = client;
        (provider, gateway)
    };

    let engine = ExamEngine::new(provider, gateway, config.engine_config());

    eprintln!(
        "Fetching {} questions for {}...",
        session_config.requested_question_count, session_config.stream_id
    );
    let mut live = engine
        .start_session(&session_config)
        .await
        .context("could not start the exam")?;

    let machine = live.machine();
    eprintln!(
        "{} questions, {} to answer them. Type `help` for commands.",
        machine.session().len(),
        format_clock(machine.remaining_secs())
    );

    let (tx, mut rx) = mpsc::channel(32);
    // The reader thread drops its sender at end of input; the session then
    // continues until submitted or the time runs out.
    let keepalive = tx.clone();
    spawn_input_reader(tx);

    let interrupt = keepalive.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = interrupt.send(SessionCommand::Abandon).await;
        }
    });

    let mut environment = ManualEnvironment::new();
    let outcome = engine
        .run(&mut live, &mut rx, &mut environment, &ConsoleObserver)
        .await;
    drop(keepalive);

    let done = match outcome {
        SessionOutcome::Completed(done) => done,
        SessionOutcome::Abandoned { answered, .. } => {
            eprintln!("\nSession abandoned with {answered} answered. Nothing was submitted.");
            return Ok(());
        }
    };

    if done.trigger == SubmitTrigger::Timer {
        eprintln!("Submitted automatically when time ran out.");
    }
    print_summary(&done.analysis);

    let dir = output.clone().unwrap_or_else(|| config.output_dir.clone());
    let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H%M%S");
    let title = format!("{} exam", session_config.stream_id);

    for fmt in &formats {
        match *fmt {
            "text" => {
                let text = render_text(&done.analysis);
                println!("{text}");
                if output.is_some() {
                    std::fs::create_dir_all(&dir)?;
                    let path = dir.join(format!("session-{timestamp}.txt"));
                    std::fs::write(&path, &text)?;
                    eprintln!("Text report: {}", path.display());
                }
            }
            "json" => {
                let path = dir.join(format!("session-{timestamp}.json"));
                SessionRecord::from(done.as_ref()).save_json(&path)?;
                eprintln!("Session saved to: {}", path.display());
            }
            "html" => {
                let path = dir.join(format!("session-{timestamp}.html"));
                write_html_report(&done.analysis, &title, &path)?;
                eprintln!("HTML report: {}", path.display());
            }
            _ => {}
        }
    }

    Ok(())
}
