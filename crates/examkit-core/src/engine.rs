//! Session driver.
//!
//! [`ExamEngine`] fetches a question set, builds the state machine, and runs
//! the session as a single cooperative loop. Clock ticks, user commands,
//! integrity signals, and the one in-flight submission are multiplexed with
//! `tokio::select!` on one task, so they are naturally serialized; races
//! between a final tick and a manual submit are resolved by the machine's
//! `Submitting` guard.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::clock::ClockTick;
use crate::error::{ProviderError, SessionError, StartError};
use crate::integrity::IntegrityEvent;
use crate::model::{QuestionId, SessionConfig, TestResult};
use crate::session::{SessionMachine, SubmitTrigger};
use crate::statistics::{analyze, ResultAnalysis};
use crate::submission::{submit_attempt, SubmissionPayload};
use crate::traits::{EnvironmentEvents, QuestionSetProvider, SubmissionGateway};

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the session driver.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Deadline for the question fetch.
    pub fetch_timeout: Duration,
    /// Deadline for each submission attempt.
    pub submit_timeout: Duration,
    /// Clock period. One second in production.
    pub tick_period: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
            tick_period: Duration::from_secs(1),
        }
    }
}

/// A user interaction delivered to a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    SelectAnswer { question_id: QuestionId, option: i32 },
    ClearAnswer { question_id: QuestionId },
    /// Answer the question on screen; `-1` clears it.
    AnswerCurrent { option: i32 },
    Navigate(usize),
    Next,
    Previous,
    ToggleFlag { question_id: QuestionId },
    ToggleFlagCurrent,
    /// Ask the observer to redraw without changing anything.
    Refresh,
    Submit,
    Abandon,
}

/// Progress reporting for a running session.
pub trait SessionObserver: Send + Sync {
    /// A command was applied; `machine` reflects the new state.
    fn on_state_changed(&self, machine: &SessionMachine);
    fn on_tick(&self, remaining_secs: u64);
    fn on_time_expired(&self);
    fn on_integrity_event(&self, event: &IntegrityEvent, visibility_lost: u32);
    fn on_command_rejected(&self, error: &SessionError);
    fn on_submitting(&self, trigger: SubmitTrigger);
    fn on_submission_failed(&self, error: &ProviderError);
}

/// No-op observer.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {
    fn on_state_changed(&self, _: &SessionMachine) {}
    fn on_tick(&self, _: u64) {}
    fn on_time_expired(&self) {}
    fn on_integrity_event(&self, _: &IntegrityEvent, _: u32) {}
    fn on_command_rejected(&self, _: &SessionError) {}
    fn on_submitting(&self, _: SubmitTrigger) {}
    fn on_submission_failed(&self, _: &ProviderError) {}
}

/// A session that has been created and is ready to run.
pub struct LiveSession {
    machine: SessionMachine,
    expiry: Option<oneshot::Receiver<()>>,
}

impl LiveSession {
    pub fn machine(&self) -> &SessionMachine {
        &self.machine
    }

    pub fn into_machine(self) -> SessionMachine {
        self.machine
    }
}

/// A graded session.
#[derive(Debug, Clone, Serialize)]
pub struct CompletedSession {
    pub session_id: Uuid,
    pub trigger: SubmitTrigger,
    pub payload: SubmissionPayload,
    pub result: TestResult,
    pub analysis: ResultAnalysis,
}

/// How a session ended.
#[derive(Debug, Clone)]
pub enum SessionOutcome {
    Completed(Box<CompletedSession>),
    Abandoned { session_id: Uuid, answered: usize },
}

/// The single in-flight submission, yielding the payload it sent.
type InFlight = BoxFuture<'static, (SubmissionPayload, Result<TestResult, ProviderError>)>;

/// The exam session driver.
pub struct ExamEngine {
    provider: Arc<dyn QuestionSetProvider>,
    gateway: Arc<dyn SubmissionGateway>,
    config: EngineConfig,
}

impl ExamEngine {
    pub fn new(
        provider: Arc<dyn QuestionSetProvider>,
        gateway: Arc<dyn SubmissionGateway>,
        config: EngineConfig,
    ) -> Self {
        Self {
            provider,
            gateway,
            config,
        }
    }

    /// Validate the configuration, fetch the question set, and create the
    /// session. No session exists if any step fails; the caller may retry.
    #[instrument(skip(self, config), fields(provider = self.provider.name()))]
    pub async fn start_session(&self, config: &SessionConfig) -> Result<LiveSession, StartError> {
        config.validate()?;

        let questions = tokio::time::timeout(self.config.fetch_timeout, self.provider.generate(config))
            .await
            .map_err(|_| ProviderError::Timeout(self.config.fetch_timeout.as_secs()))??;

        if questions.is_empty() {
            return Err(ProviderError::EmptyQuestionSet.into());
        }
        if questions.len() != config.requested_question_count as usize {
            warn!(
                requested = config.requested_question_count,
                received = questions.len(),
                "provider returned a different number of questions than requested"
            );
        }

        let (expiry_tx, expiry_rx) = oneshot::channel();
        let machine = SessionMachine::new(config.clone(), questions, move || {
            let _ = expiry_tx.send(());
        })?;

        Ok(LiveSession {
            machine,
            expiry: Some(expiry_rx),
        })
    }

    /// Run a session until it is graded or abandoned.
    ///
    /// Closing the command channel abandons the session. Forced submission
    /// arrives from the clock and takes the same path as a manual submit.
    pub async fn run(
        &self,
        live: &mut LiveSession,
        commands: &mut mpsc::Receiver<SessionCommand>,
        environment: &mut dyn EnvironmentEvents,
        observer: &dyn SessionObserver,
    ) -> SessionOutcome {
        let machine = &mut live.machine;
        let mut signals = machine.attach_environment(environment);
        let mut signals_open = true;

        let period = self.config.tick_period;
        let mut ticker = interval_at(Instant::now() + period, period);

        let mut in_flight: Option<InFlight> = None;

        observer.on_state_changed(machine);

        loop {
            let mut submit_request = None;

            tokio::select! {
                (payload, result) = async {
                    match in_flight.as_mut() {
                        Some(fut) => fut.await,
                        None => std::future::pending().await,
                    }
                } => {
                    in_flight = None;
                    match result {
                        Ok(result) => {
                            if machine.complete_submission() {
                                let analysis = analyze(&result);
                                return SessionOutcome::Completed(Box::new(CompletedSession {
                                    session_id: machine.session().id(),
                                    trigger: machine.trigger().unwrap_or(SubmitTrigger::Manual),
                                    payload,
                                    result,
                                    analysis,
                                }));
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "submission attempt failed");
                            if machine.fail_submission(&e) {
                                observer.on_submission_failed(&e);
                                observer.on_state_changed(machine);
                            }
                        }
                    }
                }

                _ = ticker.tick(), if machine.clock().is_running() => {
                    match machine.tick() {
                        ClockTick::Running { remaining } => observer.on_tick(remaining),
                        ClockTick::Expired => observer.on_time_expired(),
                        ClockTick::Idle => {}
                    }
                }

                fired = async {
                    match live.expiry.as_mut() {
                        Some(rx) => rx.await,
                        None => std::future::pending().await,
                    }
                } => {
                    live.expiry = None;
                    if fired.is_ok() {
                        submit_request = Some(SubmitTrigger::Timer);
                    }
                }

                signal = signals.recv(), if signals_open => {
                    match signal {
                        Some(signal) => {
                            if let Some(event) = machine.record_integrity_event(signal.kind, &signal.detail) {
                                let event = event.clone();
                                observer.on_integrity_event(&event, machine.monitor().visibility_lost_count());
                            }
                        }
                        None => signals_open = false,
                    }
                }

                command = commands.recv() => {
                    match command {
                        None => {
                            info!("command channel closed, abandoning session");
                            return abandon(machine, in_flight.take());
                        }
                        Some(SessionCommand::Abandon) => {
                            return abandon(machine, in_flight.take());
                        }
                        Some(SessionCommand::Submit) => submit_request = Some(SubmitTrigger::Manual),
                        Some(command) => {
                            if let Err(e) = apply_command(machine, command) {
                                debug!(error = %e, "command rejected");
                                observer.on_command_rejected(&e);
                            }
                            observer.on_state_changed(machine);
                        }
                    }
                }
            }

            if let Some(trigger) = submit_request {
                match machine.begin_submission(trigger) {
                    Ok(payload) => {
                        observer.on_submitting(trigger);
                        let gateway = Arc::clone(&self.gateway);
                        let timeout = self.config.submit_timeout;
                        in_flight = Some(Box::pin(async move {
                            let result = submit_attempt(gateway.as_ref(), &payload, timeout).await;
                            (payload, result)
                        }));
                    }
                    Err(SessionError::DuplicateSubmission) if trigger == SubmitTrigger::Timer => {
                        info!("timer expired during an in-flight submission, not resubmitting");
                    }
                    Err(e) => {
                        warn!(error = %e, %trigger, "submission request rejected");
                        observer.on_command_rejected(&e);
                    }
                }
            }
        }
    }
}

fn apply_command(machine: &mut SessionMachine, command: SessionCommand) -> Result<(), SessionError> {
    match command {
        SessionCommand::SelectAnswer {
            question_id,
            option,
        } => machine.select_answer(&question_id, option),
        SessionCommand::ClearAnswer { question_id } => machine.clear_answer(&question_id),
        SessionCommand::AnswerCurrent { option } => machine.answer_current(option),
        SessionCommand::Navigate(index) => {
            machine.navigate_to(index);
            Ok(())
        }
        SessionCommand::Next => {
            machine.next();
            Ok(())
        }
        SessionCommand::Previous => {
            machine.previous();
            Ok(())
        }
        SessionCommand::ToggleFlag { question_id } => machine.toggle_flag(&question_id).map(|_| ()),
        SessionCommand::ToggleFlagCurrent => machine.toggle_flag_current().map(|_| ()),
        SessionCommand::Refresh => Ok(()),
        // Handled by the driver loop.
        SessionCommand::Submit | SessionCommand::Abandon => Ok(()),
    }
}

fn abandon(machine: &mut SessionMachine, in_flight: Option<InFlight>) -> SessionOutcome {
    if in_flight.is_some() {
        // Dropping the future discards whatever the backend answers.
        warn!("abandoning with a submission in flight, its response will be ignored");
    }
    drop(in_flight);
    machine.abandon();
    SessionOutcome::Abandoned {
        session_id: machine.session().id(),
        answered: machine.progress().answered,
    }
}
