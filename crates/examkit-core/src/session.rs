//! The exam session state machine.
//!
//! [`SessionMachine`] is the only owner of in-progress exam state. It holds
//! the [`ExamSession`] data together with the session clock and the integrity
//! monitor, and every mutation goes through its operations. The clock and
//! monitor are acquired when the machine is built and released on every exit
//! path: completion, abandonment, or drop.
//!
//! Status transitions:
//!
//! ```text
//! Active ──submit──▶ Submitting ──ok──▶ Completed
//!   ▲                   │
//!   └──────failure──────┘
//! Active | Submitting ──abandon──▶ Abandoned
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::{exam_duration_secs, ClockTick, SessionClock};
use crate::error::{ProviderError, SessionError};
use crate::integrity::{IntegrityEvent, IntegrityEventKind, IntegrityMonitor, IntegritySignal};
use crate::model::{Question, QuestionId, SessionConfig};
use crate::submission::{build_payload, SubmissionPayload};
use crate::traits::EnvironmentEvents;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Submitting,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Abandoned)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Active => write!(f, "active"),
            SessionStatus::Submitting => write!(f, "submitting"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// A recorded answer. A question with no entry was never answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerState {
    Selected(usize),
    /// The user picked an option and then cleared it.
    Cleared,
}

/// Sentinel used on the wire for an unanswered or cleared question.
pub const UNANSWERED: i32 = -1;

impl AnswerState {
    /// Wire value: the option index, or [`UNANSWERED`].
    pub fn wire_value(self) -> i32 {
        match self {
            AnswerState::Selected(index) => index as i32,
            AnswerState::Cleared => UNANSWERED,
        }
    }

    pub fn selected(self) -> Option<usize> {
        match self {
            AnswerState::Selected(index) => Some(index),
            AnswerState::Cleared => None,
        }
    }
}

/// Grid colouring for a question. Precedence: answered > flagged > current >
/// unanswered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionStatus {
    Answered,
    Flagged,
    Current,
    Unanswered,
}

/// What initiated a submission. Recorded for analytics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitTrigger {
    Manual,
    Timer,
}

impl fmt::Display for SubmitTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitTrigger::Manual => write!(f, "manual"),
            SubmitTrigger::Timer => write!(f, "timer"),
        }
    }
}

/// The data of one exam attempt.
#[derive(Debug, Clone)]
pub struct ExamSession {
    id: Uuid,
    questions: Vec<Question>,
    current_index: usize,
    answers: HashMap<QuestionId, AnswerState>,
    flagged: HashSet<QuestionId>,
    time_spent: HashMap<QuestionId, Duration>,
    start_time: DateTime<Utc>,
    integrity_log: Vec<IntegrityEvent>,
    status: SessionStatus,
}

impl ExamSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_question(&self) -> &Question {
        &self.questions[self.current_index]
    }

    pub fn answer(&self, id: &QuestionId) -> Option<AnswerState> {
        self.answers.get(id).copied()
    }

    pub fn is_answered(&self, id: &QuestionId) -> bool {
        matches!(self.answers.get(id), Some(AnswerState::Selected(_)))
    }

    pub fn is_flagged(&self, id: &QuestionId) -> bool {
        self.flagged.contains(id)
    }

    pub fn flagged(&self) -> &HashSet<QuestionId> {
        &self.flagged
    }

    pub fn time_spent(&self, id: &QuestionId) -> Duration {
        self.time_spent.get(id).copied().unwrap_or_default()
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn integrity_log(&self) -> &[IntegrityEvent] {
        &self.integrity_log
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Grid status of the question at `index`, or `None` if out of range.
    pub fn question_status(&self, index: usize) -> Option<QuestionStatus> {
        let question = self.questions.get(index)?;
        let status = if self.is_answered(&question.id) {
            QuestionStatus::Answered
        } else if self.is_flagged(&question.id) {
            QuestionStatus::Flagged
        } else if index == self.current_index {
            QuestionStatus::Current
        } else {
            QuestionStatus::Unanswered
        };
        Some(status)
    }
}

/// Counters for a status bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub cleared: usize,
    pub flagged: usize,
    pub unanswered: usize,
    pub current_index: usize,
    pub remaining_secs: u64,
    pub visibility_lost: u32,
    pub status: SessionStatus,
}

/// Sole authority over an [`ExamSession`].
pub struct SessionMachine {
    config: SessionConfig,
    session: ExamSession,
    positions: HashMap<QuestionId, usize>,
    clock: SessionClock,
    monitor: IntegrityMonitor,
    viewing_since: Instant,
    trigger: Option<SubmitTrigger>,
}

impl SessionMachine {
    /// Create the session for a fetched question set and start its clock and
    /// integrity monitor. `on_expired` fires once when the countdown hits
    /// zero.
    pub fn new(
        config: SessionConfig,
        questions: Vec<Question>,
        on_expired: impl FnOnce() + Send + 'static,
    ) -> Result<Self, ProviderError> {
        if questions.is_empty() {
            return Err(ProviderError::EmptyQuestionSet);
        }

        let mut positions = HashMap::with_capacity(questions.len());
        for (index, question) in questions.iter().enumerate() {
            if positions.insert(question.id.clone(), index).is_some() {
                return Err(ProviderError::InvalidQuestionSet(format!(
                    "duplicate question id {}",
                    question.id
                )));
            }
        }

        let session = ExamSession {
            id: Uuid::new_v4(),
            questions,
            current_index: 0,
            answers: HashMap::new(),
            flagged: HashSet::new(),
            time_spent: HashMap::new(),
            start_time: Utc::now(),
            integrity_log: Vec::new(),
            status: SessionStatus::Active,
        };

        let mut clock = SessionClock::new(on_expired);
        clock.start(exam_duration_secs(session.len()));
        let monitor = IntegrityMonitor::new();
        monitor.start();

        info!(
            session_id = %session.id,
            questions = session.len(),
            remaining_secs = clock.remaining(),
            "exam session started"
        );

        Ok(Self {
            config,
            session,
            positions,
            clock,
            monitor,
            viewing_since: Instant::now(),
            trigger: None,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn session(&self) -> &ExamSession {
        &self.session
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status
    }

    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }

    pub fn monitor(&self) -> &IntegrityMonitor {
        &self.monitor
    }

    pub fn remaining_secs(&self) -> u64 {
        self.clock.remaining()
    }

    /// Trigger of the current or last submission attempt.
    pub fn trigger(&self) -> Option<SubmitTrigger> {
        self.trigger
    }

    pub fn question_status(&self, index: usize) -> Option<QuestionStatus> {
        self.session.question_status(index)
    }

    pub fn progress(&self) -> SessionProgress {
        let answered = self
            .session
            .answers
            .values()
            .filter(|a| matches!(a, AnswerState::Selected(_)))
            .count();
        let cleared = self.session.answers.len() - answered;
        SessionProgress {
            total: self.session.len(),
            answered,
            cleared,
            flagged: self.session.flagged.len(),
            unanswered: self.session.len() - answered,
            current_index: self.session.current_index,
            remaining_secs: self.clock.remaining(),
            visibility_lost: self.monitor.visibility_lost_count(),
            status: self.session.status,
        }
    }

    /// Subscribe the integrity monitor to an environment.
    pub fn attach_environment(
        &self,
        environment: &mut dyn EnvironmentEvents,
    ) -> mpsc::UnboundedReceiver<IntegritySignal> {
        self.monitor.attach(environment)
    }

    /// Answers and flags change only while active with time left.
    fn ensure_active(&self) -> Result<(), SessionError> {
        match self.session.status {
            SessionStatus::Active if self.clock.has_expired() => Err(SessionError::TimeExpired),
            SessionStatus::Active => Ok(()),
            status => Err(SessionError::NotActive { status }),
        }
    }

    fn position(&self, id: &QuestionId) -> Result<usize, SessionError> {
        self.positions
            .get(id)
            .copied()
            .ok_or_else(|| SessionError::UnknownQuestion(id.clone()))
    }

    /// Record an answer. `option == -1` clears the question.
    pub fn select_answer(&mut self, id: &QuestionId, option: i32) -> Result<(), SessionError> {
        self.ensure_active()?;
        let index = self.position(id)?;
        let option_count = self.session.questions[index].option_count();

        let answer = if option == UNANSWERED {
            AnswerState::Cleared
        } else if option < 0 || option as usize >= option_count {
            return Err(SessionError::OptionOutOfRange {
                question_id: id.clone(),
                option,
                option_count,
            });
        } else {
            AnswerState::Selected(option as usize)
        };

        debug!(question = %id, ?answer, "answer recorded");
        self.session.answers.insert(id.clone(), answer);
        Ok(())
    }

    pub fn clear_answer(&mut self, id: &QuestionId) -> Result<(), SessionError> {
        self.select_answer(id, UNANSWERED)
    }

    /// Answer the question currently on screen.
    pub fn answer_current(&mut self, option: i32) -> Result<(), SessionError> {
        let id = self.session.current_question().id.clone();
        self.select_answer(&id, option)
    }

    /// Move to `index`. Out-of-range targets are ignored.
    ///
    /// Returns `true` if the current question changed.
    pub fn navigate_to(&mut self, index: usize) -> bool {
        if self.session.status != SessionStatus::Active {
            debug!(index, status = %self.session.status, "navigation ignored");
            return false;
        }
        if self.clock.has_expired() {
            debug!(index, "navigation ignored, time is up");
            return false;
        }
        if index >= self.session.len() {
            debug!(index, len = self.session.len(), "out-of-range navigation ignored");
            return false;
        }
        if index == self.session.current_index {
            return false;
        }
        self.flush_viewing_time();
        self.session.current_index = index;
        true
    }

    pub fn next(&mut self) -> bool {
        self.navigate_to(self.session.current_index + 1)
    }

    pub fn previous(&mut self) -> bool {
        match self.session.current_index.checked_sub(1) {
            Some(index) => self.navigate_to(index),
            None => false,
        }
    }

    /// Flip the flag on a question. Returns the new flag state.
    pub fn toggle_flag(&mut self, id: &QuestionId) -> Result<bool, SessionError> {
        self.ensure_active()?;
        self.position(id)?;
        let flagged = if self.session.flagged.remove(id) {
            false
        } else {
            self.session.flagged.insert(id.clone());
            true
        };
        debug!(question = %id, flagged, "flag toggled");
        Ok(flagged)
    }

    pub fn toggle_flag_current(&mut self) -> Result<bool, SessionError> {
        let id = self.session.current_question().id.clone();
        self.toggle_flag(&id)
    }

    /// Add viewing time to a question.
    pub fn accumulate_time(&mut self, id: &QuestionId, delta: Duration) -> Result<(), SessionError> {
        self.ensure_active()?;
        self.position(id)?;
        self.add_time(id, delta);
        Ok(())
    }

    fn add_time(&mut self, id: &QuestionId, delta: Duration) {
        *self.session.time_spent.entry(id.clone()).or_default() += delta;
    }

    /// Charge the time since the current question came on screen to it.
    fn flush_viewing_time(&mut self) {
        let now = Instant::now();
        let delta = now.saturating_duration_since(self.viewing_since);
        self.viewing_since = now;
        let id = self.session.current_question().id.clone();
        self.add_time(&id, delta);
    }

    /// Advance the clock by one second while the session is live.
    pub fn tick(&mut self) -> ClockTick {
        if self.session.status.is_terminal() {
            return ClockTick::Idle;
        }
        self.clock.tick()
    }

    /// Stamp and log an environment signal. Only active sessions record.
    pub fn record_integrity_event(
        &mut self,
        kind: IntegrityEventKind,
        detail: &str,
    ) -> Option<&IntegrityEvent> {
        if self.session.status != SessionStatus::Active {
            debug!(?kind, status = %self.session.status, "integrity signal outside active state");
            return None;
        }
        let event = self
            .monitor
            .record_event(kind, detail, self.session.current_index)?;
        self.session.integrity_log.push(event);
        self.session.integrity_log.last()
    }

    /// Move to `Submitting` and package the answers.
    ///
    /// A call while a submission is already in flight is rejected with
    /// [`SessionError::DuplicateSubmission`].
    pub fn begin_submission(
        &mut self,
        trigger: SubmitTrigger,
    ) -> Result<SubmissionPayload, SessionError> {
        match self.session.status {
            SessionStatus::Active => {}
            SessionStatus::Submitting => return Err(SessionError::DuplicateSubmission),
            status => return Err(SessionError::NotActive { status }),
        }

        self.flush_viewing_time();
        self.session.status = SessionStatus::Submitting;
        self.trigger = Some(trigger);
        let payload = build_payload(
            &self.session,
            &self.config,
            self.monitor.visibility_lost_count(),
            Utc::now(),
        );
        info!(
            session_id = %self.session.id,
            %trigger,
            answers = payload.answers.len(),
            "submitting exam"
        );
        Ok(payload)
    }

    /// The grading service accepted the submission.
    ///
    /// Returns `false` if the session was no longer waiting on one, in which
    /// case the response must be ignored.
    pub fn complete_submission(&mut self) -> bool {
        if self.session.status != SessionStatus::Submitting {
            warn!(status = %self.session.status, "ignoring submission response");
            return false;
        }
        self.session.status = SessionStatus::Completed;
        self.release();
        info!(session_id = %self.session.id, "exam session completed");
        true
    }

    /// The submission attempt failed; return to `Active` with all answers
    /// intact so the user can retry.
    ///
    /// If the clock ran out meanwhile, the answers stay frozen and only
    /// another submit or an abandon is accepted.
    pub fn fail_submission(&mut self, error: &ProviderError) -> bool {
        if self.session.status != SessionStatus::Submitting {
            warn!(status = %self.session.status, %error, "ignoring late submission failure");
            return false;
        }
        self.session.status = SessionStatus::Active;
        self.viewing_since = Instant::now();
        warn!(session_id = %self.session.id, %error, "submission failed, session still answerable");
        true
    }

    /// Leave without submitting. Terminal.
    pub fn abandon(&mut self) -> bool {
        if self.session.status.is_terminal() {
            return false;
        }
        self.session.status = SessionStatus::Abandoned;
        self.release();
        info!(session_id = %self.session.id, "exam session abandoned");
        true
    }

    fn release(&mut self) {
        self.clock.stop();
        self.monitor.stop();
    }
}

impl Drop for SessionMachine {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for SessionMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionMachine")
            .field("session_id", &self.session.id)
            .field("status", &self.session.status)
            .field("current_index", &self.session.current_index)
            .field("clock", &self.clock)
            .finish()
    }
}
