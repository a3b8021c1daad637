//! Integrity monitoring: visibility loss and fullscreen exits.
//!
//! The monitor registers handlers on an [`EnvironmentEvents`] source and
//! forwards every signal into a channel. The session driver drains that
//! channel and asks the state machine to record each signal, so the monitor
//! never touches session state itself. Recording never fails and never
//! blocks navigation or submission.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::traits::EnvironmentEvents;

/// Category of integrity signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntegrityEventKind {
    /// The viewing surface was hidden or backgrounded.
    #[serde(rename = "tab_switch")]
    VisibilityLost,
    /// The surface left fullscreen.
    #[serde(rename = "fullscreen_exit")]
    FullscreenExited,
}

/// A raw signal from the environment, before it is stamped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegritySignal {
    pub kind: IntegrityEventKind,
    pub detail: String,
}

/// One recorded violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityEvent {
    #[serde(rename = "type")]
    pub kind: IntegrityEventKind,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
    /// Question on screen when the signal fired.
    pub question_index: usize,
}

/// Gatekeeper for environment signals during an active session.
#[derive(Debug, Default)]
pub struct IntegrityMonitor {
    active: Arc<AtomicBool>,
    visibility_lost: u32,
    fullscreen_exited: u32,
}

impl IntegrityMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to an environment. Signals arrive on the returned channel
    /// only while the monitor is active. Dropping the receiver unsubscribes
    /// the handlers the next time the environment fires.
    pub fn attach(&self, environment: &mut dyn EnvironmentEvents) -> mpsc::UnboundedReceiver<IntegritySignal> {
        let (tx, rx) = mpsc::unbounded_channel();

        let active = Arc::clone(&self.active);
        let sender = tx.clone();
        environment.on_visibility_lost(Box::new(move |detail| {
            forward(&active, &sender, IntegrityEventKind::VisibilityLost, detail)
        }));

        let active = Arc::clone(&self.active);
        environment.on_fullscreen_exited(Box::new(move |detail| {
            forward(&active, &tx, IntegrityEventKind::FullscreenExited, detail)
        }));

        rx
    }

    pub fn start(&self) {
        self.active.store(true, Ordering::SeqCst);
        debug!("integrity monitor started");
    }

    /// Stop accepting signals. Idempotent.
    pub fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            debug!("integrity monitor stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Stamp a signal with the current time and question index.
    ///
    /// Returns `None` once the monitor has stopped.
    pub fn record_event(
        &mut self,
        kind: IntegrityEventKind,
        detail: &str,
        question_index: usize,
    ) -> Option<IntegrityEvent> {
        if !self.is_active() {
            debug!(?kind, "integrity monitor inactive, dropping signal");
            return None;
        }
        match kind {
            IntegrityEventKind::VisibilityLost => self.visibility_lost += 1,
            IntegrityEventKind::FullscreenExited => self.fullscreen_exited += 1,
        }
        warn!(?kind, detail, question_index, "integrity event recorded");
        Some(IntegrityEvent {
            kind,
            detail: detail.to_string(),
            timestamp: Utc::now(),
            question_index,
        })
    }

    /// Running count of visibility-loss events, for warning display only.
    pub fn visibility_lost_count(&self) -> u32 {
        self.visibility_lost
    }

    pub fn fullscreen_exit_count(&self) -> u32 {
        self.fullscreen_exited
    }
}

fn forward(
    active: &AtomicBool,
    sender: &mpsc::UnboundedSender<IntegritySignal>,
    kind: IntegrityEventKind,
    detail: &str,
) -> bool {
    if sender.is_closed() {
        debug!(?kind, "session gone, unsubscribing integrity handler");
        return false;
    }
    if !active.load(Ordering::SeqCst) {
        return true;
    }
    sender
        .send(IntegritySignal {
            kind,
            detail: detail.to_string(),
        })
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ManualEnvironment;

    #[test]
    fn forwards_only_while_active() {
        let env = ManualEnvironment::new();
        let monitor = IntegrityMonitor::new();
        let mut rx = monitor.attach(&mut env.clone());

        env.emit_visibility_lost("before start");
        assert!(rx.try_recv().is_err());

        monitor.start();
        env.emit_visibility_lost("hidden");
        env.emit_fullscreen_exited("esc");
        assert_eq!(
            rx.try_recv().unwrap(),
            IntegritySignal {
                kind: IntegrityEventKind::VisibilityLost,
                detail: "hidden".into()
            }
        );
        assert_eq!(
            rx.try_recv().unwrap().kind,
            IntegrityEventKind::FullscreenExited
        );

        monitor.stop();
        monitor.stop();
        env.emit_visibility_lost("after stop");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_receiver_unsubscribes_handlers() {
        let env = ManualEnvironment::new();
        let first = IntegrityMonitor::new();
        let rx = first.attach(&mut env.clone());
        assert_eq!(env.handler_count(), 2);

        let second = IntegrityMonitor::new();
        second.start();
        let mut live = second.attach(&mut env.clone());
        assert_eq!(env.handler_count(), 4);

        drop(rx);
        env.emit_visibility_lost("hidden");
        env.emit_fullscreen_exited("esc");
        assert_eq!(env.handler_count(), 2);
        assert_eq!(live.try_recv().unwrap().detail, "hidden");
        assert_eq!(live.try_recv().unwrap().detail, "esc");
    }

    #[test]
    fn record_event_counts_visibility_losses() {
        let mut monitor = IntegrityMonitor::new();
        monitor.start();

        let event = monitor
            .record_event(IntegrityEventKind::VisibilityLost, "blur", 3)
            .unwrap();
        assert_eq!(event.question_index, 3);
        monitor.record_event(IntegrityEventKind::FullscreenExited, "esc", 3);
        monitor.record_event(IntegrityEventKind::VisibilityLost, "blur", 4);

        assert_eq!(monitor.visibility_lost_count(), 2);
        assert_eq!(monitor.fullscreen_exit_count(), 1);

        monitor.stop();
        assert!(monitor
            .record_event(IntegrityEventKind::VisibilityLost, "late", 4)
            .is_none());
        assert_eq!(monitor.visibility_lost_count(), 2);
    }

    #[test]
    fn event_wire_shape() {
        let event = IntegrityEvent {
            kind: IntegrityEventKind::FullscreenExited,
            detail: "Exited fullscreen mode".into(),
            timestamp: "2025-03-01T10:00:00Z".parse().unwrap(),
            question_index: 2,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "fullscreen_exit");
        assert_eq!(json["questionIndex"], 2);
        assert_eq!(json["timestamp"], "2025-03-01T10:00:00Z");
    }
}
