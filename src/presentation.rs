//! Presentation Sink
//!
//! Outward-facing notifications from the session engine. Screens, camera
//! and navigation live outside this crate; the engine only tells them what
//! happened and never waits for an answer.

use std::sync::{Arc, Mutex};

use tracing::info;

/// Receiver for high-level session notifications.
///
/// Implementations must be cheap and non-blocking; the engine calls these
/// from its dispatch loop.
pub trait PresentationSink: Send {
    /// The title screen should go away; play is starting.
    fn hide_title(&mut self);

    /// The local player won the session.
    fn show_victory(&mut self);

    /// The local player lost the session.
    fn show_defeat(&mut self);

    /// Players were enabled (session start) or disabled (session end).
    fn set_all_players_enabled(&mut self, enabled: bool);

    /// The post-game delay elapsed; navigate away from the session.
    fn leave_session(&mut self);
}

/// Sink that just logs every notification. Used by the demo binary and any
/// headless embedding.
#[derive(Debug, Default)]
pub struct TracingSink;

impl PresentationSink for TracingSink {
    fn hide_title(&mut self) {
        info!("title screen hidden");
    }

    fn show_victory(&mut self) {
        info!("VICTORY");
    }

    fn show_defeat(&mut self) {
        info!("DEFEATED");
    }

    fn set_all_players_enabled(&mut self, enabled: bool) {
        info!(enabled, "player controls toggled");
    }

    fn leave_session(&mut self) {
        info!("leaving session");
    }
}

/// One recorded sink notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    /// `hide_title` was invoked.
    HideTitle,
    /// `show_victory` was invoked.
    ShowVictory,
    /// `show_defeat` was invoked.
    ShowDefeat,
    /// `set_all_players_enabled` was invoked with the given flag.
    SetAllPlayersEnabled(bool),
    /// `leave_session` was invoked.
    LeaveSession,
}

/// Sink that records every notification for later inspection. Backs the
/// engine tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    calls: Arc<Mutex<Vec<SinkCall>>>,
}

impl RecordingSink {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().expect("sink lock poisoned").clone()
    }

    /// How many times the given call was recorded.
    pub fn count(&self, call: &SinkCall) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    fn record(&self, call: SinkCall) {
        self.calls.lock().expect("sink lock poisoned").push(call);
    }
}

impl PresentationSink for RecordingSink {
    fn hide_title(&mut self) {
        self.record(SinkCall::HideTitle);
    }

    fn show_victory(&mut self) {
        self.record(SinkCall::ShowVictory);
    }

    fn show_defeat(&mut self) {
        self.record(SinkCall::ShowDefeat);
    }

    fn set_all_players_enabled(&mut self, enabled: bool) {
        self.record(SinkCall::SetAllPlayersEnabled(enabled));
    }

    fn leave_session(&mut self) {
        self.record(SinkCall::LeaveSession);
    }
}
