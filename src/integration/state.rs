//! Conversation state shared with the rendering surface
//!
//! The orchestrator is the only writer. Renderers read a
//! [`ConversationView`] through [`SharedConversationView`] and repaint when
//! an [`OrchestratorEvent`] arrives.

use crate::llm::sanitizer::{segments, Segment};
use crate::messages::{Role, Turn};
use crate::speech::CaptureState;
use crate::Capability;
use parking_lot::RwLock;
use std::sync::Arc;

/// Orchestrator state machine
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConversationState {
    /// Ready for voice or typed input
    #[default]
    Idle,
    /// Capture started, no result yet
    Capturing,
    /// At least one result received, waiting for the user to finish
    AwaitingSilence,
    /// A request is in flight
    Dispatching,
    /// The reply is being spoken
    Speaking,
}

impl ConversationState {
    pub fn is_idle(&self) -> bool {
        matches!(self, ConversationState::Idle)
    }

    /// Capture is running or finishing
    pub fn is_capturing(&self) -> bool {
        matches!(
            self,
            ConversationState::Capturing | ConversationState::AwaitingSilence
        )
    }

    pub fn is_dispatching(&self) -> bool {
        matches!(self, ConversationState::Dispatching)
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversationState::Idle => write!(f, "Idle"),
            ConversationState::Capturing => write!(f, "Capturing"),
            ConversationState::AwaitingSilence => write!(f, "AwaitingSilence"),
            ConversationState::Dispatching => write!(f, "Dispatching"),
            ConversationState::Speaking => write!(f, "Speaking"),
        }
    }
}

/// User-visible condition worth surfacing next to the conversation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    /// Capture ended without any speech
    NothingHeard,
    /// The recognizer reported an error
    CaptureFailed(String),
    /// A platform capability is missing; reported once
    CapabilityUnavailable(Capability),
    /// The model could not answer; the fallback reply was recorded
    DispatchFailed(String),
    /// The reply could not be spoken
    PlaybackFailed(String),
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::NothingHeard => write!(f, "I didn't hear anything."),
            Notice::CaptureFailed(code) => write!(f, "Speech recognition error: {}", code),
            Notice::CapabilityUnavailable(capability) => {
                write!(f, "Your platform does not support {}.", capability)
            }
            Notice::DispatchFailed(reason) => write!(f, "The assistant could not answer: {}", reason),
            Notice::PlaybackFailed(reason) => write!(f, "Could not speak the reply: {}", reason),
        }
    }
}

/// Everything a renderer needs to draw the conversation
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConversationView {
    pub history: Vec<Turn>,
    pub capture_state: CaptureState,
    pub state: ConversationState,
    /// What the recognizer has heard so far in the current session
    pub live_transcript: String,
    /// A request is in flight
    pub is_thinking: bool,
    pub notice: Option<Notice>,
    /// Capabilities missing on this platform
    pub unavailable: Vec<Capability>,
}

impl ConversationView {
    /// Check if the microphone affordance should show "listening"
    pub fn is_listening(&self) -> bool {
        self.capture_state.is_active()
    }

    pub fn voice_available(&self) -> bool {
        !self.unavailable.contains(&Capability::SpeechRecognition)
    }

    /// History split into safe render segments
    pub fn rendered(&self) -> Vec<(Role, Vec<Segment>)> {
        self.history
            .iter()
            .map(|turn| (turn.role(), segments(turn.text())))
            .collect()
    }
}

/// Thread-safe shared conversation view
#[derive(Clone, Default)]
pub struct SharedConversationView {
    inner: Arc<RwLock<ConversationView>>,
}

impl SharedConversationView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a snapshot of the current view (no lock held after return)
    pub fn snapshot(&self) -> ConversationView {
        self.inner.read().clone()
    }

    pub(crate) fn replace(&self, view: ConversationView) {
        *self.inner.write() = view;
    }

    pub fn state(&self) -> ConversationState {
        self.inner.read().state
    }

    pub fn history_len(&self) -> usize {
        self.inner.read().history.len()
    }

    pub fn is_thinking(&self) -> bool {
        self.inner.read().is_thinking
    }

    pub fn last_turn(&self) -> Option<Turn> {
        self.inner.read().history.last().cloned()
    }
}

impl std::fmt::Debug for SharedConversationView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedConversationView")
            .field("state", &self.state())
            .finish()
    }
}

/// Commands accepted by the orchestrator
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AppCommand {
    /// Begin a voice capture
    StartListening,
    /// Finish the capture and send what was heard
    StopListening,
    /// Abort the capture and discard what was heard
    CancelListening,
    /// Send typed input (bypasses capture)
    SendText(String),
    /// Reset the conversation
    ClearHistory,
    /// Stop the event loop
    Shutdown,
}

/// Notifications for the rendering surface
///
/// State should be read from [`SharedConversationView`] rather than
/// reconstructed from events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrchestratorEvent {
    StateChanged(ConversationState),
    TranscriptUpdated(String),
    TurnAppended(Turn),
    Notice(Notice),
    HistoryCleared,
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        assert!(ConversationState::default().is_idle());
        assert!(ConversationState::AwaitingSilence.is_capturing());
        assert!(!ConversationState::Dispatching.is_capturing());
        assert_eq!(ConversationState::Speaking.to_string(), "Speaking");
    }

    #[test]
    fn test_shared_view_snapshot() {
        let shared = SharedConversationView::new();
        let mut view = ConversationView::default();
        view.history.push(Turn::user("Hello"));
        view.state = ConversationState::Dispatching;
        view.is_thinking = true;
        shared.replace(view);

        let snapshot = shared.snapshot();
        assert_eq!(snapshot.history.len(), 1);
        assert_eq!(shared.state(), ConversationState::Dispatching);
        assert!(shared.is_thinking());
        assert_eq!(shared.last_turn(), Some(Turn::user("Hello")));
    }

    #[test]
    fn test_rendered_history_uses_segments() {
        let view = ConversationView {
            history: vec![Turn::assistant("<strong>Four</strong><br>Done")],
            ..Default::default()
        };
        let rendered = view.rendered();
        assert_eq!(rendered[0].0, Role::Assistant);
        assert_eq!(
            rendered[0].1,
            vec![
                Segment::Strong("Four".to_string()),
                Segment::Break,
                Segment::Text("Done".to_string())
            ]
        );
    }

    #[test]
    fn test_voice_availability() {
        let view = ConversationView {
            unavailable: vec![Capability::SpeechRecognition],
            ..Default::default()
        };
        assert!(!view.voice_available());
        assert!(ConversationView::default().voice_available());
    }

    #[test]
    fn test_notice_text() {
        assert_eq!(Notice::NothingHeard.to_string(), "I didn't hear anything.");
        assert_eq!(
            Notice::CaptureFailed("no-speech".into()).to_string(),
            "Speech recognition error: no-speech"
        );
    }
}
