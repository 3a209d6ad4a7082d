//! Capture session lifecycle and transcript assembly

use super::{
    CaptureSignal, RecognitionOptions, RecognitionSink, SessionId, SpeechEvent, SpeechRecognizer,
};
use crossbeam_channel::Sender;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Capture lifecycle state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CaptureState {
    /// No session has been started yet
    #[default]
    Idle,
    /// Recognizer is running and delivering results
    Listening,
    /// Quiet period elapsed, waiting for the recognizer to end
    StoppingOnSilence,
    /// Session stopped or ended
    Stopped,
}

impl CaptureState {
    /// Check if a session is running (mic affordance shows "listening")
    pub fn is_active(&self) -> bool {
        matches!(self, CaptureState::Listening | CaptureState::StoppingOnSilence)
    }
}

impl std::fmt::Display for CaptureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureState::Idle => write!(f, "Idle"),
            CaptureState::Listening => write!(f, "Listening"),
            CaptureState::StoppingOnSilence => write!(f, "StoppingOnSilence"),
            CaptureState::Stopped => write!(f, "Stopped"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("a capture session is already active")]
    AlreadyActive,

    #[error("recognizer failed to start: {0}")]
    Start(String),
}

/// What a capture signal means to the orchestrator
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// New cumulative transcript
    Progress { text: String, is_final: bool },
    /// Session ended with speech
    Completed(String),
    /// Session ended without any speech
    Empty,
    /// Session failed; transcript discarded
    Failed(String),
}

/// Wraps the platform recognizer and owns the transcript of the current session
pub struct CaptureSession {
    recognizer: Box<dyn SpeechRecognizer>,
    options: RecognitionOptions,
    events: Sender<SpeechEvent>,
    state: CaptureState,
    session: Option<SessionId>,
    transcript: String,
    ended: bool,
}

impl CaptureSession {
    pub fn new(
        recognizer: Box<dyn SpeechRecognizer>,
        options: RecognitionOptions,
        events: Sender<SpeechEvent>,
    ) -> Self {
        Self {
            recognizer,
            options,
            events,
            state: CaptureState::Idle,
            session: None,
            transcript: String::new(),
            ended: false,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn options(&self) -> &RecognitionOptions {
        &self.options
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session
    }

    /// Latest transcript of the current (or last) session
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Session stopped but its end has not been observed yet
    fn awaiting_end(&self) -> bool {
        self.session.is_some() && !self.ended
    }

    /// Start a new session
    ///
    /// A stopped session whose end never arrived is aborted first, so any
    /// signal it still raises is treated as stale.
    pub fn start(&mut self) -> Result<SessionId, CaptureError> {
        if self.is_active() {
            return Err(CaptureError::AlreadyActive);
        }

        if self.awaiting_end() {
            debug!("Aborting unfinished capture session {:?}", self.session);
            self.recognizer.abort();
        }

        let session = Uuid::new_v4();
        self.session = Some(session);
        self.transcript.clear();
        self.ended = false;

        let sink = RecognitionSink::new(session, self.events.clone());
        match self.recognizer.start(&self.options, sink) {
            Ok(()) => {
                self.state = CaptureState::Listening;
                info!("Capture session {} started", session);
                Ok(session)
            }
            Err(e) => {
                warn!("Recognizer failed to start: {}", e);
                self.session = None;
                self.ended = true;
                self.state = CaptureState::Stopped;
                Err(CaptureError::Start(e.to_string()))
            }
        }
    }

    /// Stop the running session; the transcript is finalized when it ends
    pub fn stop(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.state = CaptureState::Stopped;
        self.recognizer.stop();
        debug!("Capture stop requested");
        true
    }

    /// Stop because the quiet period elapsed
    pub fn stop_on_silence(&mut self) -> bool {
        if self.state != CaptureState::Listening {
            return false;
        }
        self.state = CaptureState::StoppingOnSilence;
        self.recognizer.stop();
        debug!("Capture stopping on silence");
        true
    }

    /// Tear the session down and discard its transcript
    pub fn abort(&mut self) {
        if self.awaiting_end() {
            self.recognizer.abort();
        }
        self.ended = true;
        self.transcript.clear();
        if self.session.is_some() {
            self.state = CaptureState::Stopped;
        }
    }

    /// Apply a recognizer signal
    ///
    /// Returns `None` for signals belonging to another session or arriving
    /// after the session has already ended.
    pub fn handle(&mut self, session: SessionId, signal: CaptureSignal) -> Option<CaptureOutcome> {
        if self.session != Some(session) || self.ended {
            debug!("Dropping stale capture signal for session {}", session);
            return None;
        }

        match signal {
            CaptureSignal::Result { text, is_final } => {
                self.transcript = text.trim().to_string();
                Some(CaptureOutcome::Progress {
                    text: self.transcript.clone(),
                    is_final,
                })
            }
            CaptureSignal::Error(code) => {
                warn!("Capture session {} failed: {}", session, code);
                self.ended = true;
                self.state = CaptureState::Stopped;
                self.transcript.clear();
                Some(CaptureOutcome::Failed(code))
            }
            CaptureSignal::Ended => {
                self.ended = true;
                self.state = CaptureState::Stopped;
                debug!("Capture session {} ended", session);
                if self.transcript.is_empty() {
                    Some(CaptureOutcome::Empty)
                } else {
                    Some(CaptureOutcome::Completed(self.transcript.clone()))
                }
            }
        }
    }
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("state", &self.state)
            .field("session", &self.session)
            .field("transcript", &self.transcript)
            .field("ended", &self.ended)
            .finish()
    }
}
