//! Speech capture and playback
//!
//! The platform's recognizer and synthesizer are injected as capability
//! traits. Both report back through sinks that tag every signal with the
//! session or utterance it belongs to, so signals from a superseded cycle
//! can be recognised and dropped.

pub mod capture;
pub mod debounce;
pub mod playback;

use crate::Result;
use crossbeam_channel::Sender;
use tracing::debug;
use uuid::Uuid;

pub use capture::{CaptureError, CaptureOutcome, CaptureSession, CaptureState};
pub use debounce::SilenceDebouncer;
pub use playback::{PlaybackHandle, SpeechPlayback};

/// Identifies one capture session
pub type SessionId = Uuid;

/// Identifies one spoken utterance
pub type UtteranceId = Uuid;

/// Default locale for recognition and synthesis
pub const DEFAULT_LOCALE: &str = "en-US";

/// Options handed to the recognizer when a session starts
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecognitionOptions {
    /// Keep listening across pauses instead of stopping after one result
    pub continuous: bool,
    /// Deliver non-final hypotheses while the user is still speaking
    pub interim_results: bool,
    /// BCP 47 locale
    pub locale: String,
}

impl Default for RecognitionOptions {
    fn default() -> Self {
        Self {
            continuous: true,
            interim_results: false,
            locale: DEFAULT_LOCALE.to_string(),
        }
    }
}

/// Platform speech-to-text capability
pub trait SpeechRecognizer: Send {
    /// Begin recognition, reporting through `sink` until it is ended
    fn start(&mut self, options: &RecognitionOptions, sink: RecognitionSink) -> Result<()>;

    /// Ask the recognizer to finish; it still reports its final result and end
    fn stop(&mut self);

    /// Tear the session down without waiting for further results
    fn abort(&mut self) {
        self.stop();
    }
}

/// Text submitted to the synthesizer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Utterance {
    pub id: UtteranceId,
    pub text: String,
    pub locale: String,
}

/// Platform text-to-speech capability
pub trait SpeechSynthesizer: Send {
    /// Start speaking, reporting completion through `sink`
    fn speak(&mut self, utterance: Utterance, sink: PlaybackSink) -> Result<()>;

    /// Cancel whatever is currently being spoken
    fn cancel(&mut self);
}

/// Signals raised by the recognizer for one session
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureSignal {
    /// Cumulative transcript so far; supersedes any earlier result
    Result { text: String, is_final: bool },
    /// The recognizer terminated
    Ended,
    /// Recognition failed with a platform error code
    Error(String),
}

/// Signals raised by the synthesizer for one utterance
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlaybackSignal {
    Finished,
    Failed(String),
}

/// Events flowing from the speech capabilities into the orchestrator
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpeechEvent {
    Capture {
        session: SessionId,
        signal: CaptureSignal,
    },
    Playback {
        utterance: UtteranceId,
        signal: PlaybackSignal,
    },
}

/// Callback surface handed to a recognizer for a single session
#[derive(Clone, Debug)]
pub struct RecognitionSink {
    session: SessionId,
    tx: Sender<SpeechEvent>,
}

impl RecognitionSink {
    pub fn new(session: SessionId, tx: Sender<SpeechEvent>) -> Self {
        Self { session, tx }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn result(&self, text: impl Into<String>, is_final: bool) {
        self.emit(CaptureSignal::Result {
            text: text.into(),
            is_final,
        });
    }

    pub fn ended(&self) {
        self.emit(CaptureSignal::Ended);
    }

    pub fn error(&self, code: impl Into<String>) {
        self.emit(CaptureSignal::Error(code.into()));
    }

    fn emit(&self, signal: CaptureSignal) {
        let event = SpeechEvent::Capture {
            session: self.session,
            signal,
        };
        if self.tx.send(event).is_err() {
            debug!("Capture signal dropped, orchestrator is gone");
        }
    }
}

/// Callback surface handed to a synthesizer for a single utterance
#[derive(Clone, Debug)]
pub struct PlaybackSink {
    utterance: UtteranceId,
    tx: Sender<SpeechEvent>,
}

impl PlaybackSink {
    pub fn new(utterance: UtteranceId, tx: Sender<SpeechEvent>) -> Self {
        Self { utterance, tx }
    }

    pub fn utterance(&self) -> UtteranceId {
        self.utterance
    }

    pub fn finished(&self) {
        self.emit(PlaybackSignal::Finished);
    }

    pub fn failed(&self, reason: impl Into<String>) {
        self.emit(PlaybackSignal::Failed(reason.into()));
    }

    fn emit(&self, signal: PlaybackSignal) {
        let event = SpeechEvent::Playback {
            utterance: self.utterance,
            signal,
        };
        if self.tx.send(event).is_err() {
            debug!("Playback signal dropped, orchestrator is gone");
        }
    }
}
