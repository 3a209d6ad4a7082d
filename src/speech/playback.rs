//! Speech playback with supersede-on-speak semantics

use super::{
    PlaybackSignal, PlaybackSink, SpeechEvent, SpeechSynthesizer, Utterance, UtteranceId,
    DEFAULT_LOCALE,
};
use crate::{ParleyError, Result};
use crossbeam_channel::Sender;
use tracing::{debug, warn};
use uuid::Uuid;

/// The utterance currently being spoken
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaybackHandle {
    pub id: UtteranceId,
}

/// Wraps the platform synthesizer; at most one utterance is ever in flight
pub struct SpeechPlayback {
    synthesizer: Box<dyn SpeechSynthesizer>,
    locale: String,
    events: Sender<SpeechEvent>,
    current: Option<PlaybackHandle>,
}

impl SpeechPlayback {
    pub fn new(synthesizer: Box<dyn SpeechSynthesizer>, events: Sender<SpeechEvent>) -> Self {
        Self {
            synthesizer,
            locale: DEFAULT_LOCALE.to_string(),
            events,
            current: None,
        }
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn current(&self) -> Option<PlaybackHandle> {
        self.current
    }

    pub fn is_speaking(&self) -> bool {
        self.current.is_some()
    }

    /// Speak `text`, cancelling whatever is currently being spoken
    pub fn speak(&mut self, text: &str) -> Result<PlaybackHandle> {
        if let Some(previous) = self.current.take() {
            debug!("Superseding utterance {}", previous.id);
            self.synthesizer.cancel();
        }

        let utterance = Utterance {
            id: Uuid::new_v4(),
            text: text.to_string(),
            locale: self.locale.clone(),
        };
        let handle = PlaybackHandle { id: utterance.id };
        let sink = PlaybackSink::new(utterance.id, self.events.clone());

        self.synthesizer.speak(utterance, sink).map_err(|e| {
            warn!("Synthesizer refused utterance: {}", e);
            ParleyError::PlaybackError(e.to_string())
        })?;

        self.current = Some(handle);
        Ok(handle)
    }

    /// Cancel the active utterance, if any
    pub fn cancel(&mut self) -> bool {
        match self.current.take() {
            Some(handle) => {
                debug!("Cancelling utterance {}", handle.id);
                self.synthesizer.cancel();
                true
            }
            None => false,
        }
    }

    /// Apply a synthesizer signal; signals for superseded utterances yield `None`
    pub fn handle(&mut self, utterance: UtteranceId, signal: PlaybackSignal) -> Option<PlaybackSignal> {
        match self.current {
            Some(handle) if handle.id == utterance => {
                self.current = None;
                Some(signal)
            }
            _ => {
                debug!("Dropping stale playback signal for {}", utterance);
                None
            }
        }
    }
}

impl std::fmt::Debug for SpeechPlayback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechPlayback")
            .field("locale", &self.locale)
            .field("current", &self.current)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct Log {
        spoken: Vec<String>,
        cancels: usize,
    }

    struct FakeSynthesizer(Arc<Mutex<Log>>);

    impl SpeechSynthesizer for FakeSynthesizer {
        fn speak(&mut self, utterance: Utterance, _sink: PlaybackSink) -> Result<()> {
            self.0.lock().spoken.push(utterance.text);
            Ok(())
        }

        fn cancel(&mut self) {
            self.0.lock().cancels += 1;
        }
    }

    fn playback() -> (SpeechPlayback, Arc<Mutex<Log>>) {
        let log = Arc::new(Mutex::new(Log::default()));
        let (tx, _rx) = unbounded();
        (
            SpeechPlayback::new(Box::new(FakeSynthesizer(Arc::clone(&log))), tx),
            log,
        )
    }

    #[test]
    fn test_speak_cancels_previous_utterance() {
        let (mut playback, log) = playback();
        let first = playback.speak("first").unwrap();
        let second = playback.speak("second").unwrap();

        assert_ne!(first, second);
        assert_eq!(log.lock().cancels, 1);
        assert_eq!(log.lock().spoken, vec!["first", "second"]);
        assert_eq!(playback.current(), Some(second));
    }

    #[test]
    fn test_superseded_completion_is_ignored() {
        let (mut playback, _) = playback();
        let first = playback.speak("first").unwrap();
        let second = playback.speak("second").unwrap();

        assert_eq!(playback.handle(first.id, PlaybackSignal::Finished), None);
        assert!(playback.is_speaking());
        assert_eq!(
            playback.handle(second.id, PlaybackSignal::Finished),
            Some(PlaybackSignal::Finished)
        );
        assert!(!playback.is_speaking());
    }

    #[test]
    fn test_cancel_without_utterance_is_noop() {
        let (mut playback, log) = playback();
        assert!(!playback.cancel());
        assert_eq!(log.lock().cancels, 0);
    }
}
