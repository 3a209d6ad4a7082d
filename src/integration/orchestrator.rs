//! Orchestrator for the voice and text conversation
//!
//! Ties capture, silence endpointing, dispatch and playback into one state
//! machine. All state lives on a single logical thread: commands,
//! capability signals and dispatch completions arrive on channels and are
//! handled one at a time. The only timer is the silence debouncer, whose
//! deadline bounds how long the loop waits.
//!
//! The orchestrator can run its own loop thread via [`Orchestrator::start`]
//! or be driven synchronously with [`Orchestrator::pump`] and the direct
//! command methods.

use crate::integration::config::AssistantConfig;
use crate::integration::state::{
    AppCommand, ConversationState, ConversationView, Notice, OrchestratorEvent,
    SharedConversationView,
};
use crate::llm::{
    plain_text, sanitize, Completion, Dispatch, DispatchEvent, InteractionMode, ModelClient,
    RequestDispatcher, FALLBACK_REPLY,
};
use crate::messages::{ConversationStore, Turn};
use crate::speech::{
    CaptureError, CaptureOutcome, CaptureSession, CaptureState, PlaybackSignal, SilenceDebouncer,
    SpeechEvent, SpeechPlayback, SpeechRecognizer, SpeechSynthesizer,
};
use crate::{Capability, ParleyError, Result};
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Longest the loop sleeps when no timer is armed
const IDLE_WAKE: Duration = Duration::from_millis(250);

/// Platform speech capabilities; either may be missing
#[derive(Default)]
pub struct Capabilities {
    pub recognizer: Option<Box<dyn SpeechRecognizer>>,
    pub synthesizer: Option<Box<dyn SpeechSynthesizer>>,
}

impl Capabilities {
    /// Text-only: neither recognition nor synthesis
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_recognizer(mut self, recognizer: impl SpeechRecognizer + 'static) -> Self {
        self.recognizer = Some(Box::new(recognizer));
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: impl SpeechSynthesizer + 'static) -> Self {
        self.synthesizer = Some(Box::new(synthesizer));
        self
    }
}

/// Handle for controlling the orchestrator from a UI or tests
#[derive(Clone)]
pub struct OrchestratorHandle {
    command_tx: Sender<AppCommand>,
    event_rx: Receiver<OrchestratorEvent>,
    view: SharedConversationView,
}

impl OrchestratorHandle {
    /// Send a command to the orchestrator
    pub fn send_command(&self, cmd: AppCommand) -> Result<()> {
        self.command_tx
            .send(cmd)
            .map_err(|e| ParleyError::ChannelError(format!("Failed to send command: {}", e)))
    }

    pub fn start_listening(&self) -> Result<()> {
        self.send_command(AppCommand::StartListening)
    }

    pub fn stop_listening(&self) -> Result<()> {
        self.send_command(AppCommand::StopListening)
    }

    pub fn cancel_listening(&self) -> Result<()> {
        self.send_command(AppCommand::CancelListening)
    }

    pub fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.send_command(AppCommand::SendText(text.into()))
    }

    pub fn clear_history(&self) -> Result<()> {
        self.send_command(AppCommand::ClearHistory)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send_command(AppCommand::Shutdown)
    }

    /// Try to receive an event from the orchestrator
    pub fn try_recv_event(&self) -> Option<OrchestratorEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Wait up to `timeout` for the next event
    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<OrchestratorEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    pub fn event_receiver(&self) -> Receiver<OrchestratorEvent> {
        self.event_rx.clone()
    }

    /// Shared view for direct queries
    pub fn view(&self) -> &SharedConversationView {
        &self.view
    }

    pub fn snapshot(&self) -> ConversationView {
        self.view.snapshot()
    }
}

/// Main orchestrator that coordinates all components
pub struct Orchestrator {
    config: AssistantConfig,
    state: ConversationState,
    store: ConversationStore,
    capture: Option<CaptureSession>,
    debouncer: SilenceDebouncer,
    dispatcher: RequestDispatcher,
    playback: Option<SpeechPlayback>,
    live_transcript: String,
    notice: Option<Notice>,
    unavailable: Vec<Capability>,
    view: SharedConversationView,
    command_rx: Receiver<AppCommand>,
    speech_rx: Receiver<SpeechEvent>,
    dispatch_rx: Receiver<DispatchEvent>,
    event_tx: Sender<OrchestratorEvent>,
    running: bool,
}

impl Orchestrator {
    /// Create a new orchestrator
    ///
    /// Missing capabilities are reported here, once, as notices.
    pub fn new(
        config: AssistantConfig,
        client: Arc<dyn ModelClient>,
        capabilities: Capabilities,
    ) -> Result<(Self, OrchestratorHandle)> {
        config.validate().map_err(ParleyError::ConfigError)?;

        let buffer = config.channel_buffer_size;
        let (command_tx, command_rx) = bounded(buffer);
        let (event_tx, event_rx) = bounded(buffer);
        // capabilities may signal synchronously from inside start/speak on this thread
        let (speech_tx, speech_rx) = unbounded();
        let (dispatch_tx, dispatch_rx) = bounded(buffer);

        let capture = capabilities.recognizer.map(|recognizer| {
            CaptureSession::new(
                recognizer,
                config.capture.recognition_options(),
                speech_tx.clone(),
            )
        });
        let playback = capabilities.synthesizer.map(|synthesizer| {
            SpeechPlayback::new(synthesizer, speech_tx.clone())
                .with_locale(config.playback.locale.clone())
        });
        let dispatcher = RequestDispatcher::new(
            client,
            config.shortcut_table(),
            config.prompts.clone(),
            dispatch_tx,
            buffer,
        );
        let view = SharedConversationView::new();

        let handle = OrchestratorHandle {
            command_tx,
            event_rx,
            view: view.clone(),
        };

        let mut orchestrator = Self {
            debouncer: SilenceDebouncer::new(config.capture.quiet_period()),
            config,
            state: ConversationState::Idle,
            store: ConversationStore::new(),
            capture,
            dispatcher,
            playback,
            live_transcript: String::new(),
            notice: None,
            unavailable: Vec::new(),
            view,
            command_rx,
            speech_rx,
            dispatch_rx,
            event_tx,
            running: true,
        };

        if orchestrator.playback.is_none() {
            orchestrator.report_unavailable(Capability::SpeechSynthesis);
        }
        if orchestrator.capture.is_none() {
            orchestrator.report_unavailable(Capability::SpeechRecognition);
        }
        orchestrator.publish();

        Ok((orchestrator, handle))
    }

    /// Run the event loop on its own thread
    pub fn start(mut self) -> Result<JoinHandle<()>> {
        let handle = thread::Builder::new()
            .name("parley-orchestrator".to_string())
            .spawn(move || {
                info!("Orchestrator main loop starting");
                while self.pump(IDLE_WAKE) {}
                info!("Orchestrator stopped");
            })?;
        Ok(handle)
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn history(&self) -> Vec<Turn> {
        self.store.snapshot()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn live_transcript(&self) -> &str {
        &self.live_transcript
    }

    pub fn capture_state(&self) -> CaptureState {
        self.capture
            .as_ref()
            .map(CaptureSession::state)
            .unwrap_or_default()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Deadline of the live silence timer, if any
    pub fn next_deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    /// Current view, as published to renderers
    pub fn view(&self) -> ConversationView {
        ConversationView {
            history: self.store.snapshot(),
            capture_state: self.capture_state(),
            state: self.state,
            live_transcript: self.live_transcript.clone(),
            is_thinking: self.dispatcher.is_in_flight(),
            notice: self.notice.clone(),
            unavailable: self.unavailable.clone(),
        }
    }

    // === Commands ===

    /// Begin a voice capture
    pub fn start_listening(&mut self) -> Result<()> {
        if self.capture.is_none() {
            warn!("Cannot start listening: speech recognition unavailable");
            return Err(ParleyError::CapabilityUnavailable(
                Capability::SpeechRecognition,
            ));
        }

        match self.state {
            ConversationState::Idle => {}
            ConversationState::Speaking => self.cancel_playback(),
            other => {
                warn!("Cannot start listening while {}", other);
                return Err(ParleyError::Rejected(format!(
                    "cannot start listening while {}",
                    other
                )));
            }
        }

        let started = match self.capture.as_mut() {
            Some(capture) => capture.start(),
            None => return Err(ParleyError::CapabilityUnavailable(Capability::SpeechRecognition)),
        };

        let result = match started {
            Ok(session) => {
                debug!("Listening in session {}", session);
                self.live_transcript.clear();
                self.notice = None;
                self.set_state(ConversationState::Capturing);
                Ok(())
            }
            Err(CaptureError::AlreadyActive) => {
                warn!("Cannot start listening: capture already active");
                Err(ParleyError::Rejected("capture already active".to_string()))
            }
            Err(CaptureError::Start(reason)) => {
                self.set_notice(Notice::CaptureFailed(reason.clone()));
                self.set_state(ConversationState::Idle);
                Err(ParleyError::CaptureError(reason))
            }
        };
        self.publish();
        result
    }

    /// Finish the capture; what was heard is sent once the recognizer ends
    pub fn stop_listening(&mut self) -> Result<()> {
        if !self.state.is_capturing() {
            warn!("Cannot stop listening while {}", self.state);
            return Err(ParleyError::Rejected(format!(
                "not listening ({})",
                self.state
            )));
        }
        self.debouncer.disarm();
        if let Some(capture) = self.capture.as_mut() {
            capture.stop();
        }
        self.publish();
        Ok(())
    }

    /// Abort the capture and discard what was heard
    pub fn cancel_listening(&mut self) -> Result<()> {
        if !self.state.is_capturing() {
            warn!("Cannot cancel listening while {}", self.state);
            return Err(ParleyError::Rejected(format!(
                "not listening ({})",
                self.state
            )));
        }
        self.debouncer.disarm();
        if let Some(capture) = self.capture.as_mut() {
            capture.abort();
        }
        self.live_transcript.clear();
        self.set_state(ConversationState::Idle);
        self.publish();
        Ok(())
    }

    /// Send typed input; blank input is ignored
    pub fn submit_text(&mut self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            debug!("Ignoring blank input");
            return Ok(());
        }

        match self.state {
            ConversationState::Idle => {}
            ConversationState::Speaking => self.cancel_playback(),
            other => {
                warn!("Cannot send text while {}", other);
                return Err(ParleyError::Rejected(format!(
                    "cannot send text while {}",
                    other
                )));
            }
        }

        self.notice = None;
        self.begin_turn(text.to_string(), InteractionMode::Text);
        self.publish();
        Ok(())
    }

    /// Reset the conversation
    ///
    /// A request in flight is cancelled and its completion discarded.
    pub fn clear_history(&mut self) {
        info!("Clearing conversation history");
        self.store.reset();

        match self.state {
            ConversationState::Dispatching => {
                self.dispatcher.cancel();
                self.set_state(ConversationState::Idle);
            }
            ConversationState::Speaking => self.cancel_playback(),
            _ => {}
        }
        if !self.state.is_capturing() {
            self.live_transcript.clear();
        }
        self.notice = None;

        self.emit(OrchestratorEvent::HistoryCleared);
        self.publish();
    }

    /// Stop the loop and tear down every active component
    pub fn shutdown(&mut self) {
        if !self.running {
            return;
        }
        info!("Orchestrator shutdown requested");
        self.running = false;

        self.debouncer.disarm();
        if let Some(capture) = self.capture.as_mut() {
            capture.abort();
        }
        if let Some(playback) = self.playback.as_mut() {
            playback.cancel();
        }
        self.dispatcher.cancel();
        self.dispatcher.shutdown();

        self.emit(OrchestratorEvent::Shutdown);
        self.publish();
    }

    pub fn handle_command(&mut self, cmd: AppCommand) {
        let result = match cmd {
            AppCommand::StartListening => self.start_listening(),
            AppCommand::StopListening => self.stop_listening(),
            AppCommand::CancelListening => self.cancel_listening(),
            AppCommand::SendText(text) => self.submit_text(&text),
            AppCommand::ClearHistory => {
                self.clear_history();
                Ok(())
            }
            AppCommand::Shutdown => {
                self.shutdown();
                Ok(())
            }
        };
        if let Err(e) = result {
            debug!("Command not applied: {}", e);
        }
    }

    // === Events ===

    /// Apply a signal from the recognizer or synthesizer
    pub fn handle_speech_event(&mut self, event: SpeechEvent) {
        match event {
            SpeechEvent::Capture { session, signal } => {
                let outcome = match self.capture.as_mut() {
                    Some(capture) => capture.handle(session, signal),
                    None => None,
                };
                if let Some(outcome) = outcome {
                    self.on_capture(outcome);
                }
            }
            SpeechEvent::Playback { utterance, signal } => {
                let signal = match self.playback.as_mut() {
                    Some(playback) => playback.handle(utterance, signal),
                    None => None,
                };
                match signal {
                    Some(PlaybackSignal::Finished) => {
                        debug!("Playback of {} finished", utterance);
                        if self.state == ConversationState::Speaking {
                            self.set_state(ConversationState::Idle);
                        }
                    }
                    Some(PlaybackSignal::Failed(reason)) => {
                        warn!("Playback of {} failed: {}", utterance, reason);
                        self.set_notice(Notice::PlaybackFailed(reason));
                        if self.state == ConversationState::Speaking {
                            self.set_state(ConversationState::Idle);
                        }
                    }
                    None => {}
                }
            }
        }
        self.publish();
    }

    /// Apply a completion from the dispatch worker
    pub fn handle_dispatch_event(&mut self, event: DispatchEvent) {
        match event {
            DispatchEvent::Completed { id, result } => {
                if let Some(completion) = self.dispatcher.complete(id, result) {
                    self.on_completion(completion);
                }
            }
            DispatchEvent::Stopped(reason) => {
                error!("Dispatch worker stopped: {}", reason);
                if let Some(id) = self.dispatcher.pending().map(|pending| pending.id) {
                    if let Some(completion) = self.dispatcher.complete(id, Err(reason)) {
                        self.on_completion(completion);
                    }
                }
            }
        }
        self.publish();
    }

    /// Fire the silence timer if its deadline has passed
    pub fn poll_timers(&mut self, now: Instant) {
        if self.debouncer.poll(now).is_none() {
            return;
        }
        if let Some(capture) = self.capture.as_mut() {
            if capture.stop_on_silence() {
                info!("Quiet period elapsed, stopping capture");
            }
        }
        self.publish();
    }

    /// Handle at most one pending message, waiting up to `timeout`
    ///
    /// The wait is cut short at the silence deadline. Returns `false` once
    /// the orchestrator has shut down.
    pub fn pump(&mut self, timeout: Duration) -> bool {
        if !self.running {
            return false;
        }

        let wait = match self.debouncer.deadline() {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()).min(timeout),
            None => timeout,
        };

        let command_rx = self.command_rx.clone();
        let speech_rx = self.speech_rx.clone();
        let dispatch_rx = self.dispatch_rx.clone();

        select! {
            recv(command_rx) -> cmd => match cmd {
                Ok(cmd) => self.handle_command(cmd),
                Err(_) => {
                    warn!("Command channel disconnected");
                    self.shutdown();
                }
            },
            recv(speech_rx) -> event => {
                if let Ok(event) = event {
                    self.handle_speech_event(event);
                }
            },
            recv(dispatch_rx) -> event => {
                if let Ok(event) = event {
                    self.handle_dispatch_event(event);
                }
            },
            default(wait) => {}
        }

        self.poll_timers(Instant::now());
        self.running
    }

    // === Transitions ===

    fn on_capture(&mut self, outcome: CaptureOutcome) {
        if !self.state.is_capturing() {
            debug!("Ignoring capture outcome while {}", self.state);
            return;
        }

        match outcome {
            CaptureOutcome::Progress { text, is_final } => {
                self.live_transcript = text.clone();
                self.emit(OrchestratorEvent::TranscriptUpdated(text));
                self.set_state(ConversationState::AwaitingSilence);

                let continuous = self.config.capture.continuous;
                if let Some(capture) = self.capture.as_mut() {
                    if capture.state() == CaptureState::Listening {
                        if continuous {
                            self.debouncer.arm(Instant::now());
                        } else if is_final {
                            capture.stop();
                        }
                    }
                }
            }
            CaptureOutcome::Completed(text) => {
                self.debouncer.disarm();
                self.live_transcript.clear();
                self.begin_turn(text, InteractionMode::Voice);
            }
            CaptureOutcome::Empty => {
                self.debouncer.disarm();
                self.live_transcript.clear();
                info!("Capture ended without speech");
                self.set_notice(Notice::NothingHeard);
                self.set_state(ConversationState::Idle);
            }
            CaptureOutcome::Failed(code) => {
                self.debouncer.disarm();
                self.live_transcript.clear();
                self.set_notice(Notice::CaptureFailed(code));
                self.set_state(ConversationState::Idle);
            }
        }
    }

    /// Record the user's turn and hand the conversation to the dispatcher
    fn begin_turn(&mut self, text: String, mode: InteractionMode) {
        self.append(Turn::user(text));
        let history = self.store.snapshot();

        match self.dispatcher.dispatch(&history, mode) {
            Ok(Dispatch::Shortcut(reply)) => self.record_reply(sanitize(&reply), mode),
            Ok(Dispatch::Sent(id)) => {
                debug!("Awaiting reply to {}", id);
                self.set_state(ConversationState::Dispatching);
            }
            Err(e) => {
                error!("Dispatch failed: {}", e);
                self.append(Turn::assistant(FALLBACK_REPLY));
                self.set_notice(Notice::DispatchFailed(e.to_string()));
                self.set_state(ConversationState::Idle);
            }
        }
    }

    fn on_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Reply { text, mode } => self.record_reply(text, mode),
            Completion::Failed { text, reason, .. } => {
                // the fallback is shown but never spoken
                self.append(Turn::assistant(text));
                self.set_notice(Notice::DispatchFailed(reason));
                self.set_state(ConversationState::Idle);
            }
            Completion::Cancelled => debug!("Cancelled request completed"),
        }
    }

    fn record_reply(&mut self, text: String, mode: InteractionMode) {
        self.append(Turn::assistant(text.clone()));
        match mode {
            InteractionMode::Voice => self.speak(&text),
            InteractionMode::Text => self.set_state(ConversationState::Idle),
        }
    }

    fn speak(&mut self, text: &str) {
        if !self.config.playback.enabled {
            self.set_state(ConversationState::Idle);
            return;
        }
        let spoken = plain_text(text);
        let Some(playback) = self.playback.as_mut() else {
            self.set_state(ConversationState::Idle);
            return;
        };

        match playback.speak(&spoken) {
            Ok(handle) => {
                debug!("Speaking utterance {}", handle.id);
                self.set_state(ConversationState::Speaking);
            }
            Err(e) => {
                warn!("Could not speak reply: {}", e);
                self.set_notice(Notice::PlaybackFailed(e.to_string()));
                self.set_state(ConversationState::Idle);
            }
        }
    }

    fn cancel_playback(&mut self) {
        if let Some(playback) = self.playback.as_mut() {
            playback.cancel();
        }
        if self.state == ConversationState::Speaking {
            self.set_state(ConversationState::Idle);
        }
    }

    // === Bookkeeping ===

    fn append(&mut self, turn: Turn) {
        self.store.append(turn.clone());
        self.emit(OrchestratorEvent::TurnAppended(turn));
    }

    fn set_state(&mut self, state: ConversationState) {
        if self.state != state {
            debug!("State {} -> {}", self.state, state);
            self.state = state;
            self.emit(OrchestratorEvent::StateChanged(state));
        }
    }

    fn set_notice(&mut self, notice: Notice) {
        self.notice = Some(notice.clone());
        self.emit(OrchestratorEvent::Notice(notice));
    }

    fn report_unavailable(&mut self, capability: Capability) {
        warn!("{} unavailable, continuing without it", capability);
        self.unavailable.push(capability);
        self.set_notice(Notice::CapabilityUnavailable(capability));
    }

    fn emit(&self, event: OrchestratorEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => debug!("Event queue full, dropping {:?}", event),
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    fn publish(&self) {
        self.view.replace(self.view());
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("state", &self.state)
            .field("turns", &self.store.len())
            .field("capture", &self.capture)
            .field("playback", &self.playback)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}
