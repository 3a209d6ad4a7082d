//! Shared test utilities: scripted capabilities and model doubles

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use parley::integration::{Capabilities, Orchestrator, OrchestratorHandle};
use parley::llm::{ModelClient, ModelRequest};
use parley::speech::{
    PlaybackSink, RecognitionOptions, RecognitionSink, SpeechRecognizer, SpeechSynthesizer,
    Utterance,
};
use parley::{AssistantConfig, ParleyError};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Default)]
struct MicState {
    sink: Option<RecognitionSink>,
    options: Option<RecognitionOptions>,
    starts: usize,
    stops: usize,
    aborts: usize,
    end_on_stop: bool,
}

/// Test-side control of a scripted recognizer
#[derive(Clone)]
pub struct Mic(Arc<Mutex<MicState>>);

impl Mic {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(MicState {
            end_on_stop: true,
            ..Default::default()
        })))
    }

    /// Stopping the recognizer does not end the session on its own
    pub fn without_end_on_stop(self) -> Self {
        self.0.lock().end_on_stop = false;
        self
    }

    pub fn recognizer(&self) -> ScriptedRecognizer {
        ScriptedRecognizer(self.clone())
    }

    fn sink(&self) -> RecognitionSink {
        self.0
            .lock()
            .sink
            .clone()
            .expect("recognizer has not been started")
    }

    pub fn say(&self, text: &str, is_final: bool) {
        self.sink().result(text, is_final);
    }

    pub fn end(&self) {
        self.sink().ended();
    }

    pub fn error(&self, code: &str) {
        self.sink().error(code);
    }

    pub fn starts(&self) -> usize {
        self.0.lock().starts
    }

    pub fn stops(&self) -> usize {
        self.0.lock().stops
    }

    pub fn aborts(&self) -> usize {
        self.0.lock().aborts
    }

    pub fn options(&self) -> Option<RecognitionOptions> {
        self.0.lock().options.clone()
    }
}

pub struct ScriptedRecognizer(Mic);

impl SpeechRecognizer for ScriptedRecognizer {
    fn start(&mut self, options: &RecognitionOptions, sink: RecognitionSink) -> parley::Result<()> {
        let mut state = self.0 .0.lock();
        state.starts += 1;
        state.options = Some(options.clone());
        state.sink = Some(sink);
        Ok(())
    }

    fn stop(&mut self) {
        let sink = {
            let mut state = self.0 .0.lock();
            state.stops += 1;
            if state.end_on_stop {
                state.sink.clone()
            } else {
                None
            }
        };
        if let Some(sink) = sink {
            sink.ended();
        }
    }

    fn abort(&mut self) {
        self.0 .0.lock().aborts += 1;
    }
}

#[derive(Default)]
struct SpeakerState {
    spoken: Vec<String>,
    cancels: usize,
    sink: Option<PlaybackSink>,
}

/// Test-side control of a scripted synthesizer
#[derive(Clone, Default)]
pub struct Speaker(Arc<Mutex<SpeakerState>>);

impl Speaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn synthesizer(&self) -> ScriptedSynthesizer {
        ScriptedSynthesizer(self.clone())
    }

    pub fn spoken(&self) -> Vec<String> {
        self.0.lock().spoken.clone()
    }

    pub fn cancels(&self) -> usize {
        self.0.lock().cancels
    }

    /// Report the most recent utterance as finished
    pub fn finish(&self) {
        let sink = self.0.lock().sink.clone().expect("nothing was spoken");
        sink.finished();
    }

    pub fn fail(&self, reason: &str) {
        let sink = self.0.lock().sink.clone().expect("nothing was spoken");
        sink.failed(reason);
    }
}

pub struct ScriptedSynthesizer(Speaker);

impl SpeechSynthesizer for ScriptedSynthesizer {
    fn speak(&mut self, utterance: Utterance, sink: PlaybackSink) -> parley::Result<()> {
        let mut state = self.0 .0.lock();
        state.spoken.push(utterance.text);
        state.sink = Some(sink);
        Ok(())
    }

    fn cancel(&mut self) {
        self.0 .0.lock().cancels += 1;
    }
}

/// Model double answering from a queue of scripted results
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn replying(reply: &str) -> Arc<Self> {
        let model = Self::new();
        model.push_reply(reply);
        model
    }

    pub fn failing(reason: &str) -> Arc<Self> {
        let model = Self::new();
        model.push_failure(reason);
        model
    }

    pub fn push_reply(&self, reply: &str) {
        self.replies.lock().push_back(Ok(reply.to_string()));
    }

    pub fn push_failure(&self, reason: &str) {
        self.replies.lock().push_back(Err(reason.to_string()));
    }

    pub fn calls(&self) -> Vec<ModelRequest> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn complete(&self, request: &ModelRequest) -> parley::Result<String> {
        self.calls.lock().push(request.clone());
        match self.replies.lock().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(reason)) => Err(ParleyError::HttpError(reason)),
            None => Ok("ok".to_string()),
        }
    }
}

/// Orchestrator wired to a scripted mic, speaker and model
pub struct Rig {
    pub orchestrator: Orchestrator,
    pub handle: OrchestratorHandle,
    pub mic: Mic,
    pub speaker: Speaker,
    pub model: Arc<ScriptedModel>,
}

impl Rig {
    pub fn new(config: AssistantConfig, model: Arc<ScriptedModel>) -> Self {
        Self::with_mic(config, model, Mic::new())
    }

    pub fn with_mic(config: AssistantConfig, model: Arc<ScriptedModel>, mic: Mic) -> Self {
        let speaker = Speaker::new();
        let capabilities = Capabilities::none()
            .with_recognizer(mic.recognizer())
            .with_synthesizer(speaker.synthesizer());
        let (orchestrator, handle) =
            Orchestrator::new(config, model.clone(), capabilities).expect("valid test config");
        Self {
            orchestrator,
            handle,
            mic,
            speaker,
            model,
        }
    }

    /// Pump until `done` holds, or give up after five seconds
    pub fn pump_until(&mut self, done: impl Fn(&Orchestrator) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if done(&self.orchestrator) {
                return true;
            }
            self.orchestrator.pump(Duration::from_millis(20));
        }
        done(&self.orchestrator)
    }

    /// Handle everything already queued without waiting for more
    pub fn drain(&mut self) {
        for _ in 0..64 {
            self.orchestrator.pump(Duration::ZERO);
        }
    }
}
