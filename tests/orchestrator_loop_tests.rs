//! Tests for the orchestrator running its own event loop thread

mod common;

use common::{Mic, ScriptedModel, Speaker};
use parley::integration::Capabilities;
use parley::{AppCommand, AssistantConfig, ConversationState, Orchestrator, OrchestratorEvent, Turn};
use std::time::{Duration, Instant};

fn wait_for(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    done()
}

#[test]
fn test_threaded_text_conversation() {
    let model = ScriptedModel::replying("Hi there");
    let (orchestrator, handle) =
        Orchestrator::new(AssistantConfig::default(), model.clone(), Capabilities::none()).unwrap();
    let worker = orchestrator.start().unwrap();

    handle.send_text("Hello").unwrap();
    assert!(wait_for(Duration::from_secs(5), || handle.view().history_len() == 2));

    let view = handle.snapshot();
    assert_eq!(view.history, vec![Turn::user("Hello"), Turn::assistant("Hi there")]);
    assert_eq!(view.state, ConversationState::Idle);

    handle.shutdown().unwrap();
    worker.join().unwrap();
    assert_eq!(model.calls().len(), 1);
}

#[test]
fn test_threaded_silence_endpointing() {
    let mic = Mic::new().without_end_on_stop();
    let speaker = Speaker::new();
    let config = AssistantConfig::default().with_quiet_period(Duration::from_millis(100));
    let capabilities = Capabilities::none()
        .with_recognizer(mic.recognizer())
        .with_synthesizer(speaker.synthesizer());
    let (orchestrator, handle) =
        Orchestrator::new(config, ScriptedModel::replying("Four"), capabilities).unwrap();
    let worker = orchestrator.start().unwrap();

    handle.start_listening().unwrap();
    assert!(wait_for(Duration::from_secs(5), || mic.starts() == 1));

    mic.say("what is two plus two", true);
    // the loop wakes at the quiet-period deadline without further input
    assert!(wait_for(Duration::from_secs(5), || mic.stops() == 1));

    mic.end();
    assert!(wait_for(Duration::from_secs(5), || {
        handle.view().state() == ConversationState::Speaking
    }));
    assert_eq!(speaker.spoken(), vec!["Four"]);
    assert_eq!(mic.stops(), 1);

    handle.send_command(AppCommand::Shutdown).unwrap();
    worker.join().unwrap();
}

#[test]
fn test_shutdown_event_is_emitted() {
    let (orchestrator, handle) = Orchestrator::new(
        AssistantConfig::default(),
        ScriptedModel::new(),
        Capabilities::none(),
    )
    .unwrap();
    let worker = orchestrator.start().unwrap();

    handle.shutdown().unwrap();
    worker.join().unwrap();

    let mut saw_shutdown = false;
    while let Some(event) = handle.try_recv_event() {
        saw_shutdown |= event == OrchestratorEvent::Shutdown;
    }
    assert!(saw_shutdown);
}

#[test]
fn test_dropping_handle_stops_loop() {
    let (orchestrator, handle) = Orchestrator::new(
        AssistantConfig::default(),
        ScriptedModel::new(),
        Capabilities::none(),
    )
    .unwrap();
    let worker = orchestrator.start().unwrap();

    drop(handle);
    assert!(wait_for(Duration::from_secs(5), || worker.is_finished()));
}
