//! Integration layer
//!
//! Wires the speech, llm and messages modules into a running conversation:
//! configuration loading, the orchestrator state machine and the state it
//! shares with renderers.

pub mod config;
pub mod orchestrator;
pub mod state;

pub use config::{AssistantConfig, CaptureConfig, PlaybackConfig};
pub use orchestrator::{Capabilities, Orchestrator, OrchestratorHandle};
pub use state::{
    AppCommand, ConversationState, ConversationView, Notice, OrchestratorEvent,
    SharedConversationView,
};
