//! Remote model access
//!
//! This module handles everything between a finished user turn and the
//! assistant text recorded for it:
//! - Shortcut answers for identity questions
//! - Request construction and the single in-flight request
//! - Relay and Gemini wire clients
//! - Sanitizing raw model output

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod gemini;
pub mod prompts;
pub mod relay;
pub mod sanitizer;
pub mod shortcuts;

pub use client::{build_client, InteractionMode, ModelClient, ModelRequest};
pub use config::{Backend, ModelConfig};
pub use dispatcher::{
    Completion, Dispatch, DispatchError, DispatchEvent, PendingRequest, RequestDispatcher,
    RequestId, FALLBACK_REPLY,
};
pub use gemini::GeminiClient;
pub use prompts::PromptConfig;
pub use relay::RelayClient;
pub use sanitizer::{plain_text, sanitize, segments, Segment};
pub use shortcuts::{ShortcutRule, ShortcutTable};
