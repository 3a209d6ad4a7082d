//! System instructions attached to outgoing model requests

use crate::llm::client::InteractionMode;
use serde::{Deserialize, Serialize};

/// Instruction for replies that will be spoken aloud
pub const VOICE_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant. Answer clearly and correctly.";

/// Instruction for typed chat replies
pub const TEXT_SYSTEM_PROMPT: &str = "Reply in a natural and conversational way. \
Keep it short and simple, without extra headings or unnecessary details.";

/// Asks the model to answer in the language the user wrote or spoke in
pub const LANGUAGE_DIRECTIVE: &str = "Detect the language of the user's message and reply \
in the same language naturally. Respond concisely and conversationally.";

/// Prompt texts, overridable from the configuration file
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub voice_system: String,
    pub text_system: String,
    pub language_directive: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            voice_system: VOICE_SYSTEM_PROMPT.to_string(),
            text_system: TEXT_SYSTEM_PROMPT.to_string(),
            language_directive: LANGUAGE_DIRECTIVE.to_string(),
        }
    }
}

impl PromptConfig {
    /// System instruction for replies in the given mode
    pub fn system_for(&self, mode: InteractionMode) -> &str {
        match mode {
            InteractionMode::Voice => &self.voice_system,
            InteractionMode::Text => &self.text_system,
        }
    }
}
