//! Remote model boundary: ordered turns in, reply text or error out

use crate::llm::config::{Backend, ModelConfig};
use crate::llm::gemini::GeminiClient;
use crate::llm::relay::RelayClient;
use crate::messages::Turn;
use crate::{ParleyError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// How the user produced the utterance being answered
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InteractionMode {
    Text,
    Voice,
}

impl std::fmt::Display for InteractionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InteractionMode::Text => write!(f, "text"),
            InteractionMode::Voice => write!(f, "voice"),
        }
    }
}

/// Everything the remote model needs to answer one turn
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelRequest {
    /// Behavioural instruction for this mode
    pub system_instruction: String,
    /// Conversation so far, ending with the user's new turn
    pub turns: Vec<Turn>,
    /// Tells the model to reply in the utterance's language
    pub language_directive: String,
}

impl ModelRequest {
    /// Reject requests the remote side would refuse anyway
    pub fn validate(&self) -> Result<()> {
        if self.turns.is_empty() {
            return Err(ParleyError::DispatchError(
                "chat history is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Ask the model for a reply; the raw reply text is returned unsanitized
    async fn complete(&self, request: &ModelRequest) -> Result<String>;
}

/// Build the client selected by `config`
pub fn build_client(config: &ModelConfig) -> Result<Arc<dyn ModelClient>> {
    config.validate().map_err(ParleyError::ConfigError)?;
    Ok(match config.backend {
        Backend::Relay => Arc::new(RelayClient::new(config)?),
        Backend::Gemini => Arc::new(GeminiClient::from_env(config)?),
    })
}

pub(crate) fn http_client(config: &ModelConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = config.timeout() {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_history_is_rejected() {
        let request = ModelRequest {
            system_instruction: "be nice".into(),
            turns: Vec::new(),
            language_directive: "match language".into(),
        };
        assert!(matches!(request.validate(), Err(ParleyError::DispatchError(_))));
    }

    #[test]
    fn test_build_relay_client() {
        let config = ModelConfig::default();
        assert!(build_client(&config).is_ok());
    }

    #[test]
    fn test_build_client_rejects_invalid_config() {
        let config = ModelConfig::default().with_temperature(-1.0);
        assert!(matches!(build_client(&config), Err(ParleyError::ConfigError(_))));
    }
}
