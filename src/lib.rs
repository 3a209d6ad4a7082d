//! Parley - a voice and text conversational front-end for remote language models
//!
//! The crate is organised around a single-threaded orchestrator that merges
//! spoken and typed input into one conversation, dispatches it to a remote
//! model and speaks the reply back.

pub mod integration;
pub mod llm;
pub mod messages;
pub mod speech;

use thiserror::Error;

pub use integration::{
    AppCommand, AssistantConfig, ConversationState, ConversationView, Notice, Orchestrator,
    OrchestratorEvent, OrchestratorHandle,
};
pub use messages::{ConversationStore, Role, Turn};

/// Platform capability that may be missing at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    SpeechRecognition,
    SpeechSynthesis,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::SpeechRecognition => write!(f, "speech recognition"),
            Capability::SpeechSynthesis => write!(f, "speech synthesis"),
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum ParleyError {
    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(Capability),

    #[error("Command rejected: {0}")]
    Rejected(String),

    #[error("Capture error: {0}")]
    CaptureError(String),

    #[error("Playback error: {0}")]
    PlaybackError(String),

    #[error("Dispatch error: {0}")]
    DispatchError(String),

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<std::io::Error> for ParleyError {
    fn from(e: std::io::Error) -> Self {
        ParleyError::IOError(e.to_string())
    }
}

impl From<reqwest::Error> for ParleyError {
    fn from(e: reqwest::Error) -> Self {
        ParleyError::HttpError(e.to_string())
    }
}

impl From<serde_json::Error> for ParleyError {
    fn from(e: serde_json::Error) -> Self {
        ParleyError::SerializationError(e.to_string())
    }
}

impl ParleyError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            // The platform will not grow a capability mid-session
            ParleyError::CapabilityUnavailable(_) => false,
            ParleyError::Rejected(_) => true,
            ParleyError::CaptureError(_) => true,
            ParleyError::PlaybackError(_) => true,
            ParleyError::DispatchError(_) => true,
            ParleyError::HttpError(_) => true,
            ParleyError::ConfigError(_) => false,
            ParleyError::ChannelError(_) => false,
            ParleyError::IOError(_) => false,
            ParleyError::SerializationError(_) => true,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            ParleyError::CapabilityUnavailable(capability) => {
                format!("Your platform does not support {capability}. Text chat is still available.")
            }
            ParleyError::Rejected(_) => "Please wait for the current reply.".to_string(),
            ParleyError::CaptureError(_) => {
                "Speech recognition failed. Please try again.".to_string()
            }
            ParleyError::PlaybackError(_) => {
                "Could not speak the reply. It is shown as text.".to_string()
            }
            ParleyError::DispatchError(_) | ParleyError::HttpError(_) => {
                "Could not reach the assistant. Please try again.".to_string()
            }
            ParleyError::ConfigError(_) => {
                "Configuration error. Please check settings.".to_string()
            }
            ParleyError::ChannelError(_) => {
                "Internal communication error. Please restart the application.".to_string()
            }
            ParleyError::IOError(_) => "File system error occurred.".to_string(),
            ParleyError::SerializationError(_) => {
                "The assistant sent a response that could not be read.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ParleyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_errors_are_permanent() {
        let err = ParleyError::CapabilityUnavailable(Capability::SpeechRecognition);
        assert!(!err.is_recoverable());
        assert!(err.user_message().contains("speech recognition"));
    }

    #[test]
    fn test_dispatch_errors_are_recoverable() {
        assert!(ParleyError::DispatchError("timeout".into()).is_recoverable());
        assert!(ParleyError::HttpError("503".into()).is_recoverable());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ParleyError = io.into();
        assert!(matches!(err, ParleyError::IOError(_)));
    }
}
