//! Remote model configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default endpoint of the chat relay
pub const DEFAULT_RELAY_ENDPOINT: &str = "http://localhost:3000/api/chat";

/// Default base URL of the Gemini REST API
pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Which wire protocol the model client speaks
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// A chat relay taking `{systemMessage, chatHistory}` and answering `{reply}`
    #[default]
    Relay,
    /// Google Gemini `generateContent`
    Gemini,
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "relay" => Ok(Backend::Relay),
            "gemini" => Ok(Backend::Gemini),
            other => Err(format!("unknown backend: {}", other)),
        }
    }
}

/// Configuration for the remote model client
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Wire protocol
    pub backend: Backend,

    /// Endpoint override; the backend's default is used when absent
    pub endpoint: Option<String>,

    /// Model identifier (Gemini backend)
    pub model_id: String,

    /// Environment variable holding the API key (Gemini backend)
    pub api_key_env: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Nucleus sampling parameter
    pub top_p: f32,

    /// Upper bound on generated tokens
    pub max_output_tokens: u32,

    /// Transport timeout in milliseconds; none means the transport default
    pub timeout_ms: Option<u64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Relay,
            endpoint: None,
            model_id: "gemini-1.5-flash".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            temperature: 0.7,
            top_p: 0.9,
            max_output_tokens: 1000,
            timeout_ms: None,
        }
    }
}

impl ModelConfig {
    /// Create a configuration for the given backend
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            ..Default::default()
        }
    }

    /// Set the endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the model identifier
    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Set the temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the transport timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Effective endpoint
    pub fn endpoint(&self) -> &str {
        match (&self.endpoint, self.backend) {
            (Some(endpoint), _) => endpoint,
            (None, Backend::Relay) => DEFAULT_RELAY_ENDPOINT,
            (None, Backend::Gemini) => DEFAULT_GEMINI_ENDPOINT,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.endpoint().trim().is_empty() {
            return Err("model endpoint must not be empty".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!("temperature out of range: {}", self.temperature));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(format!("top_p out of range: {}", self.top_p));
        }
        if self.max_output_tokens == 0 {
            return Err("max_output_tokens must be positive".to_string());
        }
        if self.backend == Backend::Gemini && self.model_id.trim().is_empty() {
            return Err("gemini backend needs a model_id".to_string());
        }
        Ok(())
    }
}
