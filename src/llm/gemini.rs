//! Client for the Gemini `generateContent` REST API

use crate::llm::client::{http_client, ModelClient, ModelRequest};
use crate::llm::config::ModelConfig;
use crate::messages::Role;
use crate::{ParleyError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateRequest {
    contents: Vec<Content>,
    system_instruction: Content,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Candidate {
    content: Option<Content>,
}

fn gemini_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

impl GenerateRequest {
    /// The language directive rides along as a trailing part of the last user turn
    pub(crate) fn build(request: &ModelRequest, config: &ModelConfig) -> Self {
        let mut contents: Vec<Content> = request
            .turns
            .iter()
            .map(|turn| Content {
                role: Some(gemini_role(turn.role()).to_string()),
                parts: vec![Part {
                    text: turn.text().to_string(),
                }],
            })
            .collect();

        if !request.language_directive.is_empty() {
            let directive = Part {
                text: request.language_directive.clone(),
            };
            match contents.last_mut() {
                Some(last) if last.role.as_deref() == Some("user") => last.parts.push(directive),
                _ => contents.push(Content {
                    role: Some("user".to_string()),
                    parts: vec![directive],
                }),
            }
        }

        Self {
            contents,
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: request.system_instruction.clone(),
                }],
            },
            generation_config: GenerationConfig {
                temperature: config.temperature,
                top_p: config.top_p,
                max_output_tokens: config.max_output_tokens,
            },
        }
    }
}

impl GenerateResponse {
    pub(crate) fn into_reply(self) -> Result<String> {
        let text = self
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts.into_iter().next())
            .map(|part| part.text)
            .ok_or_else(|| ParleyError::DispatchError("No response from Gemini".to_string()))?;

        let text = text.trim_end().to_string();
        if text.trim().is_empty() {
            return Err(ParleyError::DispatchError("No response from Gemini".to_string()));
        }
        Ok(text)
    }
}

pub struct GeminiClient {
    http: reqwest::Client,
    config: ModelConfig,
    api_key: String,
}

impl GeminiClient {
    pub fn new(config: &ModelConfig, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: http_client(config)?,
            config: config.clone(),
            api_key: api_key.into(),
        })
    }

    /// Read the API key from the environment variable named in the config
    pub fn from_env(config: &ModelConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            ParleyError::ConfigError(format!("{} is not set", config.api_key_env))
        })?;
        Self::new(config, api_key)
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint().trim_end_matches('/'),
            self.config.model_id
        )
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn complete(&self, request: &ModelRequest) -> Result<String> {
        request.validate()?;

        let body = GenerateRequest::build(request, &self.config);
        debug!(turns = request.turns.len(), model = %self.config.model_id, "sending gemini request");

        let response = self
            .http
            .post(self.url())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ParleyError::HttpError(format!(
                "gemini returned {}: {}",
                status,
                detail.trim()
            )));
        }

        let parsed: GenerateResponse = response.json().await?;
        parsed.into_reply()
    }
}
