//! Client for a chat relay endpoint
//!
//! The relay takes the system message and the ordered chat history and
//! answers with `{"reply": "..."}`, or `{"error": "..."}` alongside a
//! non-success status.

use crate::llm::client::{http_client, ModelClient, ModelRequest};
use crate::llm::config::ModelConfig;
use crate::messages::Turn;
use crate::{ParleyError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RelayPayload<'a> {
    system_message: &'a str,
    language_directive: &'a str,
    chat_history: &'a [Turn],
}

impl<'a> RelayPayload<'a> {
    pub(crate) fn from_request(request: &'a ModelRequest) -> Self {
        Self {
            system_message: &request.system_instruction,
            language_directive: &request.language_directive,
            chat_history: &request.turns,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RelayResponse {
    reply: Option<String>,
    error: Option<String>,
}

impl RelayResponse {
    pub(crate) fn into_reply(self) -> Result<String> {
        match (self.reply, self.error) {
            (Some(reply), _) if !reply.trim().is_empty() => Ok(reply),
            (_, Some(error)) => Err(ParleyError::DispatchError(error)),
            _ => Err(ParleyError::DispatchError(
                "relay response carried no reply".to_string(),
            )),
        }
    }
}

pub struct RelayClient {
    http: reqwest::Client,
    endpoint: String,
}

impl RelayClient {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        Ok(Self {
            http: http_client(config)?,
            endpoint: config.endpoint().to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ModelClient for RelayClient {
    async fn complete(&self, request: &ModelRequest) -> Result<String> {
        request.validate()?;

        debug!(turns = request.turns.len(), endpoint = %self.endpoint, "sending relay request");
        let response = self
            .http
            .post(&self.endpoint)
            .json(&RelayPayload::from_request(request))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        parse_response(status, &body)
    }
}

/// Interpret a relay response body for the given status
pub(crate) fn parse_response(status: reqwest::StatusCode, body: &str) -> Result<String> {
    let parsed = serde_json::from_str::<RelayResponse>(body);
    if !status.is_success() {
        let reason = parsed
            .ok()
            .and_then(|body| body.error)
            .unwrap_or_else(|| status.to_string());
        return Err(ParleyError::HttpError(format!("relay returned {}: {}", status, reason)));
    }

    parsed
        .map_err(|e| ParleyError::DispatchError(format!("malformed relay response: {}", e)))?
        .into_reply()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use serde_json::json;

    fn request() -> ModelRequest {
        ModelRequest {
            system_instruction: "Answer clearly.".into(),
            turns: vec![Turn::user("Hello"), Turn::assistant("Hi"), Turn::user("How are you?")],
            language_directive: "Reply in kind.".into(),
        }
    }

    #[test]
    fn test_payload_shape() {
        let request = request();
        let payload = serde_json::to_value(RelayPayload::from_request(&request)).unwrap();
        assert_eq!(
            payload,
            json!({
                "systemMessage": "Answer clearly.",
                "languageDirective": "Reply in kind.",
                "chatHistory": [
                    {"role": "user", "text": "Hello"},
                    {"role": "assistant", "text": "Hi"},
                    {"role": "user", "text": "How are you?"}
                ]
            })
        );
    }

    #[test]
    fn test_reply_is_extracted() {
        let body: RelayResponse = serde_json::from_value(json!({"reply": "Hi there"})).unwrap();
        assert_eq!(body.into_reply().unwrap(), "Hi there");
    }

    #[test]
    fn test_missing_or_blank_reply_is_an_error() {
        let body: RelayResponse = serde_json::from_value(json!({})).unwrap();
        assert!(body.into_reply().is_err());

        let body: RelayResponse = serde_json::from_value(json!({"reply": "  "})).unwrap();
        assert!(body.into_reply().is_err());

        let body: RelayResponse =
            serde_json::from_value(json!({"error": "API key not found"})).unwrap();
        let err = body.into_reply().unwrap_err();
        assert!(err.to_string().contains("API key not found"));
    }

    #[test]
    fn test_malformed_success_body_keeps_parse_error() {
        let err = parse_response(StatusCode::OK, "<html>gateway</html>").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("malformed relay response"), "{}", message);
        assert!(!message.contains("carried no reply"));
    }

    #[test]
    fn test_error_status_reports_reason() {
        let err = parse_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error": "API key not found"}"#,
        )
        .unwrap_err();
        assert!(matches!(&err, ParleyError::HttpError(m) if m.contains("API key not found")));

        let err = parse_response(StatusCode::BAD_GATEWAY, "upstream down").unwrap_err();
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn test_success_body_is_parsed() {
        assert_eq!(
            parse_response(StatusCode::OK, r#"{"reply": "Hi there"}"#).unwrap(),
            "Hi there"
        );
    }
}
