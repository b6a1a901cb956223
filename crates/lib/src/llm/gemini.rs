//! Generative Language REST client (`generateContent`).
//!
//! One `reqwest::Client` per process carries the timeout budget. Responses are returned as raw
//! JSON so the agent layer can walk them defensively.

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Client for the provider's `models/{model}:generateContent` endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Timeout, connection failure, or a server-side (5xx) status. Eligible for retry.
    #[error("provider unavailable: {0}")]
    Transient(String),
    /// Client-side (4xx) status: bad credential, quota, bad request.
    #[error("provider rejected request: {status} {body}")]
    Terminal { status: u16, body: String },
    #[error("provider request failed: {0}")]
    Request(#[from] reqwest::Error),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }

    /// Classify a failed send: timeouts and connect failures are transient.
    fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            ProviderError::Transient(e.to_string())
        } else {
            ProviderError::Request(e)
        }
    }

    /// Classify a non-success status.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
            ProviderError::Transient(format!("{} {}", status, body))
        } else {
            ProviderError::Terminal {
                status: status.as_u16(),
                body,
            }
        }
    }
}

impl GeminiClient {
    pub fn new(
        base_url: Option<String>,
        api_key: impl Into<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            base_url,
            api_key: api_key.into(),
            client,
        })
    }

    /// POST /models/{model}:generateContent — returns the response body as JSON.
    /// A success body that is not JSON comes back as `Value::Null`.
    pub async fn generate_content(
        &self,
        model: &str,
        body: &GenerateRequest,
    ) -> Result<serde_json::Value, ProviderError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        let res = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(ProviderError::from_transport)?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, body));
        }
        let text = res.text().await.map_err(ProviderError::from_transport)?;
        match serde_json::from_str(&text) {
            Ok(v) => Ok(v),
            Err(e) => {
                log::warn!("provider returned a non-JSON success body: {}", e);
                Ok(serde_json::Value::Null)
            }
        }
    }
}

/// Conversation role on the wire. Callers map `ai` senders to `Model` before the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

/// One turn: `{ "role", "parts": [{ "text" }] }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![Part { text: text.into() }],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::text(Role::User, text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::text(Role::Model, text)
    }

    /// Text of the first part, or "" when there are no parts.
    pub fn first_text(&self) -> &str {
        self.parts.first().map(|p| p.text.as_str()).unwrap_or("")
    }
}

/// JSON-mode output constrained by a response schema.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationConfig {
    pub response_mime_type: String,
    pub response_schema: serde_json::Value,
}

impl GenerationConfig {
    pub fn json(schema: serde_json::Value) -> Self {
        Self {
            response_mime_type: "application/json".to_string(),
            response_schema: schema,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
}

/// `candidates[0].content.parts[0].text`, or None if any level is missing or mistyped.
pub fn first_candidate_text(response: &serde_json::Value) -> Option<&str> {
    response
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_omits_absent_optional_fields() {
        let req = GenerateRequest {
            contents: vec![Content::user("hi"), Content::model("hello")],
            generation_config: None,
            system_instruction: None,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(
            v,
            json!({
                "contents": [
                    {"role": "user", "parts": [{"text": "hi"}]},
                    {"role": "model", "parts": [{"text": "hello"}]}
                ]
            })
        );
    }

    #[test]
    fn request_with_json_mode_and_system_instruction() {
        let req = GenerateRequest {
            contents: vec![Content::user("x")],
            generation_config: Some(GenerationConfig::json(json!({"type": "object"}))),
            system_instruction: Some(Content::text(Role::System, "be terse")),
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["generation_config"]["response_mime_type"], "application/json");
        assert_eq!(v["generation_config"]["response_schema"], json!({"type": "object"}));
        assert_eq!(v["system_instruction"]["role"], "system");
        assert_eq!(v["system_instruction"]["parts"][0]["text"], "be terse");
    }

    #[test]
    fn first_candidate_text_walks_expected_shape() {
        let v = json!({"candidates": [{"content": {"parts": [{"text": "a"}, {"text": "b"}]}}]});
        assert_eq!(first_candidate_text(&v), Some("a"));
    }

    #[test]
    fn first_candidate_text_tolerates_missing_levels() {
        for v in [
            json!({}),
            json!({"candidates": []}),
            json!({"candidates": [{}]}),
            json!({"candidates": [{"content": {"parts": []}}]}),
            json!({"candidates": [{"content": {"parts": [{"text": 3}]}}]}),
            json!({"candidates": "nope"}),
            serde_json::Value::Null,
        ] {
            assert_eq!(first_candidate_text(&v), None, "{}", v);
        }
    }

    #[test]
    fn status_classification() {
        assert!(ProviderError::from_status(StatusCode::SERVICE_UNAVAILABLE, String::new())
            .is_transient());
        assert!(ProviderError::from_status(StatusCode::REQUEST_TIMEOUT, String::new())
            .is_transient());
        assert!(!ProviderError::from_status(StatusCode::UNAUTHORIZED, String::new())
            .is_transient());
        assert!(!ProviderError::from_status(StatusCode::TOO_MANY_REQUESTS, String::new())
            .is_transient());
    }
}
