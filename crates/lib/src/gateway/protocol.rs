//! HTTP request/response bodies for the agent and graph endpoints.

use crate::agent::Analysis;
use crate::gateway::error::ApiError;
use crate::llm::{Content, Role};
use serde::{Deserialize, Serialize};

/// Who wrote a message in the client's transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

impl Sender {
    /// Provider role: `user` stays `user`, `ai` becomes `model`.
    pub fn role(self) -> Role {
        match self {
            Sender::User => Role::User,
            Sender::Ai => Role::Model,
        }
    }

    /// Label prepended to analysed text.
    pub fn label(self) -> &'static str {
        match self {
            Sender::User => "User",
            Sender::Ai => "AI",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessagePayload {
    pub id: String,
    pub text: String,
    pub sender: Sender,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSettings {
    pub system_prompt: String,
    /// JSON-encoded schema document, parsed once by [`AgentSettings::parse_schema`].
    pub json_schema: String,
}

impl AgentSettings {
    pub fn parse_schema(&self) -> Result<serde_json::Value, ApiError> {
        serde_json::from_str(&self.json_schema)
            .map_err(|e| ApiError::Validation(format!("Invalid jsonSchema in settings: {}", e)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub message: ChatMessagePayload,
    pub settings: AgentSettings,
}

impl AnalysisRequest {
    /// Text sent for analysis: `"User: ..."` or `"AI: ..."`.
    pub fn content(&self) -> String {
        format!("{}: {}", self.message.sender.label(), self.message.text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    pub message_id: String,
    pub analysis: Analysis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRequest {
    pub messages: Vec<ChatMessagePayload>,
    pub settings: AgentSettings,
}

impl ConversationRequest {
    /// Transcript in provider form, order preserved.
    pub fn contents(&self) -> Vec<Content> {
        self.messages
            .iter()
            .map(|m| Content::text(m.sender.role(), m.text.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub message: String,
}

/// Query string for `POST /api/graph/query`.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQueryParams {
    pub q: String,
}
