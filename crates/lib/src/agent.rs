//! Agent gateway: chat and structured analysis against the provider.
//!
//! Without a configured credential nothing leaves the process; replies come from a local
//! echo and a keyword sentiment classifier. With a credential, provider responses are parsed
//! defensively: an unexpected shape yields an empty value, never an error.

use crate::config::{self, Config};
use crate::llm::{
    first_candidate_text, Content, GeminiClient, GenerateRequest, GenerationConfig, ProviderError,
    Role,
};
use crate::retry::RetryPolicy;
use serde_json::{Map, Value};

/// Maximum length, in characters, of the fallback echo reply.
pub const ECHO_MAX_CHARS: usize = 1024;

const ECHO_PREFIX: &str = "Echo: ";

const POSITIVE_MARKERS: &[&str] = &["good", "great", ":)", "thanks"];
const NEGATIVE_MARKERS: &[&str] = &["bad", "terrible", ":("];

/// Structured analysis result: an open JSON object.
pub type Analysis = Map<String, Value>;

/// How a gateway value was produced. Callers see only the inner value; the variant is for logs.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// Parsed from a well-formed provider response.
    Generated(T),
    /// Produced locally because no credential is configured.
    Fallback(T),
    /// Provider answered but the response shape was unexpected; value is the empty default.
    Defaulted(T),
}

impl<T> Outcome<T> {
    pub fn value(&self) -> &T {
        match self {
            Outcome::Generated(v) | Outcome::Fallback(v) | Outcome::Defaulted(v) => v,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Outcome::Generated(v) | Outcome::Fallback(v) | Outcome::Defaulted(v) => v,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Generated(_) => "generated",
            Outcome::Fallback(_) => "fallback",
            Outcome::Defaulted(_) => "defaulted",
        }
    }
}

/// Three-bucket keyword sentiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

/// Classify lowercased `content`. Positive markers win over negative ones.
pub fn classify_sentiment(content: &str, profanity: &[String]) -> Sentiment {
    let lower = content.to_lowercase();
    if POSITIVE_MARKERS.iter().any(|m| lower.contains(m)) {
        Sentiment::Positive
    } else if NEGATIVE_MARKERS.iter().any(|m| lower.contains(m))
        || profanity
            .iter()
            .map(|p| p.trim().to_lowercase())
            .any(|p| !p.is_empty() && lower.contains(&p))
    {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

/// "Echo: " + text of the most recent user turn, truncated to [`ECHO_MAX_CHARS`].
pub fn echo_fallback(messages: &[Content]) -> String {
    let last_user = messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(Content::first_text)
        .unwrap_or("");
    let mut reply = String::with_capacity(ECHO_PREFIX.len() + last_user.len());
    reply.push_str(ECHO_PREFIX);
    reply.push_str(last_user);
    if reply.chars().count() > ECHO_MAX_CHARS {
        reply = reply.chars().take(ECHO_MAX_CHARS).collect();
    }
    reply
}

/// Build the analysis payload. An empty system prompt is omitted rather than sent blank.
pub fn analysis_request(content: &str, system_prompt: &str, json_schema: &Value) -> GenerateRequest {
    GenerateRequest {
        contents: vec![Content::user(content)],
        generation_config: Some(GenerationConfig::json(json_schema.clone())),
        system_instruction: if system_prompt.is_empty() {
            None
        } else {
            Some(Content::text(Role::System, system_prompt))
        },
    }
}

/// Chat reply text from a provider response; "" when the shape is unexpected.
pub fn parse_chat_response(response: &Value) -> Outcome<String> {
    match first_candidate_text(response) {
        Some(text) => Outcome::Generated(text.to_string()),
        None => Outcome::Defaulted(String::new()),
    }
}

/// Analysis object from a provider response; `{}` when the shape is unexpected or the
/// candidate text is not a JSON object.
pub fn parse_analysis_response(response: &Value) -> Outcome<Analysis> {
    let Some(text) = first_candidate_text(response) else {
        return Outcome::Defaulted(Analysis::new());
    };
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Outcome::Generated(map),
        Ok(other) => {
            log::debug!("analysis: candidate JSON is not an object ({})", json_kind(&other));
            Outcome::Defaulted(Analysis::new())
        }
        Err(e) => {
            log::debug!("analysis: candidate text is not JSON: {}", e);
            Outcome::Defaulted(Analysis::new())
        }
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Translates domain requests into provider calls, with fallback when no credential is set.
pub struct AgentGateway {
    /// None = fallback mode.
    client: Option<GeminiClient>,
    chat_model: String,
    analysis_model: String,
    profanity: Vec<String>,
    retry: RetryPolicy,
}

impl AgentGateway {
    pub fn new(
        client: Option<GeminiClient>,
        chat_model: impl Into<String>,
        analysis_model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            chat_model: chat_model.into(),
            analysis_model: analysis_model.into(),
            profanity: Vec::new(),
            retry: RetryPolicy::none(),
        }
    }

    /// Build from config. A missing or blank credential selects fallback mode.
    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        let provider = &config.provider;
        let client = match config::resolve_api_key(config) {
            Some(key) => Some(GeminiClient::new(
                Some(provider.base_url.clone()),
                key,
                provider.connect_timeout(),
                provider.request_timeout(),
            )?),
            None => {
                log::info!("no provider credential configured; agent runs in fallback mode");
                None
            }
        };
        Ok(Self::new(client, &provider.chat_model, &provider.analysis_model)
            .with_profanity(provider.profanity.clone())
            .with_retry(RetryPolicy::from_config(&config.retry)))
    }

    pub fn with_profanity(mut self, profanity: Vec<String>) -> Self {
        self.profanity = profanity;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn is_fallback(&self) -> bool {
        self.client.is_none()
    }

    /// One chat turn over the full ordered history. Roles must already be normalized
    /// (`ai` senders mapped to `Role::Model`).
    pub async fn converse(&self, messages: &[Content]) -> Result<Outcome<String>, ProviderError> {
        let Some(client) = &self.client else {
            return Ok(Outcome::Fallback(echo_fallback(messages)));
        };
        let body = GenerateRequest {
            contents: messages.to_vec(),
            generation_config: None,
            system_instruction: None,
        };
        let response = self
            .retry
            .run(|| client.generate_content(&self.chat_model, &body))
            .await?;
        let outcome = parse_chat_response(&response);
        if let Outcome::Defaulted(_) = outcome {
            log::warn!("converse: unexpected provider response shape, replying empty");
        }
        Ok(outcome)
    }

    /// Structured analysis of `content` in JSON mode against an already-parsed schema.
    pub async fn analyze(
        &self,
        content: &str,
        system_prompt: &str,
        json_schema: &Value,
    ) -> Result<Outcome<Analysis>, ProviderError> {
        let Some(client) = &self.client else {
            let sentiment = classify_sentiment(content, &self.profanity);
            let mut analysis = Analysis::new();
            analysis.insert(
                "sentiment".to_string(),
                Value::String(sentiment.as_str().to_string()),
            );
            return Ok(Outcome::Fallback(analysis));
        };
        let body = analysis_request(content, system_prompt, json_schema);
        let response = self
            .retry
            .run(|| client.generate_content(&self.analysis_model, &body))
            .await?;
        let outcome = parse_analysis_response(&response);
        if let Outcome::Defaulted(_) = outcome {
            log::warn!("analyze: unexpected provider response, returning empty analysis");
        }
        Ok(outcome)
    }
}
