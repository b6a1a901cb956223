//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `./agentmind.json`) and environment.
//! Environment variables override file values; blank variables are ignored.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Generative-language provider settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Graph store (Redis protocol) settings.
    #[serde(default)]
    pub graph: GraphConfig,

    /// Retry policy for transient provider failures.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Gateway bind, port, and CORS settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP (default 8000).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0").
    #[serde(default = "default_gateway_bind")]
    pub bind: String,

    /// Allowed CORS origins: comma-separated list or a JSON array literal.
    #[serde(default = "default_cors_allow_origins")]
    pub cors_allow_origins: String,
}

fn default_gateway_port() -> u16 {
    8000
}

fn default_gateway_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_cors_allow_origins() -> String {
    "http://localhost:5173".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
            cors_allow_origins: default_cors_allow_origins(),
        }
    }
}

impl GatewayConfig {
    /// Parsed CORS origins. Accepts `["a","b"]` or `a, b`; blank entries are dropped.
    pub fn cors_allow_origins_list(&self) -> Vec<String> {
        let raw = self.cors_allow_origins.trim();
        if raw.is_empty() {
            return Vec::new();
        }
        if raw.starts_with('[') && raw.ends_with(']') {
            if let Ok(serde_json::Value::Array(items)) = serde_json::from_str(raw) {
                return items
                    .iter()
                    .map(|item| match item {
                        serde_json::Value::String(s) => s.trim().to_string(),
                        other => other.to_string().trim().to_string(),
                    })
                    .filter(|s| !s.is_empty())
                    .collect();
            }
        }
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Provider credential, models, and timeout budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// API key. When absent every call runs in fallback mode. Overridden by GOOGLE_API_KEY env.
    pub api_key: Option<String>,

    #[serde(default = "default_provider_base_url")]
    pub base_url: String,

    /// Model used by the chat endpoint.
    #[serde(default = "default_model")]
    pub chat_model: String,

    /// Model used by the analysis endpoint.
    #[serde(default = "default_model")]
    pub analysis_model: String,

    #[serde(default = "default_provider_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_provider_request_timeout")]
    pub request_timeout_secs: u64,

    /// Extra tokens that classify content as negative in fallback mode.
    #[serde(default = "default_profanity")]
    pub profanity: Vec<String>,
}

fn default_provider_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_provider_connect_timeout() -> u64 {
    5
}

fn default_provider_request_timeout() -> u64 {
    15
}

fn default_profanity() -> Vec<String> {
    vec!["fuck".to_string()]
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_provider_base_url(),
            chat_model: default_model(),
            analysis_model: default_model(),
            connect_timeout_secs: default_provider_connect_timeout(),
            request_timeout_secs: default_provider_request_timeout(),
            profanity: default_profanity(),
        }
    }
}

impl ProviderConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Graph store connection target and pool limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphConfig {
    #[serde(default = "default_graph_host")]
    pub host: String,

    #[serde(default = "default_graph_port")]
    pub port: u16,

    /// Optional AUTH password. Overridden by FALKORDB_PASSWORD env.
    pub password: Option<String>,

    /// Graph name targeted by queries.
    #[serde(default = "default_graph_name")]
    pub graph: String,

    #[serde(default = "default_graph_max_connections")]
    pub max_connections: usize,

    #[serde(default = "default_graph_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_graph_timeout")]
    pub socket_timeout_secs: u64,
}

fn default_graph_host() -> String {
    "falkordb".to_string()
}

fn default_graph_port() -> u16 {
    6379
}

fn default_graph_name() -> String {
    "agentmind".to_string()
}

fn default_graph_max_connections() -> usize {
    32
}

fn default_graph_timeout() -> u64 {
    5
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            host: default_graph_host(),
            port: default_graph_port(),
            password: None,
            graph: default_graph_name(),
            max_connections: default_graph_max_connections(),
            connect_timeout_secs: default_graph_timeout(),
            socket_timeout_secs: default_graph_timeout(),
        }
    }
}

impl GraphConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_secs(self.socket_timeout_secs)
    }
}

/// Bounded retry for transient failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    2
}

fn default_base_delay_ms() -> u64 {
    200
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

/// Read an env var, trimmed; None when unset or blank.
fn env_nonblank(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

/// Apply environment overrides through a lookup function (the process env in production).
pub fn apply_env_overrides_with<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("GOOGLE_API_KEY") {
        config.provider.api_key = Some(v);
    }
    if let Some(v) = lookup("GEMINI_CHAT_MODEL") {
        config.provider.chat_model = v;
    }
    if let Some(v) = lookup("GEMINI_ANALYSIS_MODEL") {
        config.provider.analysis_model = v;
    }
    if let Some(v) = lookup("FALKORDB_HOST") {
        config.graph.host = v;
    }
    if let Some(port) = lookup("FALKORDB_PORT").and_then(|v| v.parse().ok()) {
        config.graph.port = port;
    }
    if let Some(v) = lookup("FALKORDB_PASSWORD") {
        config.graph.password = Some(v);
    }
    if let Some(v) = lookup("FALKORDB_GRAPH") {
        config.graph.graph = v;
    }
    if let Some(v) = lookup("API_HOST") {
        config.gateway.bind = v;
    }
    if let Some(port) = lookup("API_PORT").and_then(|v| v.parse().ok()) {
        config.gateway.port = port;
    }
    if let Some(v) = lookup("CORS_ALLOW_ORIGINS") {
        config.gateway.cors_allow_origins = v;
    }
}

/// Resolve the provider credential. A blank key counts as absent.
pub fn resolve_api_key(config: &Config) -> Option<String> {
    config
        .provider
        .api_key
        .as_ref()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("AGENTMIND_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("agentmind.json"))
}

/// Load config from the given path (or AGENTMIND_CONFIG_PATH), then apply env overrides.
/// Missing file => default config. Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let mut config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    apply_env_overrides_with(&mut config, env_nonblank);
    Ok((config, path))
}
