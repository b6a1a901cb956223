//! Gateway HTTP server: health probes, agent endpoints, and the graph pass-through.

use crate::agent::AgentGateway;
use crate::config::Config;
use crate::gateway::error::ApiError;
use crate::gateway::protocol::{
    AnalysisRequest, AnalysisResponse, ConversationRequest, ConversationResponse,
    GraphQueryParams,
};
use crate::graph::GraphClient;
use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    http::HeaderValue,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

/// Shared state for request handlers. Each handler borrows; nothing request-scoped is shared.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    pub agent: Arc<AgentGateway>,
    pub graph: Arc<GraphClient>,
}

impl GatewayState {
    /// Build the agent and graph client once, at startup. The graph pool itself is created
    /// on first use.
    pub fn from_config(config: Config) -> Result<Self> {
        let agent = AgentGateway::from_config(&config).context("building provider client")?;
        let graph = GraphClient::new(config.graph.clone());
        Ok(Self {
            config: Arc::new(config),
            agent: Arc::new(agent),
            graph: Arc::new(graph),
        })
    }
}

/// CORS policy from `gateway.corsAllowOrigins`. `*` admits every origin by echoing it back,
/// which keeps credentialed requests working. Origins that are not valid header values are
/// skipped with a warning.
fn cors_layer(config: &Config) -> CorsLayer {
    let listed = config.gateway.cors_allow_origins_list();
    let allow_origin = if listed.iter().any(|o| o == "*") {
        AllowOrigin::mirror_request()
    } else {
        let origins: Vec<HeaderValue> = listed
            .into_iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(_) => {
                    log::warn!("ignoring invalid CORS origin: {}", o);
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Routes: `/health/ready` at the root, everything else under `/api`.
pub fn router(state: GatewayState) -> Router {
    let api = Router::new()
        .route("/health/live", get(liveness))
        .route("/graph/health", get(graph_health))
        .route("/graph/query", post(graph_query))
        .route("/analysis", post(analysis))
        .route("/chat", post(chat));
    let cors = cors_layer(&state.config);
    Router::new()
        .route("/health/ready", get(readiness))
        .nest("/api", api)
        .layer(cors)
        .with_state(state)
}

/// Run the gateway server; binds to config.gateway.bind:config.gateway.port.
/// Blocks until shutdown (Ctrl+C or SIGTERM).
pub async fn run_gateway(config: Config) -> Result<()> {
    let bind_addr = format!("{}:{}", config.gateway.bind.trim(), config.gateway.port);
    let state = GatewayState::from_config(config)?;
    log::info!(
        "graph target {}:{} graph={}",
        state.config.graph.host,
        state.config.graph.port,
        state.graph.graph_name()
    );
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// GET /health/ready
async fn readiness() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// GET /api/health/live
async fn liveness() -> Json<serde_json::Value> {
    Json(json!({ "status": "alive" }))
}

/// GET /api/graph/health — PING plus GRAPH.LIST.
async fn graph_health(
    State(state): State<GatewayState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let ping = state.graph.ping().await?;
    let graphs = state.graph.list_graphs().await?;
    Ok(Json(json!({ "ping": ping, "graphs": graphs.to_json() })))
}

/// POST /api/graph/query?q=... — runs the Cypher text against the configured graph.
async fn graph_query(
    State(state): State<GatewayState>,
    params: Result<Query<GraphQueryParams>, QueryRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::Validation(e.body_text()))?;
    let result = state.graph.query(&params.q).await?;
    Ok(Json(json!({ "result": result.to_json() })))
}

/// POST /api/analysis
async fn analysis(
    State(state): State<GatewayState>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;
    let schema = payload.settings.parse_schema()?;
    let outcome = state
        .agent
        .analyze(&payload.content(), &payload.settings.system_prompt, &schema)
        .await?;
    log::debug!("analysis {}: {}", payload.message.id, outcome.label());
    Ok(Json(AnalysisResponse {
        message_id: payload.message.id,
        analysis: outcome.into_inner(),
    }))
}

/// POST /api/chat
async fn chat(
    State(state): State<GatewayState>,
    payload: Result<Json<ConversationRequest>, JsonRejection>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;
    let outcome = state.agent.converse(&payload.contents()).await?;
    log::debug!(
        "chat over {} message(s): {}",
        payload.messages.len(),
        outcome.label()
    );
    Ok(Json(ConversationResponse {
        message: outcome.into_inner(),
    }))
}
