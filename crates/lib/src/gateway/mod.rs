//! Gateway: HTTP surface for the agent and graph endpoints.
//!
//! Validates inbound payloads, hands them to the agent gateway or graph client, and maps
//! failures to status codes. A handler future is dropped when its client disconnects, which
//! drops the in-flight provider or graph call with it.

mod error;
mod protocol;
mod server;

pub use error::ApiError;
pub use protocol::{
    AgentSettings, AnalysisRequest, AnalysisResponse, ChatMessagePayload, ConversationRequest,
    ConversationResponse, GraphQueryParams, Sender,
};
pub use server::{router, run_gateway, GatewayState};
