//! AgentMind core library — provider-backed chat and analysis, the graph query adapter,
//! and the HTTP gateway used by the CLI.

pub mod agent;
pub mod config;
pub mod gateway;
pub mod graph;
pub mod llm;
pub mod retry;
