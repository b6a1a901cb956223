//! Graph query adapter: Cypher commands over a key/value store's Redis protocol.
//!
//! Builds `GRAPH.QUERY` token sequences and executes them through a lazily created connection
//! pool. Replies are passed back raw; shaping rows is the caller's job.

mod client;
mod command;
mod resp;

pub use client::{GraphClient, GraphConnection, GraphPool};
pub use command::{build_command, GraphCommand, ParamValue, PARAMS_MARKER};
pub use resp::{decode, encode_command, Reply};

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("graph connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("graph i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("graph operation timed out: {0}")]
    Timeout(String),
    #[error("graph protocol error: {0}")]
    Protocol(String),
    #[error("graph server error: {0}")]
    Server(String),
    #[error("cannot encode graph parameter: {0}")]
    Encode(String),
}

impl GraphError {
    /// True when the store could not be reached (as opposed to rejecting the command).
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            GraphError::Connect { .. } | GraphError::Io(_) | GraphError::Timeout(_)
        )
    }
}
