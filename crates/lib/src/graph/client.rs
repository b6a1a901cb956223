//! Graph store client over the Redis protocol: single connections, a bounded pool, and the
//! lazily created pool owner handed to request handlers.

use super::command::GraphCommand;
use super::resp::{self, Frame, Reply};
use super::GraphError;
use crate::config::GraphConfig;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, OnceCell, Semaphore};

const READ_CHUNK: usize = 4096;

/// Upper bound on buffered bytes for a single reply.
const MAX_REPLY_LEN: usize = 1024 * 1024 * 1024;

/// One TCP connection with per-operation socket timeout.
pub struct GraphConnection {
    stream: TcpStream,
    buf: Vec<u8>,
    socket_timeout: Duration,
}

impl GraphConnection {
    /// Connect within the configured timeout and authenticate when a password is set.
    pub async fn connect(config: &GraphConfig) -> Result<Self, GraphError> {
        let addr = format!("{}:{}", config.host, config.port);
        let stream = tokio::time::timeout(config.connect_timeout(), TcpStream::connect(&addr))
            .await
            .map_err(|_| GraphError::Timeout(format!("connecting to {}", addr)))?
            .map_err(|source| GraphError::Connect {
                addr: addr.clone(),
                source,
            })?;
        if let Err(e) = stream.set_nodelay(true) {
            log::debug!("graph: set_nodelay failed: {}", e);
        }
        let mut conn = Self {
            stream,
            buf: Vec::new(),
            socket_timeout: config.socket_timeout(),
        };
        if let Some(password) = config.password.as_deref().filter(|p| !p.is_empty()) {
            conn.execute(&["AUTH".to_string(), password.to_string()])
                .await?;
        }
        log::debug!("graph: connected to {}", addr);
        Ok(conn)
    }

    /// Send one command and read its reply. An error reply becomes `GraphError::Server`.
    pub async fn execute(&mut self, args: &[String]) -> Result<Reply, GraphError> {
        let payload = resp::encode_command(args);
        tokio::time::timeout(self.socket_timeout, self.stream.write_all(&payload))
            .await
            .map_err(|_| GraphError::Timeout("writing command".to_string()))??;
        let mut need = 0;
        loop {
            if self.buf.len() >= need {
                match resp::decode_frame(&self.buf)? {
                    Frame::Complete(reply, used) => {
                        self.buf.drain(..used);
                        return match reply {
                            Reply::Error(msg) => Err(GraphError::Server(msg)),
                            other => Ok(other),
                        };
                    }
                    Frame::Partial(min_len) => need = min_len,
                }
            }
            if need > MAX_REPLY_LEN {
                return Err(GraphError::Protocol(format!(
                    "reply larger than {} bytes",
                    MAX_REPLY_LEN
                )));
            }
            self.buf
                .reserve(need.saturating_sub(self.buf.len()).max(self.buf.len()).max(READ_CHUNK));
            let n = tokio::time::timeout(self.socket_timeout, self.stream.read_buf(&mut self.buf))
                .await
                .map_err(|_| GraphError::Timeout("reading reply".to_string()))??;
            if n == 0 {
                return Err(GraphError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed by graph server",
                )));
            }
        }
    }

    /// True after a transport failure that happened before any reply byte arrived.
    fn closed_before_reply(&self, result: &Result<Reply, GraphError>) -> bool {
        matches!(result, Err(GraphError::Io(_))) && self.buf.is_empty()
    }
}

/// Bounded set of reusable connections. At most `max_connections` are checked out at once.
pub struct GraphPool {
    config: GraphConfig,
    idle: Mutex<Vec<GraphConnection>>,
    permits: Semaphore,
}

impl GraphPool {
    pub fn new(config: GraphConfig) -> Self {
        let permits = Semaphore::new(config.max_connections.max(1));
        Self {
            config,
            idle: Mutex::new(Vec::new()),
            permits,
        }
    }

    /// Run one command on an idle (or new) connection. Connections that fail at the
    /// transport level are dropped; a dropped future drops its connection too. An idle
    /// connection the server has since closed is replaced once with a fresh one.
    pub async fn execute(&self, args: &[String]) -> Result<Reply, GraphError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| GraphError::Protocol("connection pool closed".to_string()))?;
        let idle = self.idle.lock().await.pop();
        let reused = idle.is_some();
        let mut conn = match idle {
            Some(conn) => conn,
            None => GraphConnection::connect(&self.config).await?,
        };
        let mut result = conn.execute(args).await;
        if reused && conn.closed_before_reply(&result) {
            if let Err(e) = &result {
                log::debug!("graph: idle connection went stale ({}), reconnecting", e);
            }
            conn = GraphConnection::connect(&self.config).await?;
            result = conn.execute(args).await;
        }
        match &result {
            Ok(_) | Err(GraphError::Server(_)) => self.idle.lock().await.push(conn),
            Err(e) => log::debug!("graph: discarding connection after error: {}", e),
        }
        result
    }

    pub async fn idle_count(&self) -> usize {
        self.idle.lock().await.len()
    }
}

/// Owner of the graph pool. The pool is created on first use, exactly once even when
/// several requests race to it.
pub struct GraphClient {
    config: GraphConfig,
    pool: OnceCell<GraphPool>,
}

impl GraphClient {
    pub fn new(config: GraphConfig) -> Self {
        Self {
            config,
            pool: OnceCell::new(),
        }
    }

    /// Graph targeted by [`GraphClient::query`].
    pub fn graph_name(&self) -> &str {
        &self.config.graph
    }

    pub fn pool_initialized(&self) -> bool {
        self.pool.initialized()
    }

    /// Connections parked in the pool; 0 before first use.
    pub async fn idle_connections(&self) -> usize {
        match self.pool.get() {
            Some(pool) => pool.idle_count().await,
            None => 0,
        }
    }

    pub(crate) async fn pool(&self) -> &GraphPool {
        self.pool
            .get_or_init(|| async {
                log::info!(
                    "graph: creating connection pool for {}:{} (max {} connections)",
                    self.config.host,
                    self.config.port,
                    self.config.max_connections
                );
                GraphPool::new(self.config.clone())
            })
            .await
    }

    /// `GRAPH.QUERY <graph> <cypher> [PARAMS ...]`. The reply is returned unmodified.
    pub async fn execute(&self, command: &GraphCommand) -> Result<Reply, GraphError> {
        let mut args = Vec::with_capacity(3 + command.params.len() * 2);
        args.push("GRAPH.QUERY".to_string());
        args.extend(command.tokens()?);
        self.pool().await.execute(&args).await
    }

    /// Run `cypher` without parameters against the configured graph.
    pub async fn query(&self, cypher: &str) -> Result<Reply, GraphError> {
        self.execute(&GraphCommand::new(self.graph_name(), cypher))
            .await
    }

    /// `GRAPH.LIST`: names of the graphs held by the store.
    pub async fn list_graphs(&self) -> Result<Reply, GraphError> {
        self.pool()
            .await
            .execute(&["GRAPH.LIST".to_string()])
            .await
    }

    /// `PING`: true when the server answers PONG.
    pub async fn ping(&self) -> Result<bool, GraphError> {
        let reply = self.pool().await.execute(&["PING".to_string()]).await?;
        Ok(reply
            .as_text()
            .map(|s| s.eq_ignore_ascii_case("PONG"))
            .unwrap_or(false))
    }
}
