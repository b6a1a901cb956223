//! Integration test: run the graph client against a local TCP stand-in that speaks RESP,
//! records every command, and answers from a script.

use agentmind::config::GraphConfig;
use agentmind::graph::{decode, GraphClient, GraphCommand, GraphError, Reply};
use std::time::Duration;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

type Log = Arc<Mutex<Vec<Vec<String>>>>;

/// How the stand-in treats each connection.
#[derive(Clone, Copy, PartialEq)]
enum Mode {
    /// Answer every command and keep the socket open.
    Serve,
    /// Answer one command, then close the socket.
    CloseAfterReply,
    /// Read commands but never answer.
    Silent,
}

struct Store {
    port: u16,
    commands: Log,
    accepted: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

/// Canned replies keyed on the command name.
fn answer(args: &[String]) -> Vec<u8> {
    match args.first().map(String::as_str) {
        Some("PING") => b"+PONG\r\n".to_vec(),
        Some("AUTH") => b"+OK\r\n".to_vec(),
        Some("GRAPH.LIST") => b"*2\r\n$9\r\nagentmind\r\n$5\r\nother\r\n".to_vec(),
        Some("GRAPH.QUERY") if args.get(2).map(String::as_str) == Some("BROKEN") => {
            b"-errMsg: Invalid input 'B'\r\n".to_vec()
        }
        Some("GRAPH.QUERY") if args.get(2).map(String::as_str) == Some("HUGE") => {
            b"*1\r\n$600000000\r\n".to_vec()
        }
        Some("GRAPH.QUERY") => {
            b"*3\r\n*1\r\n$1\r\nn\r\n*1\r\n*1\r\n:1\r\n*1\r\n$12\r\nCached: 0 ok\r\n".to_vec()
        }
        _ => b"-ERR unknown command\r\n".to_vec(),
    }
}

fn as_args(reply: Reply) -> Vec<String> {
    match reply {
        Reply::Array(Some(items)) => items.iter().filter_map(Reply::as_text).collect(),
        other => panic!("expected command array, got {:?}", other),
    }
}

async fn spawn_store() -> Store {
    spawn_store_with(Mode::Serve).await
}

async fn spawn_store_with(mode: Mode) -> Store {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind store");
    let port = listener.local_addr().expect("store addr").port();
    let commands: Log = Arc::new(Mutex::new(Vec::new()));
    let accepted = Arc::new(AtomicUsize::new(0));
    let closed = Arc::new(AtomicUsize::new(0));
    let (log, count, gone) = (commands.clone(), accepted.clone(), closed.clone());
    tokio::spawn(async move {
        while let Ok((mut sock, _)) = listener.accept().await {
            count.fetch_add(1, Ordering::SeqCst);
            let log = log.clone();
            let gone = gone.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                'conn: loop {
                    while let Ok(Some((reply, used))) = decode(&buf) {
                        buf.drain(..used);
                        let args = as_args(reply);
                        let out = answer(&args);
                        log.lock().unwrap().push(args);
                        if mode == Mode::Silent {
                            continue;
                        }
                        if sock.write_all(&out).await.is_err() || mode == Mode::CloseAfterReply {
                            break 'conn;
                        }
                    }
                    match sock.read(&mut chunk).await {
                        Ok(0) | Err(_) => {
                            gone.fetch_add(1, Ordering::SeqCst);
                            break 'conn;
                        }
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
            });
        }
    });
    Store {
        port,
        commands,
        accepted,
        closed,
    }
}

fn config_for(port: u16) -> GraphConfig {
    GraphConfig {
        host: "127.0.0.1".to_string(),
        port,
        ..GraphConfig::default()
    }
}

#[tokio::test]
async fn query_sends_tokens_and_returns_raw_reply() {
    let store = spawn_store().await;
    let client = GraphClient::new(config_for(store.port));
    let cmd = GraphCommand::new("agentmind", "MATCH (n) WHERE n.id = $id RETURN n")
        .param("id", "7")
        .param("limit", 10_i64);

    let reply = client.execute(&cmd).await.expect("query");
    assert_eq!(reply.to_json(), json!([["n"], [[1]], ["Cached: 0 ok"]]));

    let commands = store.commands.lock().unwrap();
    assert_eq!(
        commands[0],
        vec![
            "GRAPH.QUERY",
            "agentmind",
            "MATCH (n) WHERE n.id = $id RETURN n",
            "PARAMS",
            "id",
            "7",
            "limit",
            "10"
        ]
    );
}

#[tokio::test]
async fn connections_are_reused_between_calls() {
    let store = spawn_store().await;
    let client = GraphClient::new(config_for(store.port));
    assert!(!client.pool_initialized());
    assert!(client.ping().await.expect("ping"));
    client.query("RETURN 1").await.expect("query");
    assert_eq!(
        client.list_graphs().await.expect("list").to_json(),
        json!(["agentmind", "other"])
    );
    assert_eq!(store.accepted.load(Ordering::SeqCst), 1);
    assert_eq!(store.commands.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn server_errors_propagate_and_keep_the_connection() {
    let store = spawn_store().await;
    let client = GraphClient::new(config_for(store.port));
    let err = client.query("BROKEN").await.unwrap_err();
    assert!(matches!(err, GraphError::Server(ref m) if m.contains("Invalid input")));
    assert!(!err.is_unavailable());
    client.query("RETURN 1").await.expect("query after error");
    assert_eq!(store.accepted.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn password_triggers_auth_on_connect() {
    let store = spawn_store().await;
    let mut config = config_for(store.port);
    config.password = Some("s3cret".to_string());
    let client = GraphClient::new(config);
    client.ping().await.expect("ping");
    let commands = store.commands.lock().unwrap();
    assert_eq!(commands[0], vec!["AUTH", "s3cret"]);
    assert_eq!(commands[1], vec!["PING"]);
}

#[tokio::test]
async fn unreachable_store_is_a_connect_error() {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .expect("bind")
        .local_addr()
        .expect("addr")
        .port();
    let client = GraphClient::new(config_for(port));
    let err = client.query("RETURN 1").await.unwrap_err();
    assert!(err.is_unavailable(), "{}", err);
}

#[tokio::test]
async fn stale_idle_connection_is_replaced() {
    let store = spawn_store_with(Mode::CloseAfterReply).await;
    let client = GraphClient::new(config_for(store.port));
    for _ in 0..3 {
        assert!(client.ping().await.expect("ping"));
    }
    assert_eq!(store.accepted.load(Ordering::SeqCst), 3);
    assert_eq!(store.commands.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn dropped_query_closes_its_connection() {
    let store = spawn_store_with(Mode::Silent).await;
    let client = GraphClient::new(config_for(store.port));

    let timed_out = tokio::time::timeout(Duration::from_millis(200), client.query("RETURN 1")).await;
    assert!(timed_out.is_err());
    assert_eq!(client.idle_connections().await, 0);

    for _ in 0..100 {
        if store.closed.load(Ordering::SeqCst) == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(store.closed.load(Ordering::SeqCst), 1);
    assert_eq!(store.commands.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn oversized_reply_is_a_protocol_error() {
    let store = spawn_store().await;
    let client = GraphClient::new(config_for(store.port));
    let err = client.query("HUGE").await.unwrap_err();
    assert!(matches!(err, GraphError::Protocol(_)), "{}", err);
    assert_eq!(client.idle_connections().await, 0);
}
