use agentmind::config;
use agentmind::gateway;
use agentmind::graph::{GraphClient, GraphCommand, ParamValue};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "agentmind")]
#[command(about = "AgentMind CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Run the API gateway (chat, analysis, graph pass-through). Without GOOGLE_API_KEY the agent answers locally (echo and keyword sentiment).
    Serve {
        /// Config file path (default: AGENTMIND_CONFIG_PATH or ./agentmind.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config or 8000)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Run one Cypher query against the graph store and print the raw reply as JSON.
    Query {
        /// Config file path (default: AGENTMIND_CONFIG_PATH or ./agentmind.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Graph name (default from config)
        #[arg(long, short)]
        graph: Option<String>,

        /// Query parameter as key=value; the value is read as JSON, or as a plain string when it is not JSON. Repeatable.
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,

        /// Cypher query text
        cypher: String,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("agentmind {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Query {
            config,
            graph,
            params,
            cypher,
        }) => {
            if let Err(e) = run_query(config, graph, params, cypher).await {
                log::error!("query failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

async fn run_serve(config_path: Option<std::path::PathBuf>, port: Option<u16>) -> anyhow::Result<()> {
    let (mut config, path) = config::load_config(config_path)?;
    log::debug!("config loaded from {}", path.display());
    if let Some(p) = port {
        config.gateway.port = p;
    }
    gateway::run_gateway(config).await
}

/// Parse `key=value`; the value is JSON when it parses, otherwise the raw string.
fn parse_param(raw: &str) -> anyhow::Result<(String, ParamValue)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("parameter must be key=value: {}", raw))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("parameter key is empty: {}", raw);
    }
    let value = match serde_json::from_str::<serde_json::Value>(value) {
        Ok(json) => ParamValue::try_from(&json)?,
        Err(_) => ParamValue::Str(value.to_string()),
    };
    Ok((key.to_string(), value))
}

async fn run_query(
    config_path: Option<std::path::PathBuf>,
    graph: Option<String>,
    params: Vec<String>,
    cypher: String,
) -> anyhow::Result<()> {
    let (config, _) = config::load_config(config_path)?;
    let graph_name = graph.unwrap_or_else(|| config.graph.graph.clone());
    let mut command = GraphCommand::new(graph_name, cypher);
    for raw in &params {
        let (key, value) = parse_param(raw)?;
        command = command.param(key, value);
    }
    let client = GraphClient::new(config.graph);
    let reply = client.execute(&command).await?;
    println!("{}", serde_json::to_string_pretty(&reply.to_json())?);
    Ok(())
}
