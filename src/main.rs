use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::Result;
use redisgraph::{ClientConfig, GraphClient, QueryArg};

/// Runs RedisGraph commands against one graph.
#[derive(Debug, Parser)]
#[command(name = "redisgraph", version)]
struct Cli {
  /// Configuration file (toml, yaml, json). REDISGRAPH_* variables override it.
  #[arg(long)]
  config: Option<PathBuf>,
  #[arg(long)]
  host: Option<String>,
  #[arg(long)]
  port: Option<u16>,
  /// The graph id.
  graph: String,
  #[command(subcommand)]
  command: Action,
}

#[derive(Debug, Subcommand)]
enum Action {
  /// Runs a Cypher query. `%s`, `%d`, `%f` and `%b` placeholders take the
  /// `--arg` values in order.
  Query {
    query: String,
    #[arg(long = "arg")]
    args: Vec<String>,
  },
  /// Deletes the entire graph.
  Delete,
}

/// Numbers and booleans given on the command line are passed as such,
/// everything else as text.
fn parse_arg(arg: &str) -> QueryArg {
  if let Ok(i) = arg.parse::<i64>() {
    QueryArg::Int(i)
  } else if let Some(x) = arg.parse::<f64>().ok().filter(|x| x.is_finite()) {
    QueryArg::Float(x)
  } else if let Ok(b) = arg.parse::<bool>() {
    QueryArg::Bool(b)
  } else {
    QueryArg::Text(arg.to_string())
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  std::env::set_var(
    "RUST_LOG",
    std::env::var("RUST_LOG").unwrap_or(String::from("redisgraph=info")),
  );

  tracing_subscriber::fmt::init();

  let cli = Cli::parse();

  let mut config = ClientConfig::load(cli.config.as_deref())?;
  if let Some(host) = cli.host {
    config.host = host;
  }
  if let Some(port) = cli.port {
    config.port = port;
  }

  let client = GraphClient::from_config(cli.graph, &config)?;

  match cli.command {
    Action::Query { query, args } if args.is_empty() => {
      println!("{}", client.query(&query).await?);
    }
    Action::Query { query, args } => {
      let args: Vec<QueryArg> = args.iter().map(|arg| parse_arg(arg)).collect();
      println!("{}", client.query_with(&query, &args).await?);
    }
    Action::Delete => {
      println!("{}", client.delete_graph().await?);
    }
  }

  Ok(())
}
