use std::path::Path;

use serde::Deserialize;

use crate::error::GraphError;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 6379;

/// Where the server is and how the connection pool to it is sized.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
  pub host: String,
  pub port: u16,
  /// Upper bound on open connections, and so on concurrent calls.
  pub max_connections: usize,
  /// How long a call waits for a free connection. Unbounded when unset.
  pub wait_timeout_ms: Option<u64>,
  /// How long opening a connection may take. Unbounded when unset.
  pub create_timeout_ms: Option<u64>,
}

impl Default for ClientConfig {
  fn default() -> Self {
    Self {
      host: String::from(DEFAULT_HOST),
      port: DEFAULT_PORT,
      max_connections: 16,
      wait_timeout_ms: None,
      create_timeout_ms: None,
    }
  }
}

impl ClientConfig {
  /// Loads the configuration: defaults, then `file` if given, then
  /// `REDISGRAPH_*` environment variables (`REDISGRAPH_HOST`,
  /// `REDISGRAPH_PORT`, `REDISGRAPH_MAX_CONNECTIONS`, ...).
  ///
  /// The file format follows its extension (toml, yaml, json, ...).
  pub fn load(file: Option<&Path>) -> Result<Self, GraphError> {
    let mut builder = ::config::Config::builder();

    if let Some(file) = file {
      builder = builder.add_source(::config::File::from(file));
    }

    let config = builder
      .add_source(::config::Environment::with_prefix("REDISGRAPH").try_parsing(true))
      .build()?;

    Ok(config.try_deserialize()?)
  }
}
