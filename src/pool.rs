use std::time::Duration;

use deadpool::managed::{self, Metrics, RecycleError, RecycleResult};
use deadpool::Runtime;
use tracing::warn;

use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::error::GraphError;

/// Pool of connections to one server.
pub type Pool = managed::Pool<ConnectionManager>;

/// Opens connections for a [`Pool`].
#[derive(Debug, Clone)]
pub struct ConnectionManager {
  addr: String,
}

impl ConnectionManager {
  pub fn new(host: &str, port: u16) -> Self {
    Self {
      addr: format!("{}:{}", host, port),
    }
  }

  pub fn addr(&self) -> &str {
    &self.addr
  }
}

impl managed::Manager for ConnectionManager {
  type Type = Connection;
  type Error = GraphError;

  async fn create(&self) -> Result<Connection, GraphError> {
    Connection::connect(&self.addr).await
  }

  async fn recycle(&self, conn: &mut Connection, _: &Metrics) -> RecycleResult<GraphError> {
    if conn.is_broken() {
      warn!(addr = %self.addr, "discarding broken connection");
      return Err(RecycleError::Message("connection is broken".into()));
    }

    Ok(())
  }
}

/// Builds a pool from `config`. No connection is opened until the first
/// call needs one.
pub fn build(config: &ClientConfig) -> Result<Pool, GraphError> {
  let manager = ConnectionManager::new(&config.host, config.port);

  let mut builder = Pool::builder(manager).max_size(config.max_connections);

  // Timeouts need a runtime to be enforced by.
  if config.wait_timeout_ms.is_some() || config.create_timeout_ms.is_some() {
    builder = builder
      .runtime(Runtime::Tokio1)
      .wait_timeout(config.wait_timeout_ms.map(Duration::from_millis))
      .create_timeout(config.create_timeout_ms.map(Duration::from_millis));
  }

  builder
    .build()
    .map_err(|error| GraphError::Config(error.to_string()))
}

/// A pool together with who is responsible for closing it.
#[derive(Debug)]
pub(crate) enum PoolHandle {
  /// Built by the client, closed when the client goes away.
  Owned(Pool),
  /// Handed in by the caller, who keeps control of its lifecycle.
  Shared(Pool),
}

impl PoolHandle {
  pub(crate) fn pool(&self) -> &Pool {
    match self {
      PoolHandle::Owned(pool) | PoolHandle::Shared(pool) => pool,
    }
  }

  pub(crate) fn is_owned(&self) -> bool {
    matches!(self, PoolHandle::Owned(_))
  }
}

impl Drop for PoolHandle {
  fn drop(&mut self) {
    if let PoolHandle::Owned(pool) = self {
      pool.close();
    }
  }
}
