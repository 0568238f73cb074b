use deadpool::managed::PoolError;
use miette::Diagnostic;
use thiserror::Error;

use crate::resp::ParserError;
use crate::template::TemplateError;

#[derive(Debug, Diagnostic, Error)]
pub enum GraphError {
  #[error(transparent)]
  #[diagnostic(code(redisgraph::io))]
  Io(#[from] std::io::Error),

  #[error("the server closed the connection before the reply was complete")]
  #[diagnostic(code(redisgraph::connection_closed))]
  ConnectionClosed,

  #[error("could not get a connection from the pool: {0}")]
  #[diagnostic(
    code(redisgraph::pool),
    help("the pool may be closed, or every connection stayed busy past the wait timeout")
  )]
  Pool(String),

  #[error("the server sent an invalid reply: {0}")]
  #[diagnostic(code(redisgraph::parse))]
  Parse(#[from] ParserError),

  #[error("expected a {expected} but the server replied with {got}")]
  #[diagnostic(code(redisgraph::unexpected_reply))]
  UnexpectedReply {
    expected: &'static str,
    got: &'static str,
  },

  /// An error reply, e.g. a query syntax error reported by the graph module.
  #[error("{0}")]
  #[diagnostic(code(redisgraph::server))]
  Server(String),

  #[error("could not format the query: {0}")]
  #[diagnostic(code(redisgraph::template))]
  Template(#[from] TemplateError),

  #[error("invalid client configuration: {0}")]
  #[diagnostic(code(redisgraph::config))]
  Config(String),
}

impl GraphError {
  /// True for failures to reach the server or to keep talking to it.
  pub fn is_transport(&self) -> bool {
    matches!(
      self,
      GraphError::Io(_) | GraphError::ConnectionClosed | GraphError::Pool(_)
    )
  }

  /// True when the server answered with something the client can't use.
  pub fn is_protocol(&self) -> bool {
    matches!(self, GraphError::Parse(_) | GraphError::UnexpectedReply { .. })
  }
}

impl From<PoolError<GraphError>> for GraphError {
  fn from(error: PoolError<GraphError>) -> Self {
    match error {
      PoolError::Backend(error) => error,
      other => GraphError::Pool(other.to_string()),
    }
  }
}

impl From<::config::ConfigError> for GraphError {
  fn from(error: ::config::ConfigError) -> Self {
    GraphError::Config(error.to_string())
  }
}
