use crate::error::GraphError;
use crate::value::Value;

/// How a command's reply has to be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
  /// A single line of text: a simple string, or a bulk string holding it.
  Status,
  /// A nested array of values.
  MultiBulk,
}

/// A command understood by the graph module.
///
/// Every kind declares both its keyword and its [`ReplyKind`], so the two can
/// not drift apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
  /// `GRAPH.QUERY <graph id> <query>`
  Query { query: String },
  /// `GRAPH.DELETE <graph id>`
  Delete,
}

impl Command {
  pub fn keyword(&self) -> &'static str {
    match self {
      Command::Query { .. } => "GRAPH.QUERY",
      Command::Delete => "GRAPH.DELETE",
    }
  }

  pub fn reply_kind(&self) -> ReplyKind {
    match self {
      Command::Query { .. } => ReplyKind::MultiBulk,
      Command::Delete => ReplyKind::Status,
    }
  }

  /// The command as sent on the wire: keyword, graph id, then the
  /// command's own arguments.
  pub fn args<'a>(&'a self, graph_id: &'a str) -> Vec<&'a str> {
    let mut args = vec![self.keyword(), graph_id];

    match self {
      Command::Query { query } => args.push(query.as_str()),
      Command::Delete => {}
    }

    args
  }
}

/// The decoded reply of a command, shaped by its [`ReplyKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
  Status(String),
  MultiBulk(Value),
}

impl Reply {
  pub fn into_status(self) -> Result<String, GraphError> {
    match self {
      Reply::Status(status) => Ok(status),
      Reply::MultiBulk(value) => Err(GraphError::UnexpectedReply {
        expected: "status line",
        got: value.kind(),
      }),
    }
  }

  pub fn into_multi_bulk(self) -> Result<Value, GraphError> {
    match self {
      Reply::MultiBulk(value) => Ok(value),
      Reply::Status(_) => Err(GraphError::UnexpectedReply {
        expected: "multi-bulk reply",
        got: "status line",
      }),
    }
  }
}

impl ReplyKind {
  /// Checks `value` against the shape this kind expects.
  ///
  /// Error replies become [`GraphError::Server`] whatever the kind.
  pub fn decode(self, value: Value) -> Result<Reply, GraphError> {
    match (self, value) {
      (_, Value::Error(message)) => Err(GraphError::Server(message)),
      (ReplyKind::Status, Value::SimpleString(status)) => Ok(Reply::Status(status)),
      (ReplyKind::Status, Value::BulkString(bytes)) => match String::from_utf8(bytes) {
        Ok(status) => Ok(Reply::Status(status)),
        Err(_) => Err(GraphError::UnexpectedReply {
          expected: "utf-8 status line",
          got: "binary bulk string",
        }),
      },
      (ReplyKind::MultiBulk, value @ Value::Array(_)) => Ok(Reply::MultiBulk(value)),
      (ReplyKind::Status, value) => Err(GraphError::UnexpectedReply {
        expected: "status line",
        got: value.kind(),
      }),
      (ReplyKind::MultiBulk, value) => Err(GraphError::UnexpectedReply {
        expected: "multi-bulk reply",
        got: value.kind(),
      }),
    }
  }
}
