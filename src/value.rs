use std::fmt;

/// A reply read from the server, left undecoded.
///
/// Graph queries answer with nested arrays (header, rows and statistics),
/// administrative commands with a status line. Turning either into a
/// structured result set is the caller's job.
///
/// The variants mirror the RESP types, selected by the first byte of the
/// reply:
///
/// ```terminal
/// "+OK\r\n"                          SimpleString
/// "-ERR unknown command\r\n"         Error
/// ":1000\r\n"                        Int
/// "$6\r\nfoobar\r\n"                 BulkString
/// "*2\r\n:1\r\n:2\r\n"               Array
/// "$-1\r\n" or "*-1\r\n"             Null
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  /// Non binary safe status line, e.g. the timing report of GRAPH.DELETE.
  SimpleString(String),
  /// An error reply. Only ever produced while reading; the client turns a
  /// top level error into [`crate::GraphError::Server`].
  Error(String),
  Int(i64),
  /// Binary safe string. RedisGraph sends property values and column names
  /// this way.
  BulkString(Vec<u8>),
  /// Arrays can contain elements of different types, including other arrays.
  Array(Vec<Value>),
  /// Null bulk string or null array.
  Null,
}

impl Value {
  /// Name of the RESP type, used in error messages.
  pub fn kind(&self) -> &'static str {
    match self {
      Value::SimpleString(_) => "simple string",
      Value::Error(_) => "error",
      Value::Int(_) => "integer",
      Value::BulkString(_) => "bulk string",
      Value::Array(_) => "array",
      Value::Null => "null",
    }
  }

  /// Returns the text of a simple or bulk string.
  ///
  /// Bulk strings that are not valid UTF-8 return `None`.
  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::SimpleString(s) => Some(s),
      Value::BulkString(bytes) => std::str::from_utf8(bytes).ok(),
      _ => None,
    }
  }

  pub fn as_int(&self) -> Option<i64> {
    match self {
      Value::Int(i) => Some(*i),
      _ => None,
    }
  }

  pub fn as_array(&self) -> Option<&[Value]> {
    match self {
      Value::Array(elements) => Some(elements),
      _ => None,
    }
  }

  pub fn into_array(self) -> Option<Vec<Value>> {
    match self {
      Value::Array(elements) => Some(elements),
      _ => None,
    }
  }

  pub fn is_null(&self) -> bool {
    matches!(self, Value::Null)
  }

  fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
    match self {
      Value::SimpleString(s) => write!(f, "{}", s),
      Value::Error(message) => write!(f, "(error) {}", message),
      Value::Int(i) => write!(f, "(integer) {}", i),
      Value::BulkString(bytes) => write!(f, "{:?}", String::from_utf8_lossy(bytes)),
      Value::Null => write!(f, "(nil)"),
      Value::Array(elements) if elements.is_empty() => write!(f, "(empty array)"),
      Value::Array(elements) => {
        // Nested elements line up under the first one, like redis-cli does.
        let width = elements.len().to_string().len();

        for (i, element) in elements.iter().enumerate() {
          if i > 0 {
            write!(f, "\n{:indent$}", "", indent = indent)?;
          }

          let prefix = format!("{:>width$}) ", i + 1, width = width);
          write!(f, "{}", prefix)?;
          element.fmt_indented(f, indent + prefix.len())?;
        }

        Ok(())
      }
    }
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.fmt_indented(f, 0)
  }
}
