/// A connection to the server hosting the graph module.
///
/// One request is in flight at a time: a command is written, then exactly one
/// reply is read back. The pool hands a connection to a single caller for the
/// duration of a call, so replies can't interleave.
use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, trace};

use crate::command::{Command, Reply};
use crate::error::GraphError;
use crate::resp;
use crate::value::Value;

#[derive(Debug)]
pub struct Connection {
  stream: TcpStream,
  /// Bytes read from the stream that have not been parsed yet.
  buffer: BytesMut,
  /// Set from the moment a command is written until its reply has been
  /// read in full. A connection dropped in between, on error or because the
  /// caller's future was cancelled, may still have that reply coming and
  /// can't be reused.
  broken: bool,
}

impl Connection {
  pub async fn connect(addr: &str) -> Result<Self, GraphError> {
    info!(addr, "connecting");

    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;

    info!(addr, "connected");

    Ok(Self {
      stream,
      buffer: BytesMut::with_capacity(4096),
      broken: false,
    })
  }

  pub fn is_broken(&self) -> bool {
    self.broken
  }

  /// Sends `command` for `graph_id` and decodes the reply the way the
  /// command declares.
  pub async fn execute(&mut self, command: &Command, graph_id: &str) -> Result<Reply, GraphError> {
    self.send(&command.args(graph_id)).await?;

    let value = self.read_reply().await?;

    command.reply_kind().decode(value)
  }

  /// Writes a command. The connection counts as broken until
  /// [`Connection::read_reply`] has read the reply to it.
  pub async fn send(&mut self, args: &[&str]) -> Result<(), GraphError> {
    let encoded_command = resp::encode(args);

    debug!(
      "sending RESP command: {}",
      resp::escape_for_log(&encoded_command)
    );

    self.broken = true;
    self.stream.write_all(&encoded_command).await?;

    Ok(())
  }

  pub async fn read_reply(&mut self) -> Result<Value, GraphError> {
    self.broken = true;

    let value = self.read_value().await?;

    // Error replies and replies of the wrong shape are whole values too, the
    // stream is back in sync either way.
    self.broken = false;

    Ok(value)
  }

  async fn read_value(&mut self) -> Result<Value, GraphError> {
    loop {
      if let Some((value, consumed)) = resp::parse(&self.buffer)? {
        self.buffer.advance(consumed);
        return Ok(value);
      }

      let bytes_read = self.stream.read_buf(&mut self.buffer).await?;

      trace!(bytes_read, buffered = self.buffer.len(), "read reply bytes");

      if bytes_read == 0 {
        return Err(GraphError::ConnectionClosed);
      }
    }
  }
}
