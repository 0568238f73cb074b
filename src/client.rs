use deadpool::Status;
use tracing::info_span;
use tracing_futures::Instrument;

use crate::command::{Command, Reply};
use crate::config::{ClientConfig, DEFAULT_HOST, DEFAULT_PORT};
use crate::error::GraphError;
use crate::pool::{self, Pool, PoolHandle};
use crate::template::{format_query, QueryArg};
use crate::value::Value;

/// Client for one graph stored in a Redis server running the graph module.
///
/// Every call borrows a connection from the pool for a single round trip and
/// gives it back when the call returns, whether it succeeded or not. The
/// client keeps no per-query state; share it behind an `Arc` to issue calls
/// from several tasks.
#[derive(Debug)]
pub struct GraphClient {
  pool: PoolHandle,
  graph_id: String,
}

impl GraphClient {
  /// Creates a client to a graph on the server running on the local machine.
  pub fn new(graph_id: impl Into<String>) -> Result<Self, GraphError> {
    Self::connect(graph_id, DEFAULT_HOST, DEFAULT_PORT)
  }

  /// Creates a client to a graph on the server at `host`:`port`.
  pub fn connect(graph_id: impl Into<String>, host: &str, port: u16) -> Result<Self, GraphError> {
    let config = ClientConfig {
      host: host.to_string(),
      port,
      ..ClientConfig::default()
    };

    Self::from_config(graph_id, &config)
  }

  /// Creates a client with a pool built from `config`. The pool is closed
  /// when the client is dropped.
  pub fn from_config(graph_id: impl Into<String>, config: &ClientConfig) -> Result<Self, GraphError> {
    let pool = pool::build(config)?;

    Ok(Self {
      pool: PoolHandle::Owned(pool),
      graph_id: graph_id.into(),
    })
  }

  /// Creates a client that borrows connections from `pool`.
  ///
  /// The pool stays under the caller's control: dropping the client leaves
  /// it open.
  pub fn with_pool(graph_id: impl Into<String>, pool: Pool) -> Self {
    Self {
      pool: PoolHandle::Shared(pool),
      graph_id: graph_id.into(),
    }
  }

  pub fn graph_id(&self) -> &str {
    &self.graph_id
  }

  /// True if the client built its pool and will close it.
  pub fn owns_pool(&self) -> bool {
    self.pool.is_owned()
  }

  pub fn pool_status(&self) -> Status {
    self.pool.pool().status()
  }

  /// Runs a Cypher query, sent exactly as given.
  pub async fn query(&self, query: &str) -> Result<Value, GraphError> {
    let command = Command::Query {
      query: query.to_string(),
    };

    self
      .dispatch(command)
      .instrument(info_span!("graph.query", graph = %self.graph_id))
      .await?
      .into_multi_bulk()
  }

  /// Runs a Cypher query built from `template` and `args`.
  ///
  /// Text arguments are quoted and have their quotes escaped, see
  /// [`crate::template`]. Formatting errors are returned before any
  /// connection is taken from the pool.
  ///
  /// ```no_run
  /// # async fn run(client: &redisgraph::GraphClient) -> Result<(), redisgraph::GraphError> {
  /// let rows = client
  ///   .query_with("MATCH (n {name:%s}) RETURN n LIMIT %d", &["O'Brien".into(), 10.into()])
  ///   .await?;
  /// # Ok(())
  /// # }
  /// ```
  pub async fn query_with(&self, template: &str, args: &[QueryArg]) -> Result<Value, GraphError> {
    let query = format_query(template, args)?;

    self.query(&query).await
  }

  /// Deletes the entire graph.
  ///
  /// Returns the server's status line verbatim, which reports how long the
  /// deletion took.
  pub async fn delete_graph(&self) -> Result<String, GraphError> {
    self
      .dispatch(Command::Delete)
      .instrument(info_span!("graph.delete", graph = %self.graph_id))
      .await?
      .into_status()
  }

  async fn dispatch(&self, command: Command) -> Result<Reply, GraphError> {
    let mut conn = self.pool.pool().get().await?;

    // `conn` goes back to the pool when it drops, on the error path too.
    conn.execute(&command, &self.graph_id).await
  }
}

#[cfg(test)]
mod tests {
  use std::collections::VecDeque;
  use std::net::SocketAddr;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::{Arc, Mutex};
  use std::time::Duration;

  use tokio::io::{AsyncReadExt, AsyncWriteExt};
  use tokio::net::TcpListener;

  use super::*;
  use crate::resp;

  enum Canned {
    Reply(&'static str),
    /// Writes the bytes and closes the connection.
    Hangup(&'static str),
    /// Waits this many milliseconds before replying.
    Delayed(u64, &'static str),
  }

  /// A RESP server that answers each command with the next canned reply and
  /// records everything it receives.
  struct FakeServer {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<u8>>>,
    connections: Arc<AtomicUsize>,
  }

  impl FakeServer {
    async fn start(replies: Vec<Canned>) -> Self {
      let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
      let addr = listener.local_addr().unwrap();
      let received = Arc::new(Mutex::new(Vec::new()));
      let connections = Arc::new(AtomicUsize::new(0));
      let replies = Arc::new(Mutex::new(VecDeque::from(replies)));

      let server_received = received.clone();
      let server_connections = connections.clone();

      tokio::spawn(async move {
        loop {
          let (mut socket, _) = listener.accept().await.unwrap();
          server_connections.fetch_add(1, Ordering::SeqCst);

          let received = server_received.clone();
          let replies = replies.clone();

          tokio::spawn(async move {
            let mut pending = Vec::new();
            let mut buffer = [0; 1024];

            loop {
              let n = socket.read(&mut buffer).await.unwrap_or(0);
              if n == 0 {
                return;
              }

              received.lock().unwrap().extend_from_slice(&buffer[..n]);
              pending.extend_from_slice(&buffer[..n]);

              while let Ok(Some((_, consumed))) = resp::parse(&pending) {
                pending.drain(..consumed);

                let canned = replies.lock().unwrap().pop_front();
                match canned {
                  Some(Canned::Reply(reply)) => socket.write_all(reply.as_bytes()).await.unwrap(),
                  Some(Canned::Hangup(reply)) => {
                    socket.write_all(reply.as_bytes()).await.unwrap();
                    return;
                  }
                  Some(Canned::Delayed(ms, reply)) => {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    // The client may have given up on this connection by now.
                    if socket.write_all(reply.as_bytes()).await.is_err() {
                      return;
                    }
                  }
                  None => return,
                }
              }
            }
          });
        }
      });

      Self {
        addr,
        received,
        connections,
      }
    }

    fn client(&self, graph_id: &str) -> GraphClient {
      GraphClient::connect(graph_id, &self.addr.ip().to_string(), self.addr.port()).unwrap()
    }

    fn received(&self) -> String {
      String::from_utf8(self.received.lock().unwrap().clone()).unwrap()
    }

    fn connections(&self) -> usize {
      self.connections.load(Ordering::SeqCst)
    }
  }

  fn bulk(s: &str) -> Value {
    Value::BulkString(s.as_bytes().to_vec())
  }

  const QUERY_REPLY: &str =
    "*3\r\n*1\r\n$6\r\nn.name\r\n*1\r\n*1\r\n$7\r\nO'Brien\r\n*1\r\n$19\r\nCached execution: 0\r\n";

  fn query_reply_value() -> Value {
    Value::Array(vec![
      Value::Array(vec![bulk("n.name")]),
      Value::Array(vec![Value::Array(vec![bulk("O'Brien")])]),
      Value::Array(vec![bulk("Cached execution: 0")]),
    ])
  }

  fn assert_released(client: &GraphClient) {
    let status = client.pool_status();
    assert_eq!(status.size, status.available, "status: {:?}", status);
  }

  #[test_log::test(tokio::test)]
  async fn query_sends_graph_query() {
    let server = FakeServer::start(vec![Canned::Reply(QUERY_REPLY)]).await;
    let client = server.client("social");

    let reply = client.query("MATCH (n) RETURN n").await.unwrap();

    assert_eq!(query_reply_value(), reply);
    assert_eq!(
      "*3\r\n$11\r\nGRAPH.QUERY\r\n$6\r\nsocial\r\n$18\r\nMATCH (n) RETURN n\r\n",
      server.received()
    );
    assert_eq!(1, client.pool_status().size);
    assert_released(&client);
  }

  #[test_log::test(tokio::test)]
  async fn query_with_escapes_text_arguments() {
    let server = FakeServer::start(vec![Canned::Reply(QUERY_REPLY)]).await;
    let client = server.client("social");

    client
      .query_with("MATCH (n {name:%s}) RETURN n", &["O'Brien".into()])
      .await
      .unwrap();

    let query = r"MATCH (n {name:'O\'Brien'}) RETURN n";
    assert_eq!(
      format!(
        "*3\r\n$11\r\nGRAPH.QUERY\r\n$6\r\nsocial\r\n${}\r\n{}\r\n",
        query.len(),
        query
      ),
      server.received()
    );
  }

  #[test_log::test(tokio::test)]
  async fn query_with_no_placeholders_matches_query() {
    let server = FakeServer::start(vec![Canned::Reply(QUERY_REPLY), Canned::Reply(QUERY_REPLY)]).await;
    let client = server.client("social");

    client.query("MATCH (n) RETURN count(n)").await.unwrap();
    let first = server.received();

    client.query_with("MATCH (n) RETURN count(n)", &[]).await.unwrap();
    let both = server.received();

    assert_eq!(format!("{}{}", first, first), both);
    // Sequential calls reuse the pooled connection.
    assert_eq!(1, server.connections());
  }

  #[test_log::test(tokio::test)]
  async fn delete_graph_returns_status_verbatim() {
    let status = "Graph removed, internal execution time: 0.0312 milliseconds";
    let server = FakeServer::start(vec![Canned::Reply(
      "+Graph removed, internal execution time: 0.0312 milliseconds\r\n",
    )])
    .await;
    let client = server.client("social");

    assert_eq!(status, client.delete_graph().await.unwrap());
    assert_eq!(
      "*2\r\n$12\r\nGRAPH.DELETE\r\n$6\r\nsocial\r\n",
      server.received()
    );
    assert_released(&client);
  }

  #[test_log::test(tokio::test)]
  async fn delete_graph_accepts_bulk_status() {
    let server = FakeServer::start(vec![Canned::Reply("$13\r\nGraph removed\r\n")]).await;
    let client = server.client("");

    assert_eq!("Graph removed", client.delete_graph().await.unwrap());
    // An empty graph id is sent as is.
    assert_eq!("*2\r\n$12\r\nGRAPH.DELETE\r\n$0\r\n\r\n", server.received());
  }

  #[test_log::test(tokio::test)]
  async fn server_error_releases_connection() {
    let server = FakeServer::start(vec![
      Canned::Reply("-errMsg: Invalid input 'X'\r\n"),
      Canned::Reply(QUERY_REPLY),
    ])
    .await;
    let client = server.client("social");

    match client.query("XMATCH (n) RETURN n").await {
      Err(GraphError::Server(message)) => assert_eq!("errMsg: Invalid input 'X'", message),
      other => panic!("expected server error, got {:?}", other),
    }
    assert_released(&client);

    // The connection is still in sync with the server and gets reused.
    client.query("MATCH (n) RETURN n").await.unwrap();
    assert_eq!(1, server.connections());
  }

  #[test_log::test(tokio::test)]
  async fn unexpected_reply_is_a_protocol_error() {
    let server = FakeServer::start(vec![Canned::Reply("+OK\r\n"), Canned::Reply(":1\r\n")]).await;
    let client = server.client("social");

    let error = client.query("MATCH (n) RETURN n").await.unwrap_err();
    assert!(error.is_protocol(), "error: {:?}", error);
    assert_released(&client);

    let error = client.delete_graph().await.unwrap_err();
    assert!(error.is_protocol(), "error: {:?}", error);
    assert_released(&client);
  }

  #[test_log::test(tokio::test)]
  async fn hangup_mid_reply_discards_connection() {
    let server = FakeServer::start(vec![
      Canned::Hangup("*3\r\n*1\r\n$6\r\nn.na"),
      Canned::Reply(QUERY_REPLY),
    ])
    .await;
    let client = server.client("social");

    let error = client.query("MATCH (n) RETURN n").await.unwrap_err();
    assert!(matches!(error, GraphError::ConnectionClosed), "error: {:?}", error);
    assert!(error.is_transport());
    assert_released(&client);

    // The broken connection is dropped on recycle and a fresh one opened.
    assert_eq!(query_reply_value(), client.query("MATCH (n) RETURN n").await.unwrap());
    assert_eq!(2, server.connections());
    assert_eq!(1, client.pool_status().size);
  }

  #[test_log::test(tokio::test)]
  async fn cancelled_query_does_not_leak_its_reply() {
    let server = FakeServer::start(vec![
      Canned::Delayed(300, "*1\r\n$5\r\nFIRST\r\n"),
      Canned::Reply("*1\r\n$6\r\nSECOND\r\n"),
    ])
    .await;
    let client = server.client("social");

    let timed_out = tokio::time::timeout(Duration::from_millis(50), client.query("RETURN 'first'")).await;
    assert!(timed_out.is_err());
    assert_released(&client);

    // The first reply is still on its way, so that connection is discarded.
    assert_eq!(
      Value::Array(vec![bulk("SECOND")]),
      client.query("RETURN 'second'").await.unwrap()
    );
    assert_eq!(2, server.connections());
    assert_eq!(1, client.pool_status().size);
  }

  #[test_log::test(tokio::test)]
  async fn template_error_happens_before_any_io() {
    let server = FakeServer::start(vec![]).await;
    let client = server.client("social");

    let error = client
      .query_with("MATCH (n {age:%d}) RETURN n", &["ten".into()])
      .await
      .unwrap_err();

    assert!(matches!(error, GraphError::Template(_)), "error: {:?}", error);
    assert_eq!(0, client.pool_status().size);
    assert_eq!("", server.received());
  }

  #[test_log::test(tokio::test)]
  async fn connection_refused_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = GraphClient::connect("social", &addr.ip().to_string(), addr.port()).unwrap();

    let error = client.query("MATCH (n) RETURN n").await.unwrap_err();
    assert!(matches!(error, GraphError::Io(_)), "error: {:?}", error);
    assert!(error.is_transport());
  }

  #[test_log::test(tokio::test)]
  async fn shared_pool_outlives_client() {
    let server = FakeServer::start(vec![Canned::Reply(QUERY_REPLY)]).await;
    let pool = pool::build(&ClientConfig {
      host: server.addr.ip().to_string(),
      port: server.addr.port(),
      ..ClientConfig::default()
    })
    .unwrap();

    let client = GraphClient::with_pool("social", pool.clone());
    assert!(!client.owns_pool());
    client.query("MATCH (n) RETURN n").await.unwrap();
    drop(client);

    assert!(!pool.is_closed());
    assert_eq!(1, pool.status().available);
  }

  #[test_log::test(tokio::test)]
  async fn owned_pool_closes_with_client() {
    let client = GraphClient::new("social").unwrap();
    assert!(client.owns_pool());
    assert_eq!("social", client.graph_id());

    let pool = client.pool.pool().clone();
    drop(client);

    assert!(pool.is_closed());
  }

  #[test_log::test(tokio::test)]
  async fn concurrent_queries_use_separate_connections() {
    // Slow replies keep every connection busy while the other tasks ask for one.
    let server = FakeServer::start((0..4).map(|_| Canned::Delayed(100, QUERY_REPLY)).collect()).await;
    let client = Arc::new(server.client("social"));

    let tasks: Vec<_> = (0..4)
      .map(|i| {
        let client = client.clone();
        tokio::spawn(async move { client.query_with("MATCH (n) RETURN n LIMIT %d", &[i.into()]).await })
      })
      .collect();

    for task in tasks {
      assert_eq!(query_reply_value(), task.await.unwrap().unwrap());
    }

    assert_released(&client);
    assert!(server.connections() > 1, "connections: {}", server.connections());
    assert_eq!(server.connections(), client.pool_status().size);
  }
}
