//! Client for graphs stored in a Redis server running the RedisGraph module.
//!
//! A [`GraphClient`] is bound to one graph id and sends two commands:
//!
//! ```terminal
//! GRAPH.QUERY <graph id> <query>    -- answered with a nested array
//! GRAPH.DELETE <graph id>           -- answered with a status line
//! ```
//!
//! Replies come back as an undecoded [`Value`]; turning a query reply into
//! headers, rows and statistics is left to the caller.
//!
//! ```no_run
//! use redisgraph::GraphClient;
//!
//! # async fn run() -> Result<(), redisgraph::GraphError> {
//! let client = GraphClient::connect("social", "127.0.0.1", 6379)?;
//!
//! client.query("CREATE (:person {name:'roi', age:32})").await?;
//! let reply = client
//!   .query_with("MATCH (p:person {name:%s}) RETURN p.age", &["roi".into()])
//!   .await?;
//! println!("{}", reply);
//!
//! println!("{}", client.delete_graph().await?);
//! # Ok(())
//! # }
//! ```
mod client;
mod command;
mod config;
mod connection;
mod error;
mod pool;
pub mod resp;
pub mod template;
mod value;

pub use client::GraphClient;
pub use command::{Command, Reply, ReplyKind};
pub use config::{ClientConfig, DEFAULT_HOST, DEFAULT_PORT};
pub use connection::Connection;
pub use error::GraphError;
pub use pool::{ConnectionManager, Pool};
pub use template::{escape_text, format_query, QueryArg, TemplateError};
pub use value::Value;
