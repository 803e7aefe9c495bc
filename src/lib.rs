//! Single-server IRC relay
//!
//! A small IRC server built on tokio that relays messages between users
//! and channels on one host.
//!
//! # Features
//! - Registration with optional connection password (PASS/NICK/USER)
//! - Channels with operators, topics and `n`/`t` modes
//! - Channel and private messages (PRIVMSG/NOTICE)
//! - User modes `i`, `w`, `o` and server operators (OPER/KILL/DIE)
//! - PING/PONG liveness checks and bounded per-user send queues
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `Server` is the single task that owns every user and channel
//! - Each connection has a task that frames lines and writes replies
//! - No locks needed; all state access goes through the server task
//!
//! # Example
//! ```ignore
//! use ircrelay::{Config, Server};
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let listener = TcpListener::bind(config.listen_addr()).await?;
//!     Server::new(config).run(listener).await;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod framer;
pub mod handlers;
pub mod registry;
pub mod reply;
pub mod server;
pub mod types;
pub mod user;

#[cfg(test)]
mod test_support;

// Re-export main types for convenience
pub use channel::Channel;
pub use command::{Dispatcher, Message};
pub use config::{Config, OperatorConfig};
pub use connection::handle_connection;
pub use error::{AppError, CommandError, FrameError, SendError};
pub use framer::LineFramer;
pub use registry::Registry;
pub use reply::{Numeric, NumericReply};
pub use server::{Server, ServerCommand, ServerState};
pub use types::ClientId;
pub use user::{Registration, User};
