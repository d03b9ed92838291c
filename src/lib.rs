//! Multi-room WebSocket chat: session layer
//!
//! Manages one long-lived WebSocket per connected user and connects it to
//! the hub of the room it joined.
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - Each room has a `Hub` actor owning the roster; sessions talk to it
//!   through a `HubHandle`
//! - Each connection runs a reader task and a writer task
//! - The writer is the only task writing to the socket; the hub reaches it
//!   through the session's bounded mailbox
//! - Liveness: the writer pings every `ping_period`, the reader drops the
//!   session when nothing arrives within `pong_wait`
//! - Whichever task ends first unregisters the session, exactly once
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use room_session::{handle_connection, HubRegistry, RoomId, SessionConfig, UserDirectory};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     let registry = Arc::new(HubRegistry::spawn([RoomId(1)]));
//!     let users = Arc::new(UserDirectory::new());
//!     let config = Arc::new(SessionConfig::default());
//!
//!     while let Ok((stream, _)) = listener.accept().await {
//!         tokio::spawn(handle_connection(stream, registry.clone(), users.clone(), config.clone()));
//!     }
//! }
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod hub;
pub mod message;
pub mod registry;
pub mod room;
pub mod session;
pub mod types;
pub mod user;

// Re-export main types for convenience
pub use client::{Client, Outbound};
pub use codec::{decode, encode, MAX_FRAME_SIZE};
pub use config::{Config, SessionConfig};
pub use error::{AppError, AuthError, CodecError, ConfigError, ManageError, SendError};
pub use handler::handle_connection;
pub use hub::{Hub, HubCommand, HubHandle};
pub use message::{Action, Message, UserRef};
pub use registry::HubRegistry;
pub use room::Room;
pub use session::{SessionState, Teardown};
pub use types::{RoomId, SessionId};
pub use user::{Authenticator, Member, Role, User, UserDirectory};
