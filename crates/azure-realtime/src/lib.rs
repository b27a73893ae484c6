//! Client for the Azure OpenAI realtime chat protocol.
//!
//! The protocol runs over a single persistent websocket. The server first
//! confirms the session with a `session.created` event; each conversational
//! turn is then a fixed sequence of client events (`conversation.item.create`,
//! `response.create`) followed by a stream of server events that ends with
//! `response.done` or an error frame.
//!
//! The crate is layered leaves-first: [`transport`] moves whole text frames,
//! [`codec`] turns frames into typed [`events`], [`session`] negotiates and
//! owns the connection, and the turn executor drives one exchange at a time.
//! [`ChatClient`] is the facade most callers want.

pub mod client;
pub mod codec;
pub mod config;
pub mod conversation;
pub mod error;
pub mod events;
pub mod session;
pub mod transport;
mod turn;

pub use client::ChatClient;
pub use config::{ConnectionConfig, HistoryMode};
pub use conversation::{Conversation, Role, Turn};
pub use error::{DecodeError, NegotiateError, TransportError, TurnError};
pub use session::{Session, SessionState};
pub use transport::{Transport, WsTransport};
