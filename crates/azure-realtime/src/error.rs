//! Typed failure taxonomy. Every operation returns one of these; nothing is
//! retried or swallowed inside the crate.

use crate::session::SessionState;
use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

/// Failures at the socket layer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect: {0}")]
    Connect(#[source] WsError),
    #[error("TLS handshake failed: {0}")]
    Tls(#[source] WsError),
    #[error("invalid websocket URL: {0}")]
    InvalidUrl(#[source] WsError),
    #[error("invalid value for header `{0}`")]
    InvalidHeader(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection closed by remote")]
    Closed,
    #[error("websocket error: {0}")]
    Ws(#[source] WsError),
}

/// Failures turning wire frames into typed events (or back).
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("event is missing the `type` discriminator")]
    MissingType,
    #[error("malformed `{event_type}` payload: {source}")]
    Malformed {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures establishing a session. All of these are fatal to the attempt;
/// the caller decides whether to negotiate again.
#[derive(Debug, Error)]
pub enum NegotiateError {
    #[error("transport failed during negotiation: {0}")]
    Transport(#[from] TransportError),
    #[error("malformed handshake frame: {0}")]
    Decode(#[from] DecodeError),
    /// The first event was not `session.created`. Keeps the raw frame for
    /// diagnostics.
    #[error("expected session.created, got `{event_type}`")]
    UnexpectedHandshake { event_type: String, raw: String },
    #[error("server rejected the session: {0}")]
    Rejected(String),
    #[error("session.created carried no session id")]
    MissingSessionId,
}

/// Failures of a single turn. `ConnectionClosed`, `Timeout` and `Transport`
/// leave the session dead; the rest leave it usable for another turn.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("session is {0:?}, not active")]
    SessionNotActive(SessionState),
    #[error("server rejected the conversation item: {0}")]
    ItemCreateRejected(String),
    #[error("expected conversation.item.created, got `{0}`")]
    UnexpectedEvent(String),
    #[error("server reported an error mid-stream: {0}")]
    StreamError(String),
    #[error("connection closed before the response completed")]
    ConnectionClosed,
    #[error("response contained no assistant transcript")]
    EmptyReply,
    #[error("timed out waiting for a server event")]
    Timeout,
    #[error("transport failed mid-turn: {0}")]
    Transport(#[source] TransportError),
    #[error("could not decode server event: {0}")]
    Decode(#[from] DecodeError),
}

impl From<TransportError> for TurnError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Closed => TurnError::ConnectionClosed,
            TransportError::Timeout(_) => TurnError::Timeout,
            other => TurnError::Transport(other),
        }
    }
}
