//! Session negotiation and lifecycle.
//!
//! Negotiation opens the transport and waits for the server's
//! `session.created` confirmation; no other event may be processed before
//! it. There is no retry here: a failed attempt leaves nothing behind, and
//! the caller decides whether to try again.

use crate::codec;
use crate::config::{ConnectionConfig, HistoryMode};
use crate::conversation::Conversation;
use crate::error::{DecodeError, NegotiateError, TurnError};
use crate::events::{ClientEvent, ServerEvent, SessionRequest};
use crate::transport::{Transport, WsTransport};
use crate::turn::TurnExchange;
use secrecy::ExposeSecret;
use std::fmt;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Negotiating,
    Active,
    Closed,
    Failed,
}

/// One negotiated connection context. Owns its transport exclusively; a
/// session is used for turns while `Active` and discarded after its last
/// use.
pub struct Session {
    id: String,
    state: SessionState,
    history: HistoryMode,
    transport: Box<dyn Transport>,
}

// Not derivable past the boxed transport.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Opens a transport to the configured endpoint and performs the
    /// handshake.
    pub async fn negotiate(config: &ConnectionConfig) -> Result<Self, NegotiateError> {
        let url = config.websocket_url();
        let headers = [
            (
                "Authorization",
                format!("Bearer {}", config.api_key.expose_secret()),
            ),
            ("Content-Type", "application/json".to_string()),
            ("api-key", config.api_key.expose_secret().to_string()),
        ];
        let transport = WsTransport::open(
            &url,
            &headers,
            config.connect_timeout,
            config.receive_timeout,
        )
        .await?;
        Self::negotiate_over(Box::new(transport), config).await
    }

    /// Performs the handshake on an already-open transport. This is the seam
    /// for callers that manage their own connections (and for stub-backed
    /// tests).
    pub async fn negotiate_over(
        mut transport: Box<dyn Transport>,
        config: &ConnectionConfig,
    ) -> Result<Self, NegotiateError> {
        match handshake(transport.as_mut(), config).await {
            Ok(id) => {
                info!(session_id = %id, "session negotiated");
                Ok(Self {
                    id,
                    state: SessionState::Active,
                    history: config.history,
                    transport,
                })
            }
            Err(err) => {
                // The transport never outlives a failed negotiation.
                transport.close().await;
                Err(err)
            }
        }
    }

    /// Runs one conversational turn and returns the assistant's reply.
    ///
    /// Turns on a session are strictly serialized: the protocol has no
    /// request correlation ids, so `&mut self` rules out interleaving at
    /// compile time. The pending user text is passed separately from the
    /// stored conversation so a failed turn leaves the transcript untouched.
    pub async fn execute_turn(
        &mut self,
        conversation: &Conversation,
        user_text: &str,
    ) -> Result<String, TurnError> {
        if self.state != SessionState::Active {
            return Err(TurnError::SessionNotActive(self.state));
        }
        let exchange = TurnExchange::new(self.transport.as_mut(), self.history);
        let result = exchange.run(conversation, user_text).await;
        if matches!(
            result,
            Err(TurnError::ConnectionClosed
                | TurnError::Timeout
                | TurnError::Transport(_)
                | TurnError::Decode(_))
        ) {
            // The socket is gone or the event stream is desynchronized
            // (an undecodable frame leaves the response's remaining events
            // in flight); only a fresh negotiation can recover.
            self.state = SessionState::Failed;
        }
        result
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    /// Closes the underlying transport. Idempotent; also unblocks any
    /// in-flight `receive` with a closed-connection error.
    pub async fn close(&mut self) {
        self.transport.close().await;
        if self.state == SessionState::Active {
            self.state = SessionState::Closed;
        }
    }
}

async fn handshake(
    transport: &mut dyn Transport,
    config: &ConnectionConfig,
) -> Result<String, NegotiateError> {
    if config.announce_session {
        let event = ClientEvent::SessionCreate {
            session: SessionRequest {
                deployment_id: config.deployment.clone(),
                output_format: "text".to_string(),
            },
        };
        let frame = codec::encode(&event).map_err(DecodeError::from)?;
        transport.send(frame).await?;
    }

    let raw = transport.receive().await?;
    match codec::decode(&raw)? {
        ServerEvent::SessionCreated { session } => {
            session.id.ok_or(NegotiateError::MissingSessionId)
        }
        ServerEvent::Error { error } => Err(NegotiateError::Rejected(error.to_string())),
        other => {
            debug!(event_type = other.event_type(), raw = %raw, "handshake got the wrong event");
            Err(NegotiateError::UnexpectedHandshake {
                event_type: other.event_type().to_string(),
                raw,
            })
        }
    }
}
