//! High-level chat facade for upstream callers (a voice loop, a text
//! console). Owns one session and the running transcript.

use crate::config::ConnectionConfig;
use crate::conversation::{Conversation, Turn};
use crate::error::{NegotiateError, TurnError};
use crate::session::Session;
use tracing::info;

pub struct ChatClient {
    config: ConnectionConfig,
    session: Session,
    conversation: Conversation,
}

impl ChatClient {
    /// Negotiates a session and seeds the conversation with the system
    /// prompt.
    pub async fn connect(
        config: ConnectionConfig,
        system_prompt: impl Into<String>,
    ) -> Result<Self, NegotiateError> {
        let session = Session::negotiate(&config).await?;
        Ok(Self {
            config,
            session,
            conversation: Conversation::with_system_prompt(system_prompt),
        })
    }

    /// Submits one user utterance and returns the assistant's reply.
    ///
    /// The user and assistant turns are appended to the transcript only
    /// after the exchange completes, so a failed turn can be retried with
    /// the same input.
    pub async fn submit_user_utterance(&mut self, text: &str) -> Result<String, TurnError> {
        let reply = self.session.execute_turn(&self.conversation, text).await?;
        self.conversation.push(Turn::user(text));
        self.conversation.push(Turn::assistant(reply.clone()));
        Ok(reply)
    }

    /// Replaces a dead session with a freshly negotiated one, keeping the
    /// transcript. Intended for recovery after
    /// [`TurnError::ConnectionClosed`].
    pub async fn reconnect(&mut self) -> Result<(), NegotiateError> {
        self.session.close().await;
        self.session = Session::negotiate(&self.config).await?;
        info!("session re-negotiated");
        Ok(())
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub async fn close(mut self) {
        self.session.close().await;
    }
}
