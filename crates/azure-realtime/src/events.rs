//! Typed wire events.
//!
//! Outbound events are a closed set with fixed payload shapes, so they get
//! strict serde enums. Inbound payloads are modelled as lenient structs with
//! `Option` fields: the server is free to add fields, and additions must
//! never break decoding.

use crate::conversation::Role;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Events the client sends to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.create")]
    SessionCreate { session: SessionRequest },
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: MessageItem },
    #[serde(rename = "response.create")]
    ResponseCreate { response: ResponseRequest },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub deployment_id: String,
    pub output_format: String,
}

/// A message item submitted via `conversation.item.create`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub role: Role,
    pub content: Vec<InputPart>,
}

impl MessageItem {
    /// A user-authored message carrying the given content parts.
    pub fn user(content: Vec<InputPart>) -> Self {
        Self {
            kind: "message".to_string(),
            role: Role::User,
            content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputPart {
    InputText { text: String },
}

impl InputPart {
    pub fn text(text: impl Into<String>) -> Self {
        InputPart::InputText { text: text.into() }
    }
}

/// Response configuration sent with `response.create`. The defaults are
/// empty on purpose; the wire form is `{}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseRequest {}

/// Events the server sends to the client.
///
/// Only the discriminators the turn lifecycle depends on are typed; anything
/// else lands in [`ServerEvent::Unknown`] and is handled by one explicit
/// ignore-and-continue branch.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "session.created")]
    SessionCreated { session: SessionAck },
    #[serde(rename = "conversation.item.created")]
    ConversationItemCreated {
        #[serde(default)]
        item: Option<ItemAck>,
    },
    #[serde(rename = "response.done")]
    ResponseDone { response: ResponsePayload },
    #[serde(rename = "error")]
    Error { error: ApiError },
    #[serde(skip)]
    Unknown { event_type: String },
}

impl ServerEvent {
    pub fn event_type(&self) -> &str {
        match self {
            ServerEvent::SessionCreated { .. } => "session.created",
            ServerEvent::ConversationItemCreated { .. } => "conversation.item.created",
            ServerEvent::ResponseDone { .. } => "response.done",
            ServerEvent::Error { .. } => "error",
            ServerEvent::Unknown { event_type } => event_type,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionAck {
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemAck {
    #[serde(default)]
    pub id: Option<String>,
}

/// Payload of `response.done`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponsePayload {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub output: Vec<OutputItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputItem {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Vec<OutputPart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputPart {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub transcript: Option<String>,
}

/// The `error` object attached to failure events.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => write!(f, "{message} ({code})"),
            (None, Some(message)) => write!(f, "{message}"),
            (Some(code), None) => write!(f, "error code {code}"),
            (None, None) => write!(f, "unspecified server error"),
        }
    }
}
