//! The per-turn protocol state machine.
//!
//! One turn is: submit the conversation item, wait for its ack, request a
//! response, then pump server events until `response.done` or an error
//! frame. Intermediate streaming events are discarded; a synchronous reply
//! only needs the completion event.

use crate::codec;
use crate::config::HistoryMode;
use crate::conversation::Conversation;
use crate::error::{DecodeError, TurnError};
use crate::events::{
    ClientEvent, InputPart, MessageItem, ResponsePayload, ResponseRequest, ServerEvent,
};
use crate::transport::Transport;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    SubmitContent,
    RequestResponse,
    StreamEvents,
}

/// Working state for one in-flight exchange. Owned by the executor for the
/// duration of a single turn and discarded afterwards.
pub(crate) struct TurnExchange<'a> {
    transport: &'a mut dyn Transport,
    history: HistoryMode,
    stage: Stage,
}

impl<'a> TurnExchange<'a> {
    pub(crate) fn new(transport: &'a mut dyn Transport, history: HistoryMode) -> Self {
        Self {
            transport,
            history,
            stage: Stage::SubmitContent,
        }
    }

    pub(crate) async fn run(
        mut self,
        conversation: &Conversation,
        user_text: &str,
    ) -> Result<String, TurnError> {
        self.submit_content(conversation, user_text).await?;
        self.request_response().await?;
        self.stream_events().await
    }

    async fn submit_content(
        &mut self,
        conversation: &Conversation,
        user_text: &str,
    ) -> Result<(), TurnError> {
        debug_assert_eq!(self.stage, Stage::SubmitContent);
        let content = match self.history {
            HistoryMode::LatestOnly => vec![InputPart::text(user_text)],
            HistoryMode::FullHistory => conversation
                .turns()
                .iter()
                .map(|turn| InputPart::text(turn.content.clone()))
                .chain(std::iter::once(InputPart::text(user_text)))
                .collect(),
        };
        let event = ClientEvent::ConversationItemCreate {
            item: MessageItem::user(content),
        };
        self.send(&event).await?;

        match self.receive().await? {
            ServerEvent::Error { error } => Err(TurnError::ItemCreateRejected(error.to_string())),
            ServerEvent::ConversationItemCreated { item } => {
                debug!(item_id = ?item.and_then(|i| i.id), "conversation item acknowledged");
                self.stage = Stage::RequestResponse;
                Ok(())
            }
            other => Err(TurnError::UnexpectedEvent(other.event_type().to_string())),
        }
    }

    async fn request_response(&mut self) -> Result<(), TurnError> {
        debug_assert_eq!(self.stage, Stage::RequestResponse);
        let event = ClientEvent::ResponseCreate {
            response: ResponseRequest::default(),
        };
        self.send(&event).await?;
        self.stage = Stage::StreamEvents;
        Ok(())
    }

    async fn stream_events(&mut self) -> Result<String, TurnError> {
        debug_assert_eq!(self.stage, Stage::StreamEvents);
        loop {
            match self.receive().await? {
                ServerEvent::Error { error } => {
                    return Err(TurnError::StreamError(error.to_string()));
                }
                ServerEvent::ResponseDone { response } => {
                    return extract_reply(&response).ok_or(TurnError::EmptyReply);
                }
                other => {
                    // Partial/streaming notifications; not needed for a
                    // synchronous reply.
                    debug!(event_type = other.event_type(), "ignoring intermediate event");
                }
            }
        }
    }

    async fn send(&mut self, event: &ClientEvent) -> Result<(), TurnError> {
        let frame = codec::encode(event).map_err(DecodeError::from)?;
        self.transport.send(frame).await.map_err(TurnError::from)
    }

    async fn receive(&mut self) -> Result<ServerEvent, TurnError> {
        let raw = self.transport.receive().await?;
        Ok(codec::decode(&raw)?)
    }
}

/// Picks the reply out of a completion payload: the first `message` output
/// item authored by the assistant, and within it the first content part that
/// actually carries a transcript (`audio` with a transcript, or `text`).
fn extract_reply(response: &ResponsePayload) -> Option<String> {
    response
        .output
        .iter()
        .find(|item| {
            item.kind.as_deref() == Some("message") && item.role.as_deref() == Some("assistant")
        })
        .and_then(|item| {
            item.content.iter().find_map(|part| match part.kind.as_deref() {
                Some("audio") => part.transcript.clone(),
                Some("text") => part.text.clone(),
                _ => None,
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Turn;
    use crate::error::TransportError;
    use crate::transport::stub::StubTransport;
    use std::time::Duration;

    const ITEM_CREATED: &str = r#"{"type":"conversation.item.created","item":{"id":"item_1"}}"#;

    fn done_with_audio_transcript(transcript: &str) -> String {
        format!(
            r#"{{"type":"response.done","response":{{"status":"completed","output":[{{"type":"message","role":"assistant","content":[{{"type":"audio","transcript":"{transcript}"}}]}}]}}}}"#
        )
    }

    fn conversation() -> Conversation {
        let mut conversation = Conversation::with_system_prompt("be brief");
        conversation.push(Turn::user("hi"));
        conversation.push(Turn::assistant("hello"));
        conversation
    }

    async fn run(
        stub: StubTransport,
        history: HistoryMode,
        user_text: &str,
    ) -> Result<String, TurnError> {
        let mut transport: Box<dyn crate::transport::Transport> = Box::new(stub);
        TurnExchange::new(transport.as_mut(), history)
            .run(&conversation(), user_text)
            .await
    }

    #[tokio::test]
    async fn completed_turn_returns_the_transcript() {
        let done = done_with_audio_transcript("Hello!");
        let (stub, sent) = StubTransport::scripted(&[ITEM_CREATED, &done]);
        let reply = run(stub, HistoryMode::LatestOnly, "hi there").await.unwrap();
        assert_eq!(reply, "Hello!");

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        let first: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
        assert_eq!(first["type"], "conversation.item.create");
        assert_eq!(first["item"]["role"], "user");
        assert_eq!(sent[1], r#"{"type":"response.create","response":{}}"#);
    }

    #[tokio::test]
    async fn latest_only_sends_one_part() {
        let done = done_with_audio_transcript("ok");
        let (stub, sent) = StubTransport::scripted(&[ITEM_CREATED, &done]);
        run(stub, HistoryMode::LatestOnly, "just this").await.unwrap();

        let sent = sent.lock().unwrap();
        let item: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
        let parts = item["item"]["content"].as_array().unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0]["type"], "input_text");
        assert_eq!(parts[0]["text"], "just this");
    }

    #[tokio::test]
    async fn full_history_sends_every_turn_plus_the_pending_text() {
        let done = done_with_audio_transcript("ok");
        let (stub, sent) = StubTransport::scripted(&[ITEM_CREATED, &done]);
        run(stub, HistoryMode::FullHistory, "latest").await.unwrap();

        let sent = sent.lock().unwrap();
        let item: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
        let parts = item["item"]["content"].as_array().unwrap();
        let texts: Vec<&str> = parts.iter().map(|p| p["text"].as_str().unwrap()).collect();
        assert_eq!(texts, vec!["be brief", "hi", "hello", "latest"]);
    }

    #[tokio::test]
    async fn error_frame_during_item_ack_rejects_the_item() {
        let (stub, sent) = StubTransport::scripted(&[
            r#"{"type":"error","error":{"message":"content policy"}}"#,
        ]);
        let err = run(stub, HistoryMode::LatestOnly, "hi").await.unwrap_err();
        assert!(matches!(err, TurnError::ItemCreateRejected(detail) if detail.contains("content policy")));
        // Nothing after the failed create.
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn wrong_ack_event_is_an_unexpected_event() {
        let (stub, _sent) =
            StubTransport::scripted(&[r#"{"type":"session.created","session":{"id":"s1"}}"#]);
        let err = run(stub, HistoryMode::LatestOnly, "hi").await.unwrap_err();
        assert!(matches!(err, TurnError::UnexpectedEvent(kind) if kind == "session.created"));
    }

    #[tokio::test]
    async fn error_frame_mid_stream_stops_the_turn_with_no_further_sends() {
        let (stub, sent) = StubTransport::scripted(&[
            ITEM_CREATED,
            r#"{"type":"error","error":{"message":"rate limited"}}"#,
        ]);
        let err = run(stub, HistoryMode::LatestOnly, "hi").await.unwrap_err();
        assert!(matches!(err, TurnError::StreamError(detail) if detail.contains("rate limited")));
        assert_eq!(sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn intermediate_events_are_discarded() {
        let done = done_with_audio_transcript("after the noise");
        let (stub, _sent) = StubTransport::scripted(&[
            ITEM_CREATED,
            r#"{"type":"response.created","response":{}}"#,
            r#"{"type":"response.audio.delta","delta":"xxxx"}"#,
            r#"{"type":"response.audio_transcript.delta","delta":"after"}"#,
            &done,
        ]);
        let reply = run(stub, HistoryMode::LatestOnly, "hi").await.unwrap();
        assert_eq!(reply, "after the noise");
    }

    #[tokio::test]
    async fn closed_transport_mid_stream_is_connection_closed() {
        let (stub, _sent) = StubTransport::scripted(&[ITEM_CREATED]);
        let err = run(stub, HistoryMode::LatestOnly, "hi").await.unwrap_err();
        assert!(matches!(err, TurnError::ConnectionClosed));
    }

    #[tokio::test]
    async fn receive_timeout_surfaces_as_timeout() {
        let (mut stub, _sent) = StubTransport::scripted(&[ITEM_CREATED]);
        stub.push_inbound_error(TransportError::Timeout(Duration::from_millis(50)));
        let err = run(stub, HistoryMode::LatestOnly, "hi").await.unwrap_err();
        assert!(matches!(err, TurnError::Timeout));
    }

    #[tokio::test]
    async fn completion_without_an_assistant_message_is_an_empty_reply() {
        let (stub, _sent) = StubTransport::scripted(&[
            ITEM_CREATED,
            r#"{"type":"response.done","response":{"status":"completed","output":[{"type":"function_call","role":"assistant"}]}}"#,
        ]);
        let err = run(stub, HistoryMode::LatestOnly, "hi").await.unwrap_err();
        assert!(matches!(err, TurnError::EmptyReply));
    }

    #[test]
    fn extraction_skips_non_assistant_items_and_empty_audio_parts() {
        let raw = r#"{
            "status": "completed",
            "output": [
                {"type": "message", "role": "system", "content": [{"type": "text", "text": "not me"}]},
                {"type": "message", "role": "assistant", "content": [
                    {"type": "audio"},
                    {"type": "text", "text": "the reply"}
                ]}
            ]
        }"#;
        let payload: ResponsePayload = serde_json::from_str(raw).unwrap();
        assert_eq!(extract_reply(&payload).as_deref(), Some("the reply"));
    }
}
