//! Pure translation between wire frames and typed events. No protocol state
//! lives here.

use crate::error::DecodeError;
use crate::events::{ApiError, ClientEvent, ServerEvent};
use serde_json::Value;

/// Serializes an outbound event to its wire frame.
pub fn encode(event: &ClientEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}

/// Parses an inbound frame into a typed [`ServerEvent`].
///
/// Two rules govern leniency:
/// - a frame carrying an `error` object decodes to [`ServerEvent::Error`]
///   no matter what its `type` says, because such frames are always terminal
///   for the current operation;
/// - a frame with an unrecognized `type` decodes to [`ServerEvent::Unknown`]
///   rather than failing, so new server-side event kinds never break the
///   stream loop.
///
/// Decoding fails only when the `type` discriminator is missing or a known
/// payload is structurally malformed.
pub fn decode(raw: &str) -> Result<ServerEvent, DecodeError> {
    let value: Value = serde_json::from_str(raw)?;
    let event_type = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)?
        .to_string();

    if let Some(error) = value.get("error") {
        let error: ApiError = serde_json::from_value(error.clone()).unwrap_or_else(|_| ApiError {
            code: None,
            message: Some(error.to_string()),
        });
        return Ok(ServerEvent::Error { error });
    }

    match event_type.as_str() {
        "session.created" | "conversation.item.created" | "response.done" => {
            serde_json::from_value(value)
                .map_err(|source| DecodeError::Malformed { event_type, source })
        }
        "error" => Ok(ServerEvent::Error {
            error: ApiError::default(),
        }),
        _ => Ok(ServerEvent::Unknown { event_type }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;
    use crate::events::{InputPart, MessageItem, ResponseRequest};

    #[test]
    fn session_created_decodes_with_extra_fields() {
        let raw = r#"{"type":"session.created","event_id":"ev_1","session":{"id":"s1","expires_at":12345}}"#;
        match decode(raw).unwrap() {
            ServerEvent::SessionCreated { session } => assert_eq!(session.id.as_deref(), Some("s1")),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_not_fatal() {
        let raw = r#"{"type":"response.output_item.added","item":{"id":"i1"}}"#;
        match decode(raw).unwrap() {
            ServerEvent::Unknown { event_type } => {
                assert_eq!(event_type, "response.output_item.added");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn missing_type_fails() {
        assert!(matches!(
            decode(r#"{"session":{"id":"s1"}}"#),
            Err(DecodeError::MissingType)
        ));
    }

    #[test]
    fn error_field_wins_over_the_declared_type() {
        let raw = r#"{"type":"response.done","error":{"message":"rate limited","code":"429"}}"#;
        match decode(raw).unwrap() {
            ServerEvent::Error { error } => {
                assert_eq!(error.message.as_deref(), Some("rate limited"));
                assert_eq!(error.code.as_deref(), Some("429"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn malformed_known_payload_fails_with_the_event_type() {
        let raw = r#"{"type":"session.created","session":42}"#;
        match decode(raw) {
            Err(DecodeError::Malformed { event_type, .. }) => {
                assert_eq!(event_type, "session.created");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn item_create_round_trips_role_and_text() {
        let event = ClientEvent::ConversationItemCreate {
            item: MessageItem::user(vec![
                InputPart::text("you are helpful"),
                InputPart::text("hello there"),
            ]),
        };
        let frame = encode(&event).unwrap();
        let back: ClientEvent = serde_json::from_str(&frame).unwrap();
        match back {
            ClientEvent::ConversationItemCreate { item } => {
                assert_eq!(item.role, Role::User);
                assert_eq!(
                    item.content,
                    vec![
                        InputPart::text("you are helpful"),
                        InputPart::text("hello there"),
                    ]
                );
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn response_create_wire_form_is_fixed() {
        let frame = encode(&ClientEvent::ResponseCreate {
            response: ResponseRequest::default(),
        })
        .unwrap();
        assert_eq!(frame, r#"{"type":"response.create","response":{}}"#);
    }

    #[test]
    fn session_create_carries_deployment_and_format() {
        let frame = encode(&ClientEvent::SessionCreate {
            session: crate::events::SessionRequest {
                deployment_id: "gpt-4o-realtime".to_string(),
                output_format: "text".to_string(),
            },
        })
        .unwrap();
        assert_eq!(
            frame,
            r#"{"type":"session.create","session":{"deployment_id":"gpt-4o-realtime","output_format":"text"}}"#
        );
    }
}
