use crate::HubMessage;
use crate::protocol::Envelope;
use crate::protocol::payloads::{
    AuthErrorCode, AuthErrorPayload, MarkTaskNotifyPayload, SessionVerifyResponsePayload,
    StatusUpdatePayload, VoiceRequestPayload, VoiceResponsePayload,
};

use chrono::{TimeZone, Utc};

/// **VALUE**: Verifies voice messages serialize with snake_case keys only.
///
/// **WHY THIS MATTERS**: Clients in other languages match on these exact field names.
///
/// **BUG THIS CATCHES**: Would catch a `rename_all = "camelCase"` slipping onto a payload.
#[test]
fn given_voice_messages_when_encoded_then_no_camel_case_keys() {
    // GIVEN: A voice request and response
    let request = HubMessage::VoiceRequest(VoiceRequestPayload {
        session_id: String::from("vs-1"),
        accumulated_text: String::from("open the file"),
        relay_url: String::from("http://relay"),
    });
    let response = HubMessage::VoiceResponse(VoiceResponsePayload {
        session_id: String::from("vs-1"),
        success: true,
        message: String::from("ok"),
    });

    // WHEN: Encoding
    let request_text = request.encode().unwrap();
    let response_text = response.encode().unwrap();

    // THEN: snake_case present, camelCase absent
    for text in [&request_text, &response_text] {
        assert!(text.contains("\"session_id\""));
        assert!(!text.contains("sessionId"));
        assert!(!text.contains("accumulatedText"));
        assert!(!text.contains("relayUrl"));
    }
    assert!(request_text.contains("\"accumulated_text\""));
    assert!(request_text.contains("\"relay_url\""));
}

/// **VALUE**: Verifies the envelope shape `{type, timestamp, data}`.
///
/// **WHY THIS MATTERS**: Peers dispatch on `type` and read fields from `data`.
///
/// **BUG THIS CATCHES**: Would catch the payload being flattened next to `type`.
#[test]
fn given_message_when_encoded_at_time_then_envelope_has_type_timestamp_and_data() {
    // GIVEN: An auth error at a fixed time
    let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
    let message = HubMessage::AuthError(AuthErrorPayload {
        code: AuthErrorCode::SessionExpired,
        message: String::from("Session expired"),
    });

    // WHEN: Encoding
    let text = message.encode_at(at).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();

    // THEN: Envelope fields are at the top level
    assert_eq!(value["type"], "auth_error");
    assert_eq!(value["timestamp"], "2025-01-02T03:04:05.000Z");
    assert_eq!(value["data"]["code"], "session_expired");
}

/// **VALUE**: Verifies unknown kinds decode to `Unhandled` rather than failing.
///
/// **WHY THIS MATTERS**: Newer clients send kinds this hub does not know; those must
/// be dropped quietly, not answered with an error.
///
/// **BUG THIS CATCHES**: Would catch unknown kinds surfacing as decode errors.
#[test]
fn given_unknown_kind_when_decoded_then_unhandled_variant() {
    // GIVEN: A frame with an unknown type
    let text = r#"{"type":"screen_share_request","data":{"display":1}}"#;

    // WHEN: Decoding
    let message = HubMessage::decode(text).unwrap();

    // THEN: Unhandled with the original kind
    assert_eq!(
        message,
        HubMessage::Unhandled {
            kind: String::from("screen_share_request")
        }
    );
    assert_eq!(message.kind(), "screen_share_request");
}

/// **VALUE**: Verifies a known kind with a malformed payload is a decode error.
///
/// **WHY THIS MATTERS**: Validation happens once at the decode boundary.
///
/// **BUG THIS CATCHES**: Would catch malformed payloads being silently mapped to
/// `Unhandled`.
#[test]
fn given_known_kind_with_bad_payload_when_decoded_then_error() {
    // GIVEN: A mark task notify missing its task id
    let text = r#"{"type":"mark_task_notify","data":{"status":"new"}}"#;

    // WHEN / THEN
    assert!(HubMessage::decode(text).is_err());
}

/// **VALUE**: Verifies decoding tolerates a missing `data` and a malformed timestamp.
///
/// **WHY THIS MATTERS**: Request kinds like `project_list_request` carry no payload.
///
/// **BUG THIS CATCHES**: Would catch `data: null` failing to decode empty payloads.
#[test]
fn given_frame_without_data_when_decoded_then_empty_payload_is_accepted() {
    // GIVEN: A frame with no data and a junk timestamp
    let text = r#"{"type":"project_list_request","timestamp":"yesterday"}"#;

    // WHEN: Decoding
    let envelope: Envelope = serde_json::from_str(text).unwrap();
    let sent_at = envelope.sent_at();
    let message = envelope.into_message().unwrap();

    // THEN: Typed and timestamp ignored
    assert_eq!(message.kind(), "project_list_request");
    assert!(sent_at.is_none());
}

/// **VALUE**: Verifies which messages count as focus activity.
///
/// **WHY THIS MATTERS**: Focus follows activity that identifies a terminal; a token
/// request carries no identity and must not move focus.
///
/// **BUG THIS CATCHES**: Would catch metadata-free messages stealing focus.
#[test]
fn given_messages_when_activity_metadata_read_then_only_identified_activity_counts() {
    // GIVEN: A status update with a tag and one without metadata
    let tagged = HubMessage::StatusUpdate(StatusUpdatePayload {
        status: String::from("idle"),
        session_id: None,
        hostname: None,
        tag: Some(String::from("api")),
    });
    let bare = HubMessage::StatusUpdate(StatusUpdatePayload {
        status: String::from("idle"),
        session_id: None,
        hostname: None,
        tag: None,
    });
    let notify = HubMessage::MarkTaskNotify(MarkTaskNotifyPayload {
        task_id: String::from("t1"),
        status: String::from("new"),
        description: String::from("do X"),
    });

    // WHEN / THEN
    assert_eq!(tagged.activity_metadata(), Some((None, Some("api"))));
    assert_eq!(bare.activity_metadata(), None);
    assert_eq!(notify.activity_metadata(), None);
}

/// **VALUE**: Verifies `Unhandled` is never encoded.
///
/// **WHY THIS MATTERS**: Only typed messages leave the hub.
///
/// **BUG THIS CATCHES**: Would catch an empty `{"type":""}` frame being sent.
#[test]
fn given_unhandled_message_when_encoded_then_error() {
    // GIVEN
    let message = HubMessage::Unhandled {
        kind: String::from("x"),
    };

    // WHEN / THEN
    assert!(message.encode().is_err());
}

/// **VALUE**: Verifies the session-verify reply names the hub the way the
/// relay reads it.
///
/// **WHY THIS MATTERS**: The relay only learns which hub vouched for a
/// session from this field.
///
/// **BUG THIS CATCHES**: The identity going out under a key the relay
/// ignores, or appearing on an invalid reply.
#[test]
fn given_session_verify_response_when_encoded_then_identity_keyed_astation_id() {
    // GIVEN: A valid and an invalid reply
    let valid = HubMessage::SessionVerifyResponse(SessionVerifyResponsePayload {
        session_id: String::from("s-1"),
        request_id: String::from("r-1"),
        valid: true,
        hub_id: Some(String::from("hub-1")),
    });
    let invalid = HubMessage::SessionVerifyResponse(SessionVerifyResponsePayload {
        session_id: String::from("s-2"),
        request_id: String::from("r-2"),
        valid: false,
        hub_id: None,
    });

    // WHEN: Encoding
    let valid_json: serde_json::Value = serde_json::from_str(&valid.encode().unwrap()).unwrap();
    let invalid_json: serde_json::Value =
        serde_json::from_str(&invalid.encode().unwrap()).unwrap();

    // THEN: `astation_id` carries the hub id, only when valid
    assert_eq!(valid_json["data"]["astation_id"], "hub-1");
    assert!(valid_json["data"].get("hub_id").is_none());
    assert!(invalid_json["data"].get("astation_id").is_none());

    // AND: A relay-shaped reply decodes back into the payload
    let decoded = HubMessage::decode(
        r#"{"type":"session_verify_response","data":{"session_id":"s-1","request_id":"r-1","valid":true,"astation_id":"hub-1"}}"#,
    )
    .unwrap();
    match decoded {
        HubMessage::SessionVerifyResponse(payload) => {
            assert_eq!(payload.hub_id.as_deref(), Some("hub-1"))
        }
        other => panic!("expected session_verify_response, got {}", other.kind()),
    }
}
