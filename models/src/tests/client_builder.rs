use crate::{ClientId, ClientType, ConnectedClientBuilder, ModelError};

use chrono::{TimeZone, Utc};

/// **VALUE**: Verifies a fully specified builder produces an unfocused client whose
/// activity clock starts at connection time.
///
/// **WHY THIS MATTERS**: Focus is decided by comparing `last_activity`. A fresh
/// client with a bogus activity time could steal focus on registration.
///
/// **BUG THIS CATCHES**: Would catch `last_activity` defaulting to `now()` independently
/// of `connected_at`, or `is_focused` defaulting to true.
#[test]
fn given_complete_builder_when_built_then_client_is_unfocused_and_active_at_connect() {
    // GIVEN: A builder with every field
    let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
    let builder = ConnectedClientBuilder::default()
        .with_id(ClientId::from("conn-1"))
        .with_client_type(ClientType::Atem)
        .with_hostname("devbox")
        .with_tag(Some(String::from("api")))
        .with_connected_at(at);

    // WHEN: Building
    let client = builder.build().unwrap();

    // THEN: Fields are carried and defaults applied
    assert_eq!(client.id.as_str(), "conn-1");
    assert_eq!(client.hostname, "devbox");
    assert_eq!(client.tag.as_deref(), Some("api"));
    assert_eq!(client.last_activity, at);
    assert!(!client.is_focused);
}

/// **VALUE**: Verifies that a missing or blank hostname is a validation error.
///
/// **WHY THIS MATTERS**: The instance list shown to users is keyed by hostname.
///
/// **BUG THIS CATCHES**: Would catch whitespace-only hostnames slipping through.
#[test]
fn given_blank_hostname_when_built_then_validation_error() {
    // GIVEN: Builders without a usable hostname
    let missing = ConnectedClientBuilder::default().with_id(ClientId::from("a"));
    let blank = ConnectedClientBuilder::default()
        .with_id(ClientId::from("b"))
        .with_hostname("   ");

    // WHEN / THEN: Both fail validation
    assert!(matches!(missing.build(), Err(ModelError::Validation { .. })));
    assert!(matches!(blank.build(), Err(ModelError::Validation { .. })));
}

/// **VALUE**: Verifies `touch` keeps previous metadata when a field is absent.
///
/// **WHY THIS MATTERS**: Status updates often carry only a tag; wiping the hostname
/// would make the instance anonymous in the list.
///
/// **BUG THIS CATCHES**: Would catch unconditional assignment of `None`/empty values.
#[test]
fn given_client_when_touched_with_partial_metadata_then_missing_fields_are_kept() {
    // GIVEN: A registered client
    let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
    let mut client = ConnectedClientBuilder::default()
        .with_id(ClientId::from("conn-1"))
        .with_hostname("devbox")
        .with_connected_at(at)
        .build()
        .unwrap();

    // WHEN: Touching with only a tag and an empty hostname
    let later = at + chrono::TimeDelta::seconds(30);
    client.touch(Some(""), Some("web"), later);

    // THEN: Hostname kept, tag and activity updated
    assert_eq!(client.hostname, "devbox");
    assert_eq!(client.tag.as_deref(), Some("web"));
    assert_eq!(client.last_activity, later);
}
