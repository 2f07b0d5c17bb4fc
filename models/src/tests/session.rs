use crate::{AuthRequest, AuthSession, SESSION_TTL, Session};

use chrono::{TimeDelta, Utc};

fn session_with_activity(last_activity: chrono::DateTime<Utc>) -> Session {
    Session {
        id: String::from("s1"),
        hostname: String::from("devbox"),
        token: "ab".repeat(32),
        created_at: last_activity,
        last_activity,
    }
}

/// **VALUE**: Verifies the 7 day validity boundary is exclusive.
///
/// **WHY THIS MATTERS**: `valid <=> now - last_activity < 7 days`; an off-by-one
/// would let a stale pairing reconnect.
///
/// **BUG THIS CATCHES**: Would catch `<=` instead of `<`.
#[test]
fn given_session_when_checked_at_boundary_then_exactly_seven_days_is_invalid() {
    // GIVEN: A session last used at t0
    let t0 = Utc::now();
    let session = session_with_activity(t0);

    // WHEN / THEN: Valid just before, invalid at the boundary
    assert!(session.is_valid_at(t0 + SESSION_TTL - TimeDelta::seconds(1)));
    assert!(!session.is_valid_at(t0 + SESSION_TTL));
}

/// **VALUE**: Verifies session tokens are hidden from `Debug`.
///
/// **WHY THIS MATTERS**: Sessions are logged at debug level during authentication.
///
/// **BUG THIS CATCHES**: Would catch a derived `Debug`.
#[test]
fn given_session_and_auth_session_when_debug_formatted_then_tokens_are_redacted() {
    // GIVEN: A session and a granted auth session
    let session = session_with_activity(Utc::now());
    let mut auth = AuthSession::pending(
        &AuthRequest {
            session_id: String::from("p1"),
            hostname: String::from("devbox"),
            otp: String::from("12345678"),
        },
        Utc::now(),
    );
    auth.granted = Some(true);
    auth.session_token = Some("cd".repeat(32));

    // WHEN: Formatting
    let session_debug = format!("{session:?}");
    let auth_debug = format!("{auth:?}");

    // THEN: No token material
    assert!(!session_debug.contains(&"ab".repeat(32)));
    assert!(!auth_debug.contains(&"cd".repeat(32)));
    assert!(!auth_debug.contains("12345678"));
}

/// **VALUE**: Verifies persisted sessions use ISO-8601 timestamps.
///
/// **WHY THIS MATTERS**: The session file is shared with other tooling that reads
/// ISO-8601 strings.
///
/// **BUG THIS CATCHES**: Would catch timestamps serialized as epoch numbers.
#[test]
fn given_session_when_serialized_then_timestamps_are_iso8601_strings() {
    // GIVEN: A session
    let session = session_with_activity(Utc::now());

    // WHEN: Serializing
    let value = serde_json::to_value(&session).unwrap();

    // THEN: Timestamps are strings parseable as RFC 3339
    let created = value["created_at"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(created).is_ok());
}

/// **VALUE**: Verifies auth sessions expire after five minutes whatever the outcome.
///
/// **WHY THIS MATTERS**: Pending approvals must not linger forever.
///
/// **BUG THIS CATCHES**: Would catch expiry only applying to resolved records.
#[test]
fn given_pending_auth_session_when_five_minutes_pass_then_expired() {
    // GIVEN: A pending record
    let t0 = Utc::now();
    let auth = AuthSession::pending(
        &AuthRequest {
            session_id: String::from("p1"),
            hostname: String::from("devbox"),
            otp: String::from("12345678"),
        },
        t0,
    );

    // WHEN / THEN
    assert!(!auth.is_expired_at(t0 + TimeDelta::minutes(4)));
    assert!(auth.is_expired_at(t0 + TimeDelta::minutes(5)));
}
