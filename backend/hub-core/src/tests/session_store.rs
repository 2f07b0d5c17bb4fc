// Unit tests for SessionStore: expiry window, refresh, persistence

use super::ManualClock;

use crate::session_store::SessionStore;

use chrono::TimeDelta;
use tempfile::TempDir;

fn store_with_clock(clock: &ManualClock) -> SessionStore {
    SessionStore::in_memory().with_clock(clock.as_clock())
}

/// **VALUE**: Verifies the basic validate lifecycle of a session.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - Unknown ids validate
/// - A freshly created session is not immediately valid
#[tokio::test]
async fn given_new_store_when_create_then_session_validates() {
    // GIVEN: An empty store
    let clock = ManualClock::new();
    let store = store_with_clock(&clock);
    assert!(!store.validate("missing").await);

    // WHEN: A session is created
    let session = store.create("workstation").await;

    // THEN: It validates and carries a 64-char hex token
    assert!(store.validate(&session.id).await);
    assert_eq!(session.hostname, "workstation");
    assert_eq!(session.token.len(), 64);
    assert!(session.token.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(session.created_at, clock.now());
    assert_eq!(session.last_activity, clock.now());
}

/// **VALUE**: Verifies sessions expire exactly seven days after last activity.
///
/// **WHY THIS MATTERS**: Paired instances must re-pair after a week of silence,
/// but never a moment earlier than that.
///
/// **BUG THIS CATCHES**: An inclusive boundary (valid at exactly seven days) or
/// expiry measured from creation instead of last activity.
#[tokio::test]
async fn given_idle_session_when_seven_days_pass_then_invalid() {
    // GIVEN: A session created at T
    let clock = ManualClock::new();
    let store = store_with_clock(&clock);
    let session = store.create("host").await;

    // WHEN: Just under seven days pass
    clock.advance(TimeDelta::days(7) - TimeDelta::seconds(1));

    // THEN: Still valid
    assert!(store.validate(&session.id).await);

    // WHEN: Exactly seven days have passed
    clock.advance(TimeDelta::seconds(1));

    // THEN: Invalid, and `get` hides it
    assert!(!store.validate(&session.id).await);
    assert!(store.get(&session.id).await.is_none());
}

/// **VALUE**: Verifies refresh slides the expiry window forward.
#[tokio::test]
async fn given_refreshed_session_when_week_from_creation_passes_then_still_valid() {
    let clock = ManualClock::new();
    let store = store_with_clock(&clock);
    let session = store.create("host").await;

    // WHEN: Activity on day six, then checked on day eight
    clock.advance(TimeDelta::days(6));
    store.refresh(&session.id).await;
    clock.advance(TimeDelta::days(2));

    // THEN: Still valid with last_activity bumped
    let refreshed = store.get(&session.id).await.expect("session should be valid");
    assert_eq!(refreshed.created_at, session.created_at);
    assert_eq!(refreshed.last_activity, session.created_at + TimeDelta::days(6));

    // AND: Refreshing an unknown id is a no-op
    store.refresh("nope").await;
    assert!(!store.validate("nope").await);
}

/// **VALUE**: Verifies cleanup removes only expired sessions and active listing order.
#[tokio::test]
async fn given_mixed_sessions_when_cleanup_then_only_expired_removed() {
    // GIVEN: One old session and two younger ones
    let clock = ManualClock::new();
    let store = store_with_clock(&clock);
    let old = store.create("old").await;
    clock.advance(TimeDelta::days(3));
    let first = store.create("first").await;
    clock.advance(TimeDelta::hours(1));
    let second = store.create("second").await;

    // WHEN: The old one crosses seven days
    clock.advance(TimeDelta::days(4));
    let removed = store.cleanup_expired().await;

    // THEN: Exactly one removed, the rest listed oldest first
    assert_eq!(removed, 1);
    assert!(!store.validate(&old.id).await);
    let active: Vec<String> = store
        .get_all_active()
        .await
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(active, vec![first.id, second.id]);
}

/// **VALUE**: Verifies delete reports whether anything was removed.
#[tokio::test]
async fn given_session_when_delete_twice_then_second_returns_false() {
    let store = SessionStore::in_memory();
    let session = store.create("host").await;

    assert!(store.delete(&session.id).await);
    assert!(!store.delete(&session.id).await);
    assert!(!store.validate(&session.id).await);
}

/// **VALUE**: Verifies sessions survive a restart through the JSON file.
///
/// **WHY THIS MATTERS**: Instances reconnect with their session id after the
/// hub restarts; losing the table forces every instance to re-pair.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - Writes don't reach disk
/// - Timestamps don't round-trip
/// - Deletes aren't persisted
#[tokio::test]
async fn given_persisted_sessions_when_reopened_then_table_restored() {
    // GIVEN: A store backed by a temp file
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("sessions.json");
    let store = SessionStore::open(&path).expect("open store");
    let kept = store.create("kept").await;
    let dropped = store.create("dropped").await;
    store.delete(&dropped.id).await;

    // WHEN: Reopening from the same path
    let reopened = SessionStore::open(&path).expect("reopen store");

    // THEN: Only the kept session is present, unchanged
    let restored = reopened.get(&kept.id).await.expect("kept session restored");
    assert_eq!(restored.token, kept.token);
    assert_eq!(restored.created_at, kept.created_at);
    assert!(reopened.get(&dropped.id).await.is_none());
    assert!(!path.with_extension("json.tmp").exists());
}

/// **VALUE**: Verifies a missing file opens as an empty table.
#[tokio::test]
async fn given_missing_file_when_open_then_empty_store() {
    let dir = TempDir::new().expect("temp dir");
    let store = SessionStore::open(dir.path().join("absent.json")).expect("open store");

    assert!(store.get_all_active().await.is_empty());
}

/// **VALUE**: Verifies a corrupt file is reported instead of silently wiped.
#[test]
fn given_corrupt_file_when_open_then_error() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("sessions.json");
    std::fs::write(&path, "{ not json").expect("write file");

    assert!(SessionStore::open(&path).is_err());
}

/// **VALUE**: Verifies a failing disk write doesn't lose the session.
///
/// **WHY THIS MATTERS**: A full disk or a bad data directory must not stop
/// pairing; the in-memory table stays the source of truth.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - `create` panics or drops the session when the write fails
/// - Later operations on the store stop working after a failed write
#[tokio::test]
async fn given_unwritable_path_when_create_then_session_kept_in_memory() {
    // GIVEN: A store whose file would live under a regular file
    let dir = TempDir::new().expect("tempdir");
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"occupied").expect("write blocker");
    let path = blocker.join("sessions.json");
    let store = SessionStore::open(path.clone()).expect("missing file opens empty");

    // WHEN: Sessions are created and refreshed
    let session = store.create("laptop").await;
    store.refresh(&session.id).await;

    // THEN: Everything works from memory; nothing reached disk
    assert!(store.validate(&session.id).await);
    assert_eq!(store.get_all_active().await.len(), 1);
    assert!(!path.exists());
}
