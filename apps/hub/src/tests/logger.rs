// Unit tests for logger setup

use crate::logger::{initialize, resolve_level};

use log::LevelFilter;
use tempfile::TempDir;

#[test]
fn given_valid_level_names_when_resolved_then_parsed_case_insensitively() {
    assert_eq!(resolve_level(Some("trace")), LevelFilter::Trace);
    assert_eq!(resolve_level(Some("WARN")), LevelFilter::Warn);
    assert_eq!(resolve_level(Some(" off ")), LevelFilter::Off);
}

/// **VALUE**: Verifies a typo in `HUB_LOG` falls back instead of failing.
#[test]
fn given_missing_or_bad_level_when_resolved_then_build_default() {
    let default = resolve_level(None);

    assert_eq!(resolve_level(Some("loud")), default);
    assert!(default == LevelFilter::Debug || default == LevelFilter::Info);
}

/// **VALUE**: Verifies repeated initialization is harmless.
///
/// **BUG THIS CATCHES**: A second call panicking because the global
/// logger is already set.
#[test]
fn given_logger_initialized_when_initialized_again_then_ok() {
    // GIVEN: A writable log directory
    let dir = TempDir::new().expect("tempdir");

    // WHEN: Initialized twice
    let first = initialize(dir.path());
    let second = initialize(dir.path());

    // THEN: Both succeed
    assert!(first.is_ok(), "first: {first:?}");
    assert!(second.is_ok(), "second: {second:?}");
}
