use crate::ErrorLocation;
use std::panic::Location;

/// **VALUE**: Verifies that `ErrorLocation::from()` captures this file and a real position.
///
/// **WHY THIS MATTERS**: Every error enum in the workspace embeds an `ErrorLocation`.
/// If capture breaks, all error messages lose the one piece of context that tells
/// a developer where a failed handshake or a failed persist actually happened.
///
/// **BUG THIS CATCHES**: Would catch if `Location::caller()` is replaced by a fixed
/// location or if the fields are mapped incorrectly.
#[test]
#[track_caller]
fn given_caller_location_when_error_location_created_then_points_at_this_file() {
    // GIVEN/WHEN: A location captured here
    let location = ErrorLocation::from(Location::caller());

    // THEN: File, line and column are populated
    assert!(location.file.ends_with("error_location.rs"));
    assert!(location.line > 0);
    assert!(location.column > 0);
}

/// **VALUE**: Verifies the `[file:line:column]` display format used in every error string.
///
/// **WHY THIS MATTERS**: Log lines are grepped for this bracketed suffix.
///
/// **BUG THIS CATCHES**: Would catch a changed separator or missing brackets.
#[test]
fn given_error_location_when_displayed_then_uses_bracketed_triplet() {
    // GIVEN: A hand-built location
    let location = ErrorLocation {
        file: "src/ipc/server.rs",
        line: 42,
        column: 7,
    };

    // WHEN: Formatting
    let formatted = location.to_string();

    // THEN: Exact format
    assert_eq!(formatted, "[src/ipc/server.rs:42:7]");
}

/// **VALUE**: Verifies that `#[track_caller]` helpers report their caller, not themselves.
///
/// **WHY THIS MATTERS**: All `From` conversions in the workspace rely on this so `?`
/// records the failing line.
///
/// **BUG THIS CATCHES**: Would catch removal of `#[track_caller]` semantics.
#[test]
fn given_track_caller_helper_when_called_twice_then_lines_differ() {
    // GIVEN: A track_caller helper
    #[track_caller]
    fn capture() -> ErrorLocation {
        ErrorLocation::from(Location::caller())
    }

    // WHEN: Capturing on consecutive lines
    let first = capture();
    let second = capture();

    // THEN: Consecutive lines
    assert_eq!(first.line + 1, second.line);
}
