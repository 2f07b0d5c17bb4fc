// Unit tests for HubError conversions

use crate::error::HubError;

use hub_core::error::config::ConfigError;

use common::ErrorLocation;

use std::panic::Location;

#[test]
fn given_hub_error_when_displayed_then_prefixed_with_kind_and_message() {
    let error = HubError::Hub {
        message: String::from("port in use"),
        location: ErrorLocation::from(Location::caller()),
    };

    let text = error.to_string();
    assert!(text.starts_with("Hub Error: port in use"), "got: {text}");
}

/// **VALUE**: Verifies config failures keep their message through conversion.
///
/// **BUG THIS CATCHES**: main() reporting a bare "Config Error" with no
/// hint of which field was wrong.
#[test]
fn given_config_error_when_converted_then_becomes_config_variant() {
    // GIVEN: A config validation failure
    let source = ConfigError::ValidationError {
        location: ErrorLocation::from(Location::caller()),
        reason: String::from("relay.base_url must not be empty"),
    };

    // WHEN: Converted with `?`-style From
    let error = HubError::from(source);

    // THEN: Config variant carrying the original text
    match error {
        HubError::Config { message, .. } => {
            assert!(message.contains("relay.base_url must not be empty"), "got: {message}")
        }
        other => panic!("expected Config variant, got {other:?}"),
    }
}
