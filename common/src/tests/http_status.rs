use crate::HttpStatusCode;

/// **VALUE**: Verifies the status buckets used when logging relay failures.
///
/// **WHY THIS MATTERS**: The voice workflow reports "relay rejected" vs "relay unavailable"
/// and treats a 404 on delete as already cleaned up.
///
/// **BUG THIS CATCHES**: Would catch off-by-one range bounds.
#[test]
fn given_status_codes_when_classified_then_buckets_match() {
    // GIVEN/WHEN/THEN
    assert!(HttpStatusCode(400).is_client_error());
    assert!(HttpStatusCode(499).is_client_error());
    assert!(!HttpStatusCode(500).is_client_error());
    assert!(HttpStatusCode(503).is_server_error());
    assert!(!HttpStatusCode(200).is_server_error());
    assert!(HttpStatusCode::from(404).is_not_found());
    assert_eq!(HttpStatusCode(502).to_string(), "502");
}
