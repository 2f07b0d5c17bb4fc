// Unit tests for the "007" token builder and decoder

use crate::token::{
    DecodedSubject, GeneratedToken, PRIVILEGE_JOIN_CHANNEL, PRIVILEGE_PUBLISH_AUDIO,
    PRIVILEGE_PUBLISH_DATA, PRIVILEGE_PUBLISH_VIDEO, PRIVILEGE_RTM_LOGIN, RtcRole,
    SERVICE_TYPE_RTC, SERVICE_TYPE_RTM, SigningParams, TokenService, TokenSubject,
    build_rtc_token, build_rtm_token, build_token_with, decode_token, verify_token,
};

use common::RedactedSecret;

const APP_ID: &str = "970ca35de60c44645bbae8a215061b33";
const APP_CERT: &str = "5cfd2fd1755d40ecb72977518be15d3b";

fn params() -> SigningParams {
    SigningParams {
        issued_at: 1_700_000_000,
        salt: 42,
        token_expire_seconds: 3600,
        privilege_expire_seconds: 600,
    }
}

fn service() -> TokenService {
    TokenService::new(APP_ID, RedactedSecret::new(APP_CERT), 3600, 3600)
}

/// **VALUE**: Verifies a publisher RTC token decodes back to exactly what was signed.
///
/// **WHY THIS MATTERS**: The media service parses these bytes; any layout slip
/// (endianness, length prefixes, field order) makes every join fail.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - issued_at / expire / salt are written in the wrong order
/// - The publisher role grants fewer than four privileges
/// - Privilege expiry is not issued_at + privilege_expire
#[test]
fn given_publisher_subject_when_build_token_then_decodes_to_signed_fields() {
    // GIVEN: Fixed signing parameters
    let params = params();

    // WHEN: Building a publisher token
    let token = build_token_with(
        APP_ID,
        APP_CERT,
        TokenSubject::Rtc {
            channel: "hub-voice",
            uid: 1000,
            role: RtcRole::Publisher,
        },
        params,
    );

    // THEN: It carries the version prefix and decodes cleanly
    assert!(token.starts_with("007"));
    let decoded = decode_token(&token).expect("token should decode");
    assert_eq!(decoded.app_id, APP_ID);
    assert_eq!(decoded.issued_at, 1_700_000_000);
    assert_eq!(decoded.expire, 3600);
    assert_eq!(decoded.salt, 42);
    assert_eq!(decoded.service_type, SERVICE_TYPE_RTC);
    assert_eq!(
        decoded.subject,
        DecodedSubject::Rtc {
            channel: String::from("hub-voice"),
            account: String::from("1000"),
        }
    );
    assert_eq!(decoded.rtc_uid(), Some(1000));

    let expiry = 1_700_000_000 + 600;
    let privileges: Vec<(u16, u32)> = decoded.privileges.into_iter().collect();
    assert_eq!(
        privileges,
        vec![
            (PRIVILEGE_JOIN_CHANNEL, expiry),
            (PRIVILEGE_PUBLISH_AUDIO, expiry),
            (PRIVILEGE_PUBLISH_VIDEO, expiry),
            (PRIVILEGE_PUBLISH_DATA, expiry),
        ]
    );
    assert_eq!(decoded.signature.len(), 32);
}

/// **VALUE**: Verifies subscribers only get the join privilege.
///
/// **BUG THIS CATCHES**: A subscriber token that can publish audio.
#[test]
fn given_subscriber_role_when_build_token_then_only_join_privilege() {
    let token = build_token_with(
        APP_ID,
        APP_CERT,
        TokenSubject::Rtc {
            channel: "hub-voice",
            uid: 7,
            role: RtcRole::Subscriber,
        },
        params(),
    );

    let decoded = decode_token(&token).expect("token should decode");
    assert_eq!(decoded.privileges.len(), 1);
    assert_eq!(
        decoded.privileges.get(&PRIVILEGE_JOIN_CHANNEL),
        Some(&(1_700_000_000 + 600))
    );
}

/// **VALUE**: Verifies uid 0 is encoded as the empty account (wildcard).
///
/// **BUG THIS CATCHES**: Encoding "0" instead, which pins the token to user 0.
#[test]
fn given_uid_zero_when_build_token_then_account_is_empty() {
    let token = build_token_with(
        APP_ID,
        APP_CERT,
        TokenSubject::Rtc {
            channel: "guests",
            uid: 0,
            role: RtcRole::Publisher,
        },
        params(),
    );

    let decoded = decode_token(&token).expect("token should decode");
    assert_eq!(
        decoded.subject,
        DecodedSubject::Rtc {
            channel: String::from("guests"),
            account: String::new(),
        }
    );
    assert_eq!(decoded.rtc_uid(), Some(0));
}

/// **VALUE**: Verifies RTM tokens carry one login privilege expiring with the token.
#[test]
fn given_rtm_user_when_build_rtm_token_then_login_privilege_matches_token_expiry() {
    // WHEN: Building an RTM token with the live clock
    let token = build_rtm_token(APP_ID, APP_CERT, "hub-user", 900);

    // THEN: One login privilege at issued_at + 900
    let decoded = decode_token(&token).expect("token should decode");
    assert_eq!(decoded.service_type, SERVICE_TYPE_RTM);
    assert_eq!(decoded.expire, 900);
    assert_eq!(
        decoded.subject,
        DecodedSubject::Rtm {
            user_id: String::from("hub-user"),
        }
    );
    assert_eq!(
        decoded.privileges.get(&PRIVILEGE_RTM_LOGIN),
        Some(&(decoded.issued_at + 900))
    );
}

/// **VALUE**: Verifies a missing certificate yields the empty "no token" string.
///
/// **WHY THIS MATTERS**: A hub without credentials should run in no-auth mode,
/// not crash or emit an unsigned token.
#[test]
fn given_empty_certificate_when_build_tokens_then_returns_empty_string() {
    assert_eq!(
        build_rtc_token(APP_ID, "", "hub-voice", 1, RtcRole::Publisher, 3600, 3600),
        ""
    );
    assert_eq!(build_rtm_token(APP_ID, "", "hub-user", 3600), "");
}

/// **VALUE**: Verifies malformed credentials are refused rather than signed.
#[test]
fn given_non_hex_credentials_when_build_token_then_returns_empty_string() {
    let subject = TokenSubject::Rtc {
        channel: "hub-voice",
        uid: 1,
        role: RtcRole::Publisher,
    };

    assert_eq!(build_token_with("not-an-app-id", APP_CERT, subject, params()), "");
    assert_eq!(build_token_with(APP_ID, "zz", subject, params()), "");
}

/// **VALUE**: Verifies each build draws a fresh salt.
///
/// **BUG THIS CATCHES**: A constant salt, which makes tokens replayable across mints.
#[test]
fn given_same_inputs_when_build_twice_then_salts_differ() {
    let first = build_rtc_token(APP_ID, APP_CERT, "hub-voice", 5, RtcRole::Publisher, 60, 60);
    let second = build_rtc_token(APP_ID, APP_CERT, "hub-voice", 5, RtcRole::Publisher, 60, 60);

    let first = decode_token(&first).expect("first token");
    let second = decode_token(&second).expect("second token");
    assert_ne!(first.salt, second.salt);
    assert_ne!(first.salt, 0);
}

/// **VALUE**: Verifies the signature is checked against the certificate.
///
/// **BUG THIS CATCHES**: Signing with the wrong key order or tampered content passing.
#[test]
fn given_signed_token_when_verify_then_only_matching_certificate_passes() {
    let token = build_token_with(
        APP_ID,
        APP_CERT,
        TokenSubject::Rtm { user_id: "u" },
        params(),
    );

    assert!(verify_token(&token, APP_CERT));
    assert!(!verify_token(&token, "00000000000000000000000000000000"));
    assert!(!verify_token("007AAAA", APP_CERT));
    assert!(decode_token("006abc").is_none());
}

/// **VALUE**: Verifies uid strings are parsed strictly before minting.
///
/// **WHY THIS MATTERS**: Instances send uids as strings. Negative or overflowing
/// values must not wrap into someone else's uid.
///
/// **BUG THIS CATCHES**: A leading `+` or stray whitespace being accepted,
/// so two different strings mint tokens for the same uid.
#[test]
fn given_invalid_uid_strings_when_generate_token_then_returns_empty_token() {
    let tokens = service();

    for uid in ["abc", "-1", "4294967296", "", "+5", " 5", "5 ", "٣"] {
        assert_eq!(
            tokens.generate_token("hub-voice", uid),
            GeneratedToken::empty(),
            "uid {uid:?} should be rejected"
        );
    }
}

/// **VALUE**: Verifies a valid uid yields a publisher token and the expiry string.
#[test]
fn given_numeric_uid_when_generate_token_then_token_matches_uid() {
    let generated = service().generate_token("hub-voice", "4294967295");

    assert_eq!(generated.expires_in, "3600");
    let decoded = decode_token(&generated.token).expect("token should decode");
    assert_eq!(decoded.rtc_uid(), Some(u32::MAX));
    assert_eq!(decoded.privileges.len(), 4);
}

/// **VALUE**: Verifies a service without a certificate answers with the empty token.
#[test]
fn given_service_without_certificate_when_generate_token_then_expires_in_zero() {
    let tokens = TokenService::new(APP_ID, RedactedSecret::new(""), 3600, 3600);

    let generated = tokens.generate_token("hub-voice", "12");

    assert_eq!(generated.token, "");
    assert_eq!(generated.expires_in, "0");
}
