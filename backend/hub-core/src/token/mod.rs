//! "007" access tokens for RTC / RTM admission.
//!
//! Layout (little-endian):
//!
//! ```text
//! token   = "007" ++ base64(LENPFX(signature) ++ content)
//! content = LENPFX(app_id) ++ U32(issued_at) ++ U32(expire) ++ U32(salt)
//!        ++ U16(1) ++ U16(service_type) ++ U16(n) ++ n * (U16 privilege, U32 expiry)
//!        ++ subject
//! ```
//!
//! The signing key is derived in two HMAC-SHA256 rounds (certificate over
//! `issued_at`, then that key over `salt`) and signs `content`.
//!
//! Every builder returns an empty string instead of an error: callers treat
//! `""` as "no token".

mod codec;
mod decode;

pub use decode::{DecodedSubject, DecodedToken, decode_token, verify_token};

use crate::config::RtcConfig;

use codec::ByteWriter;

use common::RedactedSecret;

use std::sync::OnceLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use log::{debug, warn};
use rand::Rng;
use regex::Regex;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const TOKEN_VERSION: &str = "007";

pub const SERVICE_TYPE_RTC: u16 = 1;
pub const SERVICE_TYPE_RTM: u16 = 2;

pub const PRIVILEGE_JOIN_CHANNEL: u16 = 1;
pub const PRIVILEGE_PUBLISH_AUDIO: u16 = 2;
pub const PRIVILEGE_PUBLISH_VIDEO: u16 = 3;
pub const PRIVILEGE_PUBLISH_DATA: u16 = 4;
pub const PRIVILEGE_RTM_LOGIN: u16 = 1;

const SIGNATURE_LEN: usize = 32;
const HEX32_PATTERN: &str = r"^[0-9a-fA-F]{32}$";

static HEX32_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

fn is_hex32(value: &str) -> bool {
    HEX32_REGEX
        .get_or_init(|| Regex::new(HEX32_PATTERN).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(value))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RtcRole {
    #[default]
    Publisher,
    Subscriber,
}

impl RtcRole {
    fn privileges(&self) -> &'static [u16] {
        match self {
            RtcRole::Publisher => &[
                PRIVILEGE_JOIN_CHANNEL,
                PRIVILEGE_PUBLISH_AUDIO,
                PRIVILEGE_PUBLISH_VIDEO,
                PRIVILEGE_PUBLISH_DATA,
            ],
            RtcRole::Subscriber => &[PRIVILEGE_JOIN_CHANNEL],
        }
    }
}

/// Who the token admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSubject<'a> {
    /// `uid == 0` is the wildcard uid and is encoded as an empty account.
    Rtc { channel: &'a str, uid: u32, role: RtcRole },
    Rtm { user_id: &'a str },
}

impl TokenSubject<'_> {
    fn service_type(&self) -> u16 {
        match self {
            TokenSubject::Rtc { .. } => SERVICE_TYPE_RTC,
            TokenSubject::Rtm { .. } => SERVICE_TYPE_RTM,
        }
    }
}

/// Inputs that are fixed per signing call. Split out so tests can pin time
/// and salt.
#[derive(Debug, Clone, Copy)]
pub struct SigningParams {
    pub issued_at: u32,
    pub salt: u32,
    pub token_expire_seconds: u32,
    pub privilege_expire_seconds: u32,
}

impl SigningParams {
    pub fn fresh(token_expire_seconds: u32, privilege_expire_seconds: u32) -> Self {
        let issued_at = u32::try_from(Utc::now().timestamp()).unwrap_or(u32::MAX);
        Self {
            issued_at,
            salt: rand::rng().random_range(1..=u32::MAX),
            token_expire_seconds,
            privilege_expire_seconds,
        }
    }
}

/// Build and sign one token with the current time and a fresh salt.
pub fn build_token(
    app_id: &str,
    app_certificate: &str,
    subject: TokenSubject<'_>,
    token_expire_seconds: u32,
    privilege_expire_seconds: u32,
) -> String {
    build_token_with(
        app_id,
        app_certificate,
        subject,
        SigningParams::fresh(token_expire_seconds, privilege_expire_seconds),
    )
}

pub fn build_rtc_token(
    app_id: &str,
    app_certificate: &str,
    channel: &str,
    uid: u32,
    role: RtcRole,
    token_expire_seconds: u32,
    privilege_expire_seconds: u32,
) -> String {
    build_token(
        app_id,
        app_certificate,
        TokenSubject::Rtc { channel, uid, role },
        token_expire_seconds,
        privilege_expire_seconds,
    )
}

/// RTM has a single login privilege that expires with the token.
pub fn build_rtm_token(
    app_id: &str,
    app_certificate: &str,
    user_id: &str,
    token_expire_seconds: u32,
) -> String {
    build_token(
        app_id,
        app_certificate,
        TokenSubject::Rtm { user_id },
        token_expire_seconds,
        token_expire_seconds,
    )
}

/// Deterministic core of [`build_token`].
pub fn build_token_with(
    app_id: &str,
    app_certificate: &str,
    subject: TokenSubject<'_>,
    params: SigningParams,
) -> String {
    if app_certificate.is_empty() {
        debug!("Token requested without an app certificate");
        return String::new();
    }
    if !is_hex32(app_id) || !is_hex32(app_certificate) {
        warn!("Token requested with a malformed app id or certificate");
        return String::new();
    }

    let Some(content) = pack_content(app_id, subject, &params) else {
        warn!("Token subject too long to encode");
        return String::new();
    };

    let Some(signature) = sign(app_certificate, params.issued_at, params.salt, &content) else {
        return String::new();
    };

    let mut payload = ByteWriter::new();
    if payload.put_bytes(&signature).is_none() {
        return String::new();
    }
    let mut bytes = payload.into_bytes();
    bytes.extend_from_slice(&content);

    format!("{TOKEN_VERSION}{}", STANDARD.encode(bytes))
}

fn pack_content(app_id: &str, subject: TokenSubject<'_>, params: &SigningParams) -> Option<Vec<u8>> {
    let privilege_expiry = params
        .issued_at
        .saturating_add(params.privilege_expire_seconds);

    let privileges: &[u16] = match subject {
        TokenSubject::Rtc { role, .. } => role.privileges(),
        TokenSubject::Rtm { .. } => &[PRIVILEGE_RTM_LOGIN],
    };

    let mut writer = ByteWriter::new();
    writer.put_str(app_id)?;
    writer
        .put_u32(params.issued_at)
        .put_u32(params.token_expire_seconds)
        .put_u32(params.salt)
        .put_u16(1)
        .put_u16(subject.service_type())
        .put_u16(privileges.len() as u16);
    for privilege in privileges {
        writer.put_u16(*privilege).put_u32(privilege_expiry);
    }

    match subject {
        TokenSubject::Rtc { channel, uid, .. } => {
            let account = if uid == 0 {
                String::new()
            } else {
                uid.to_string()
            };
            writer.put_str(channel)?;
            writer.put_str(&account)?;
        }
        TokenSubject::Rtm { user_id } => {
            writer.put_str(user_id)?;
        }
    }

    Some(writer.into_bytes())
}

/// `HMAC(HMAC(cert, U32(issued_at)), U32(salt))` signs `content`.
pub(crate) fn sign(
    app_certificate: &str,
    issued_at: u32,
    salt: u32,
    content: &[u8],
) -> Option<[u8; SIGNATURE_LEN]> {
    let key1 = hmac_sha256(app_certificate.as_bytes(), &issued_at.to_le_bytes())?;
    let key2 = hmac_sha256(&key1, &salt.to_le_bytes())?;
    hmac_sha256(&key2, content)
}

fn hmac_sha256(key: &[u8], message: &[u8]) -> Option<[u8; SIGNATURE_LEN]> {
    let mut mac = HmacSha256::new_from_slice(key).ok()?;
    mac.update(message);
    let digest = mac.finalize().into_bytes();
    let mut out = [0u8; SIGNATURE_LEN];
    out.copy_from_slice(&digest);
    Some(out)
}

/// Result of a token request from a connected instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedToken {
    pub token: String,
    /// Seconds as a decimal string, `"0"` when `token` is empty.
    pub expires_in: String,
}

impl GeneratedToken {
    pub fn empty() -> Self {
        Self {
            token: String::new(),
            expires_in: String::from("0"),
        }
    }
}

/// Mints tokens with the hub's app credentials.
#[derive(Clone)]
pub struct TokenService {
    app_id: String,
    app_certificate: RedactedSecret,
    token_expire_seconds: u32,
    privilege_expire_seconds: u32,
}

impl TokenService {
    pub fn new(
        app_id: impl Into<String>,
        app_certificate: RedactedSecret,
        token_expire_seconds: u32,
        privilege_expire_seconds: u32,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            app_certificate,
            token_expire_seconds,
            privilege_expire_seconds,
        }
    }

    pub fn from_config(config: &RtcConfig) -> Self {
        Self::new(
            config.app_id.clone(),
            config.app_certificate.clone(),
            config.token_expire_seconds,
            config.privilege_expire_seconds,
        )
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn rtc_token(&self, channel: &str, uid: u32, role: RtcRole) -> String {
        build_rtc_token(
            &self.app_id,
            self.app_certificate.expose(),
            channel,
            uid,
            role,
            self.token_expire_seconds,
            self.privilege_expire_seconds,
        )
    }

    pub fn rtm_token(&self, user_id: &str) -> String {
        build_rtm_token(
            &self.app_id,
            self.app_certificate.expose(),
            user_id,
            self.token_expire_seconds,
        )
    }

    /// Publisher token for `uid` given as a decimal string.
    ///
    /// `uid` must be plain ASCII digits naming a value in `0..=u32::MAX`;
    /// anything else (signs, whitespace), or a signing failure, yields
    /// [`GeneratedToken::empty`].
    pub fn generate_token(&self, channel: &str, uid: &str) -> GeneratedToken {
        let digits_only = uid.bytes().all(|b| b.is_ascii_digit());
        let uid = match uid.parse::<u32>() {
            Ok(uid) if digits_only => uid,
            _ => {
                debug!("Rejected token request for non-numeric or out-of-range uid");
                return GeneratedToken::empty();
            }
        };

        let token = self.rtc_token(channel, uid, RtcRole::Publisher);
        if token.is_empty() {
            return GeneratedToken::empty();
        }

        GeneratedToken {
            token,
            expires_in: self.token_expire_seconds.to_string(),
        }
    }
}
