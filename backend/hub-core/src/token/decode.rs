use super::codec::ByteReader;
use super::{SERVICE_TYPE_RTC, SERVICE_TYPE_RTM, TOKEN_VERSION, sign};

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedSubject {
    Rtc { channel: String, account: String },
    Rtm { user_id: String },
}

/// Parsed token fields. `content` is the exact signed byte range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedToken {
    pub app_id: String,
    pub issued_at: u32,
    pub expire: u32,
    pub salt: u32,
    pub service_type: u16,
    pub privileges: BTreeMap<u16, u32>,
    pub subject: DecodedSubject,
    pub signature: Vec<u8>,
    pub content: Vec<u8>,
}

impl DecodedToken {
    /// Numeric uid of an RTC token; the empty account decodes as `0`.
    pub fn rtc_uid(&self) -> Option<u32> {
        match &self.subject {
            DecodedSubject::Rtc { account, .. } if account.is_empty() => Some(0),
            DecodedSubject::Rtc { account, .. } => account.parse().ok(),
            DecodedSubject::Rtm { .. } => None,
        }
    }
}

/// Parse a single-service "007" token. `None` on any malformation.
pub fn decode_token(token: &str) -> Option<DecodedToken> {
    let encoded = token.strip_prefix(TOKEN_VERSION)?;
    let bytes = STANDARD.decode(encoded).ok()?;

    let mut outer = ByteReader::new(&bytes);
    let signature = outer.get_bytes()?.to_vec();
    let content = outer.remaining().to_vec();

    let mut reader = ByteReader::new(&content);
    let app_id = reader.get_string()?;
    let issued_at = reader.get_u32()?;
    let expire = reader.get_u32()?;
    let salt = reader.get_u32()?;

    if reader.get_u16()? != 1 {
        return None;
    }
    let service_type = reader.get_u16()?;
    let count = reader.get_u16()?;
    let mut privileges = BTreeMap::new();
    for _ in 0..count {
        let key = reader.get_u16()?;
        let expiry = reader.get_u32()?;
        privileges.insert(key, expiry);
    }

    let subject = match service_type {
        SERVICE_TYPE_RTC => DecodedSubject::Rtc {
            channel: reader.get_string()?,
            account: reader.get_string()?,
        },
        SERVICE_TYPE_RTM => DecodedSubject::Rtm {
            user_id: reader.get_string()?,
        },
        _ => return None,
    };

    if !reader.remaining().is_empty() {
        return None;
    }

    Some(DecodedToken {
        app_id,
        issued_at,
        expire,
        salt,
        service_type,
        privileges,
        subject,
        signature,
        content,
    })
}

/// Recompute the signature with `app_certificate` and compare.
pub fn verify_token(token: &str, app_certificate: &str) -> bool {
    let Some(decoded) = decode_token(token) else {
        return false;
    };
    sign(app_certificate, decoded.issued_at, decoded.salt, &decoded.content)
        .is_some_and(|expected| expected.as_slice() == decoded.signature.as_slice())
}
