//! Diagnostic JWT decoding.
//!
//! Signatures are never verified. A decoded token says what the token
//! *claims*, not whether those claims are true, so nothing here may be used
//! to grant access.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::auth::AuthError;

/// URL-safe alphabet; accepts segments with or without `=` padding.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Header and payload of a JWT, decoded without verification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedJwt {
    pub header: Map<String, Value>,
    pub payload: Map<String, Value>,
}

/// `aud` is either a single audience or an ordered list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl std::fmt::Display for Audience {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::One(aud) => f.write_str(aud),
            Self::Many(auds) => f.write_str(&auds.join(",")),
        }
    }
}

/// The registered claims surfaced for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StandardClaims {
    pub iss: Option<String>,
    pub aud: Option<Audience>,
    pub exp: Option<DateTime<Utc>>,
    pub sub: Option<String>,
}

impl DecodedJwt {
    pub fn claims(&self) -> StandardClaims {
        let string_claim = |name: &str| {
            self.payload
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let aud = match self.payload.get("aud") {
            Some(Value::String(aud)) => Some(Audience::One(aud.clone())),
            Some(Value::Array(items)) => Some(Audience::Many(
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            )),
            _ => None,
        };
        let exp = self
            .payload
            .get("exp")
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
        StandardClaims {
            iss: string_claim("iss"),
            aud,
            exp,
            sub: string_claim("sub"),
        }
    }
}

/// Splits `token` into `header.payload.signature` and decodes the first two.
pub fn decode_jwt(token: &str) -> Result<DecodedJwt, AuthError> {
    let segments: Vec<&str> = token.trim().split('.').collect();
    if segments.len() != 3 {
        return Err(AuthError::MalformedToken {
            segment_count: segments.len(),
            reason: None,
        });
    }
    Ok(DecodedJwt {
        header: decode_segment("header", segments[0])?,
        payload: decode_segment("payload", segments[1])?,
    })
}

fn decode_segment(label: &str, segment: &str) -> Result<Map<String, Value>, AuthError> {
    let malformed = |reason: String| AuthError::MalformedToken {
        segment_count: 3,
        reason: Some(reason),
    };
    let bytes = URL_SAFE_LENIENT
        .decode(segment)
        .map_err(|e| malformed(format!("{label} is not base64url: {e}")))?;
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(malformed(format!("{label} is not a JSON object"))),
        Err(e) => Err(malformed(format!("{label} is not valid JSON: {e}"))),
    }
}

/// Writes the decoded token and its standard claims to the log sink.
pub fn log_decoded(decoded: &DecodedJwt) {
    let pretty = |map: &Map<String, Value>| {
        serde_json::to_string_pretty(map).unwrap_or_else(|_| format!("{map:?}"))
    };
    tracing::info!("=== JWT Header ===\n{}", pretty(&decoded.header));
    tracing::info!("=== JWT Payload ===\n{}", pretty(&decoded.payload));

    let claims = decoded.claims();
    tracing::info!(
        iss = claims.iss.as_deref().unwrap_or("-"),
        aud = %claims.aud.as_ref().map(ToString::to_string).unwrap_or_else(|| "-".to_string()),
        exp = %claims.exp.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".to_string()),
        sub = claims.sub.as_deref().unwrap_or("-"),
        "standard claims"
    );
}
