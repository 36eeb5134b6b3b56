//! Unverified JWT inspection.
//!
//! Only the `exp` claim is read, to decide whether a token should be
//! refreshed before it is sent. Signatures are never checked here.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Deserialize;

#[derive(Deserialize)]
struct Claims {
    exp: Option<f64>,
}

/// Returns the `exp` claim (seconds since the Unix epoch) of a JWT.
///
/// `None` when the token is not a JWT or carries no numeric `exp`.
pub fn decode_expiry(token: &str) -> Option<f64> {
    let mut segments = token.split('.');
    let (_header, payload, _signature) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    serde_json::from_slice::<Claims>(&bytes).ok()?.exp
}

/// Returns `true` when the token is expired or cannot be decoded as a JWT.
pub fn is_token_expired(token: &str) -> bool {
    decode_expiry(token).map_or(true, is_past)
}

/// Returns `true` only for a decodable JWT whose `exp` has passed.
pub(crate) fn has_expired_claim(token: &str) -> bool {
    decode_expiry(token).is_some_and(is_past)
}

fn is_past(exp: f64) -> bool {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or_default();
    exp < now
}
