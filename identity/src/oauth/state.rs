//! CSRF state tokens for the authorization redirect.
//!
//! A token is issued per BeginAuth, stored in the handshake session, sent to the
//! provider as `state` and compared against the value echoed on the callback.

use rand::Rng;
use subtle::ConstantTimeEq;

use crate::error::{oauth_error, Error, OAuthErrorKind};

/// Generate a cryptographically random state token (32 bytes, hex encoded).
pub fn generate() -> String {
    let random_bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(random_bytes)
}

/// Check the callback's `state` against the one issued at BeginAuth.
///
/// A missing value on either side is a mismatch.
pub fn verify(expected: Option<&str>, received: Option<&str>) -> Result<(), Error> {
    match (expected, received) {
        (Some(expected), Some(received))
            if !expected.is_empty() && bool::from(expected.as_bytes().ct_eq(received.as_bytes())) =>
        {
            Ok(())
        }
        (None, _) => Err(oauth_error(
            OAuthErrorKind::StateMismatch,
            "no state was issued for this session",
        )),
        (_, None) => Err(oauth_error(
            OAuthErrorKind::StateMismatch,
            "callback is missing the state parameter",
        )),
        _ => Err(oauth_error(
            OAuthErrorKind::StateMismatch,
            "state parameter does not match",
        )),
    }
}
