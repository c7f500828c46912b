//! Error types for the `identity` crate.
//!
//! A root Error struct holds an error kind tree plus an optional source for chaining.
//! The kinds mirror the stages of a handshake so the host can decide whether the
//! caller must restart the flow, retry later, or fix configuration.

use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for the identity crate.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors in identity.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    /// Missing or invalid provider credentials.
    Config,
    /// No provider registered under the requested name.
    UnknownProvider,
    Session(SessionErrorKind),
    OAuth(OAuthErrorKind),
    Upstream(UpstreamErrorKind),
}

/// Handshake continuity failures. The caller must restart the flow.
#[derive(Debug, PartialEq)]
pub enum SessionErrorKind {
    /// The session has no authorization URL, BeginAuth never ran.
    NotStarted,
    /// Nothing stored for the provider in the caller's session.
    Expired,
    /// The stored blob could not be decoded.
    Corrupt,
    /// The session was created by a different provider.
    ProviderMismatch,
    /// The caller's session store failed to read or write.
    Store,
}

/// Errors from the OAuth protocol exchange itself.
#[derive(Debug, PartialEq)]
pub enum OAuthErrorKind {
    StateMismatch,
    MissingCode,
    AuthorizationDenied,
    TokenExpired,
    InvalidRefreshToken,
    MalformedResponse,
}

/// Errors talking to the provider's endpoints.
#[derive(Debug, PartialEq)]
pub enum UpstreamErrorKind {
    Network,
    Timeout,
    Status(u16),
}

impl Error {
    /// True when the provider rejected or never received an access token.
    pub fn is_token_expired(&self) -> bool {
        self.error_kind == ErrorKind::OAuth(OAuthErrorKind::TokenExpired)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let detail = self
            .source
            .as_ref()
            .map(|s| format!(": {s}"))
            .unwrap_or_default();
        match &self.error_kind {
            ErrorKind::Config => write!(f, "Configuration error{detail}"),
            ErrorKind::UnknownProvider => write!(f, "Unknown provider{detail}"),
            ErrorKind::Session(kind) => write!(f, "Session error: {:?}{detail}", kind),
            ErrorKind::OAuth(kind) => write!(f, "OAuth error: {:?}{detail}", kind),
            ErrorKind::Upstream(kind) => write!(f, "Upstream error: {:?}{detail}", kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // Builder errors happen before any network call is made.
        let error_kind = if err.is_builder() {
            ErrorKind::Config
        } else if err.is_timeout() {
            ErrorKind::Upstream(UpstreamErrorKind::Timeout)
        } else if let Some(status) = err.status() {
            ErrorKind::Upstream(UpstreamErrorKind::Status(status.as_u16()))
        } else {
            ErrorKind::Upstream(UpstreamErrorKind::Network)
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

/// Helper function to create configuration errors.
pub fn config_error(message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Config,
    }
}

/// Helper function to create unknown provider errors.
pub fn unknown_provider_error(name: &str) -> Error {
    Error {
        source: Some(format!("no provider for {name}").into()),
        error_kind: ErrorKind::UnknownProvider,
    }
}

/// Helper function to create session errors.
pub fn session_error(kind: SessionErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Session(kind),
    }
}

/// Helper function to create OAuth errors.
pub fn oauth_error(kind: OAuthErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::OAuth(kind),
    }
}

/// Helper function to create upstream errors.
pub fn upstream_error(kind: UpstreamErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Upstream(kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_token_expired() {
        assert!(oauth_error(OAuthErrorKind::TokenExpired, "gone").is_token_expired());
        assert!(!oauth_error(OAuthErrorKind::MissingCode, "no code").is_token_expired());
        assert!(!upstream_error(UpstreamErrorKind::Status(401), "401").is_token_expired());
    }

    #[test]
    fn test_display_includes_message() {
        let err = session_error(SessionErrorKind::Expired, "session value for aps not found");
        assert_eq!(
            err.to_string(),
            "Session error: Expired: session value for aps not found"
        );
    }

    #[test]
    fn test_source_chain() {
        let err = config_error("client id missing");
        let source = StdError::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("client id missing"));
    }
}
