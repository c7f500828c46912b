//! Per-handshake session capsule.
//!
//! A `Session` is created by [`Provider::begin_auth`], stored by the host between the
//! redirect and the callback as an opaque string, and filled with tokens by
//! [`Session::authorize`]. The encoding is tagged JSON carrying a format version and
//! the name of the provider that created it.

use chrono::{DateTime, Duration, Utc};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::token::TokenSet;
use super::{CallbackParams, Provider};
use crate::error::{
    oauth_error, session_error, Error, ErrorKind, OAuthErrorKind, SessionErrorKind,
};

const SESSION_VERSION: u8 = 1;

/// One in-flight or completed handshake for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "v")]
    version: u8,
    provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    issued_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    auth_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pkce_verifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id_token: Option<String>,
}

impl Session {
    /// Start a session for `provider` whose user is being sent to `auth_url`.
    pub fn new(
        provider: &str,
        auth_url: String,
        state: String,
        pkce_verifier: Option<String>,
    ) -> Self {
        Self {
            version: SESSION_VERSION,
            provider: provider.to_string(),
            issued_at: Some(Utc::now()),
            auth_url: Some(auth_url),
            state: Some(state),
            pkce_verifier,
            access_token: None,
            refresh_token: None,
            expires_at: None,
            id_token: None,
        }
    }

    /// Name of the provider that created this session.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Whether the handshake began more than `ttl` before `now`.
    ///
    /// A session without an issue time is stale.
    pub fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.issued_at
            .and_then(|issued_at| issued_at.checked_add_signed(ttl))
            .map_or(true, |deadline| deadline <= now)
    }

    /// The authorization URL set by BeginAuth.
    pub fn auth_url(&self) -> Result<&str, Error> {
        self.auth_url.as_deref().ok_or_else(|| {
            session_error(
                SessionErrorKind::NotStarted,
                "an auth URL has not been set for this session",
            )
        })
    }

    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    pub fn pkce_verifier(&self) -> Option<&str> {
        self.pkce_verifier.as_deref()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn id_token(&self) -> Option<&str> {
        self.id_token.as_deref()
    }

    /// The access token, provided BeginAuth ran and the token exists and has not
    /// passed its expiry at `now`.
    pub fn usable_access_token(&self, now: DateTime<Utc>) -> Result<&str, Error> {
        self.auth_url()?;
        let token = self.access_token().ok_or_else(|| {
            oauth_error(
                OAuthErrorKind::TokenExpired,
                "cannot get user information without an access token",
            )
        })?;
        match self.expires_at {
            Some(expires_at) if expires_at <= now => Err(oauth_error(
                OAuthErrorKind::TokenExpired,
                "access token has expired",
            )),
            _ => Ok(token),
        }
    }

    /// Record a token set from the provider's token endpoint.
    pub fn store_tokens(&mut self, tokens: &TokenSet) {
        self.access_token = Some(tokens.access_token.expose_secret().clone());
        if let Some(refresh_token) = tokens.refresh_token_str() {
            self.refresh_token = Some(refresh_token.to_string());
        }
        self.expires_at = tokens.expires_at;
        if tokens.id_token.is_some() {
            self.id_token = tokens.id_token.clone();
        }
    }

    /// Exchange the callback's authorization code at `provider` and keep the tokens.
    ///
    /// Returns the new access token.
    pub async fn authorize(
        &mut self,
        provider: &dyn Provider,
        params: &CallbackParams,
    ) -> Result<String, Error> {
        if provider.name() != self.provider {
            return Err(session_error(
                SessionErrorKind::ProviderMismatch,
                &format!(
                    "session belongs to {} and cannot be authorized by {}",
                    self.provider,
                    provider.name()
                ),
            ));
        }
        self.auth_url()?;

        if let Some(error) = params.error.as_deref() {
            let description = params.error_description.as_deref().unwrap_or_default();
            return Err(oauth_error(
                OAuthErrorKind::AuthorizationDenied,
                format!("{error} {description}").trim_end(),
            ));
        }

        let code = params.code().ok_or_else(|| {
            oauth_error(
                OAuthErrorKind::MissingCode,
                "callback did not carry an authorization code",
            )
        })?;

        debug!("Exchanging authorization code for {}", self.provider);
        let tokens = provider.exchange_code(code, self.pkce_verifier()).await?;
        self.store_tokens(&tokens);

        Ok(tokens.access_token.expose_secret().clone())
    }

    /// Encode the session for the host's session store.
    pub fn marshal(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: ErrorKind::Session(SessionErrorKind::Corrupt),
        })
    }

    /// Decode a session produced by [`Session::marshal`].
    pub fn unmarshal(data: &str) -> Result<Self, Error> {
        let session: Session = serde_json::from_str(data).map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: ErrorKind::Session(SessionErrorKind::Corrupt),
        })?;

        if session.version != SESSION_VERSION {
            return Err(session_error(
                SessionErrorKind::Corrupt,
                &format!("unsupported session version {}", session.version),
            ));
        }

        Ok(session)
    }
}
