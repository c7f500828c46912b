//! OAuth provider trait.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::token::TokenSet;
use super::{Session, User};
use crate::error::{session_error, Error, SessionErrorKind};

/// Trait for OAuth 2.0 identity providers.
///
/// Each identity provider is one flat struct implementing this trait. Implementations
/// handle:
/// - Authorization URL generation (pure, no network)
/// - Authorization code exchange
/// - Profile retrieval mapped into a normalized [`User`]
/// - Token refresh
#[async_trait]
pub trait Provider: Send + Sync {
    /// Name used as the registry key and the session-storage key.
    fn name(&self) -> &str;

    /// Start a handshake: build the authorization URL carrying `state` and return a
    /// fresh session holding it.
    ///
    /// Fails with a configuration error if the provider's credentials are missing.
    fn begin_auth(&self, state: &str) -> Result<Session, Error>;

    /// Exchange an authorization code for tokens.
    ///
    /// # Arguments
    ///
    /// * `code` - Authorization code from the callback
    /// * `pkce_verifier` - PKCE code verifier if one was issued at BeginAuth
    async fn exchange_code(&self, code: &str, pkce_verifier: Option<&str>)
        -> Result<TokenSet, Error>;

    /// Fetch the user's profile with the session's access token.
    ///
    /// Fails with `TokenExpired` when the session has no usable token or the provider
    /// rejects it; that is the signal for the handshake's single retry.
    async fn fetch_user(&self, session: &Session) -> Result<User, Error>;

    /// Exchange a refresh token for a new token set.
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, Error>;

    /// Whether this provider's token endpoint supports the refresh grant.
    fn refresh_token_available(&self) -> bool;

    /// Set the `prompt` hint for the next BeginAuth only.
    fn set_prompt(&self, prompt: &[&str]);

    /// Decode a stored session, refusing one that another provider created.
    fn unmarshal_session(&self, data: &str) -> Result<Session, Error> {
        let session = Session::unmarshal(data)?;
        if session.provider() != self.name() {
            return Err(session_error(
                SessionErrorKind::ProviderMismatch,
                &format!(
                    "session was created by {}, not {}",
                    session.provider(),
                    self.name()
                ),
            ));
        }
        Ok(session)
    }
}

/// One-shot `prompt` value shared by the provider variants.
#[derive(Debug, Default)]
pub struct PromptHint(Mutex<Option<String>>);

impl PromptHint {
    /// Replace the pending hint. An empty list clears it.
    pub fn set(&self, prompt: &[&str]) {
        let value = (!prompt.is_empty()).then(|| prompt.join(" "));
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = value;
    }

    /// Take the pending hint, leaving none for the following BeginAuth.
    pub fn take(&self) -> Option<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}
