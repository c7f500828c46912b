//! Handshake orchestrator.
//!
//! Drives one authorization handshake for one caller:
//!
//! ```text
//! Anonymous → Redirecting → AwaitingCallback → Completing → Authenticated
//!                  ↘                               ↘
//!                   Failed                          Failed
//! ```
//!
//! `begin` covers the first two transitions and leaves the marshalled [`Session`] in
//! the caller's [`SessionStore`] under the provider name. `complete` picks it up on the
//! callback, checks the CSRF state and fetches the user, exchanging the authorization
//! code and retrying exactly once when the first fetch reports an expired token.

use std::fmt;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use crate::error::{config_error, session_error, Error, SessionErrorKind};
use crate::oauth::token::TokenSet;
use crate::oauth::{state, CallbackParams, Provider, Session, User};
use crate::registry::Registry;
use crate::store::SessionStore;

/// Where a handshake stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Anonymous,
    Redirecting,
    AwaitingCallback,
    Completing,
    Authenticated,
    Failed,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            HandshakeState::Anonymous => "anonymous",
            HandshakeState::Redirecting => "redirecting",
            HandshakeState::AwaitingCallback => "awaiting_callback",
            HandshakeState::Completing => "completing",
            HandshakeState::Authenticated => "authenticated",
            HandshakeState::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

fn transition(provider: &str, from: HandshakeState, to: HandshakeState) {
    debug!("Handshake for {}: {} -> {}", provider, from, to);
}

/// Log the move to `Failed` and hand the error back.
fn failed(provider: &str, from: HandshakeState, err: Error) -> Error {
    warn!("Handshake for {} failed while {}: {}", provider, from, err);
    transition(provider, from, HandshakeState::Failed);
    err
}

/// Begin/complete driver shared by every request.
#[derive(Clone)]
pub struct Handshake {
    registry: Arc<Registry>,
    state_ttl: Duration,
}

impl Handshake {
    /// Create a handshake driver whose stored state is valid for 10 minutes.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            state_ttl: Duration::minutes(10),
        }
    }

    /// Set how long a begun handshake may wait for its callback.
    pub fn with_state_ttl(mut self, state_ttl: Duration) -> Self {
        self.state_ttl = state_ttl;
        self
    }

    /// Start a handshake with `provider_name` and return the URL to redirect to.
    ///
    /// A fresh random state token is issued unless `state_override` is given.
    pub async fn begin(
        &self,
        store: &dyn SessionStore,
        provider_name: &str,
        state_override: Option<&str>,
    ) -> Result<String, Error> {
        transition(
            provider_name,
            HandshakeState::Anonymous,
            HandshakeState::Redirecting,
        );
        self.redirect(store, provider_name, state_override)
            .await
            .map_err(|e| failed(provider_name, HandshakeState::Redirecting, e))
    }

    async fn redirect(
        &self,
        store: &dyn SessionStore,
        provider_name: &str,
        state_override: Option<&str>,
    ) -> Result<String, Error> {
        let provider = self.registry.get(provider_name)?;

        let state = match state_override {
            Some(state) => state.to_string(),
            None => state::generate(),
        };
        let session = provider.begin_auth(&state)?;
        let url = session.auth_url()?.to_string();
        store.set(provider.name(), session.marshal()?).await?;

        transition(
            provider_name,
            HandshakeState::Redirecting,
            HandshakeState::AwaitingCallback,
        );
        Ok(url)
    }

    /// Finish the handshake from the provider's callback and return the user.
    ///
    /// On success the stored session entry is removed.
    pub async fn complete(
        &self,
        store: &dyn SessionStore,
        provider_name: &str,
        params: &CallbackParams,
    ) -> Result<User, Error> {
        transition(
            provider_name,
            HandshakeState::AwaitingCallback,
            HandshakeState::Completing,
        );
        let user = self
            .finish(store, provider_name, params)
            .await
            .map_err(|e| failed(provider_name, HandshakeState::Completing, e))?;

        transition(
            provider_name,
            HandshakeState::Completing,
            HandshakeState::Authenticated,
        );
        info!("User {} authenticated with {}", user.user_id, provider_name);
        Ok(user)
    }

    async fn finish(
        &self,
        store: &dyn SessionStore,
        provider_name: &str,
        params: &CallbackParams,
    ) -> Result<User, Error> {
        let provider = self.registry.get(provider_name)?;

        let stored = store.get(provider.name()).await?.ok_or_else(|| {
            session_error(
                SessionErrorKind::Expired,
                &format!("could not find a matching session for {provider_name}"),
            )
        })?;
        let mut session = provider.unmarshal_session(&stored)?;

        if session.is_stale(Utc::now(), self.state_ttl) {
            store.remove(provider.name()).await?;
            return Err(session_error(
                SessionErrorKind::Expired,
                &format!("the handshake with {provider_name} took too long to complete"),
            ));
        }

        state::verify(session.state(), params.state.as_deref())?;

        let user = match provider.fetch_user(&session).await {
            Ok(user) => user,
            Err(e) if e.is_token_expired() => {
                debug!("No usable token for {}, exchanging the authorization code", provider_name);
                self.authorize(store, provider.as_ref(), &mut session, params)
                    .await?;
                provider.fetch_user(&session).await?
            }
            Err(e) => return Err(e),
        };

        store.remove(provider.name()).await?;
        Ok(user)
    }

    async fn authorize(
        &self,
        store: &dyn SessionStore,
        provider: &dyn Provider,
        session: &mut Session,
        params: &CallbackParams,
    ) -> Result<(), Error> {
        session.authorize(provider, params).await?;
        store.set(provider.name(), session.marshal()?).await
    }

    /// Exchange `refresh_token` at `provider_name` for a new token set.
    ///
    /// The old refresh token is kept when the provider does not rotate it.
    pub async fn refresh(&self, provider_name: &str, refresh_token: &str) -> Result<TokenSet, Error> {
        let provider = self.registry.get(provider_name)?;
        if !provider.refresh_token_available() {
            return Err(config_error(&format!(
                "{provider_name} does not support refreshing tokens"
            )));
        }

        let tokens = provider.refresh_token(refresh_token).await?;
        Ok(tokens.or_refresh_token(refresh_token))
    }
}
