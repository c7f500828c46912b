//! Adapts the caller's tower-sessions cookie session to the handshake's
//! [`identity::SessionStore`].

use async_trait::async_trait;
use identity::error::{Error as IdentityError, ErrorKind, SessionErrorKind};
use identity::SessionStore;
use tower_sessions::Session;

/// Handshake entries live under this prefix so they never collide with the
/// logged-in user.
const KEY_PREFIX: &str = "handshake.";

pub struct CookieSessionStore {
    session: Session,
}

impl CookieSessionStore {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    fn key(provider: &str) -> String {
        format!("{KEY_PREFIX}{provider}")
    }
}

pub(crate) fn store_error(err: tower_sessions::session::Error) -> IdentityError {
    IdentityError {
        source: Some(Box::new(err)),
        error_kind: ErrorKind::Session(SessionErrorKind::Store),
    }
}

#[async_trait]
impl SessionStore for CookieSessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>, IdentityError> {
        self.session
            .get::<String>(&Self::key(key))
            .await
            .map_err(store_error)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), IdentityError> {
        self.session
            .insert(&Self::key(key), value)
            .await
            .map_err(store_error)
    }

    async fn remove(&self, key: &str) -> Result<(), IdentityError> {
        self.session
            .remove::<String>(&Self::key(key))
            .await
            .map(|_| ())
            .map_err(store_error)
    }

    async fn destroy(&self) -> Result<(), IdentityError> {
        self.session.flush().await.map_err(store_error)
    }
}
