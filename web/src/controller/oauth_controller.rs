//! Controller for the provider redirect and callback.
//!
//! Both endpoints are reached through browser redirects, so they carry everything in
//! the path and query string and keep handshake state in the cookie session.

use crate::session_store::CookieSessionStore;
use crate::{AppState, Result};

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect};
use identity::oauth::CallbackParams;
use log::*;
use serde::Deserialize;
use tower_sessions::Session;

/// Session key holding the authenticated user.
pub(crate) const USER_KEY: &str = "user";

/// Query parameters accepted when starting a handshake.
#[derive(Debug, Default, Deserialize)]
pub struct BeginParams {
    /// Takes precedence over the path segment.
    pub provider: Option<String>,
    /// Fixed state token, honored only when `ALLOW_STATE_OVERRIDE` is set.
    pub state: Option<String>,
}

/// `provider` query parameter accepted on the callback.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackTarget {
    /// Takes precedence over the path segment.
    pub provider: Option<String>,
}

/// GET /auth/{provider}
///
/// Redirects the browser to the provider's authorization endpoint.
pub async fn authorize(
    State(app_state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<BeginParams>,
    session: Session,
) -> Result<impl IntoResponse> {
    let provider = params.provider.unwrap_or(provider);
    let state_override = if app_state.config.allow_state_override {
        params.state.as_deref()
    } else {
        None
    };

    debug!("Starting {provider} handshake");
    let store = CookieSessionStore::new(session);
    let url = app_state
        .handshake
        .begin(&store, &provider, state_override)
        .await?;

    Ok(Redirect::temporary(&url))
}

/// GET /auth/{provider}/callback
///
/// Completes the handshake, keeps the user in the cookie session and sends the
/// browser back to `/`. The session id is replaced before the user is stored.
pub async fn callback(
    State(app_state): State<AppState>,
    Path(provider): Path<String>,
    Query(target): Query<CallbackTarget>,
    Query(params): Query<CallbackParams>,
    session: Session,
) -> Result<impl IntoResponse> {
    let provider = target.provider.unwrap_or(provider);
    let store = CookieSessionStore::new(session.clone());
    let user = app_state
        .handshake
        .complete(&store, &provider, &params)
        .await?;

    session.cycle_id().await?;
    session.insert(USER_KEY, &user).await?;
    info!("Logged in {} via {}", user.user_id, provider);

    Ok(Redirect::to("/"))
}
