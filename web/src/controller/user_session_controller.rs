use crate::controller::oauth_controller::USER_KEY;
use crate::session_store::CookieSessionStore;
use crate::Result;
use axum::{http::StatusCode, response::IntoResponse, response::Redirect, Json};
use identity::oauth::User;
use identity::SessionStore;
use log::*;
use serde_json::json;
use tower_sessions::Session;

/// GET /
///
/// Returns the logged-in user stored by the callback, or 401 when there is none.
pub async fn current_user(session: Session) -> Result<impl IntoResponse> {
    match session.get::<User>(USER_KEY).await? {
        Some(user) => Ok((StatusCode::OK, Json(json!(user)))),
        None => Ok((
            StatusCode::UNAUTHORIZED,
            Json(json!({"code": "401", "message": "Please login into the platform"})),
        )),
    }
}

/// GET /login
///
/// Shows the id of the caller's cookie session, if one has been saved.
pub async fn login(session: Session) -> impl IntoResponse {
    match session.id() {
        Some(id) => format!("You are session with ID: {id}"),
        None => "You have no session yet".to_string(),
    }
}

/// GET /logout
///
/// Destroys the whole cookie session, including any handshake in flight.
pub async fn logout(session: Session) -> Result<impl IntoResponse> {
    trace!("UserSessionController::logout()");
    CookieSessionStore::new(session).destroy().await?;
    Ok(Redirect::to("/"))
}
