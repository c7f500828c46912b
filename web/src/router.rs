use crate::controller::{health_check_controller, oauth_controller, user_session_controller};
use crate::AppState;
use axum::{routing::get, Router};

/// Method and path of every route, in registration order.
pub const ROUTES: &[(&str, &str)] = &[
    ("GET", "/"),
    ("GET", "/login"),
    ("GET", "/logout"),
    ("GET", "/auth/{provider}"),
    ("GET", "/auth/{provider}/callback"),
    ("GET", "/health"),
];

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(user_session_routes())
        .merge(oauth_routes(app_state))
        .merge(health_routes())
}

fn user_session_routes() -> Router {
    Router::new()
        .route("/", get(user_session_controller::current_user))
        .route("/login", get(user_session_controller::login))
        .route("/logout", get(user_session_controller::logout))
}

fn oauth_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/auth/{provider}", get(oauth_controller::authorize))
        .route(
            "/auth/{provider}/callback",
            get(oauth_controller::callback),
        )
        .with_state(app_state)
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}
