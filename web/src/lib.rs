//! HTTP host for the front door: routes, cookie sessions and error responses.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use identity::{Handshake, Registry};
use log::*;
use service::config::Config;
use time::Duration;
use tower_http::cors::CorsLayer;
use tower_sessions::cookie::SameSite;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

mod controller;
pub mod error;
pub mod providers;
pub mod router;
pub mod session_store;

pub use error::{Error, Result};

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub handshake: Handshake,
}

impl AppState {
    pub fn new(config: Config, registry: Arc<Registry>) -> Self {
        let handshake = Handshake::new(registry).with_state_ttl(state_ttl(&config));
        Self { config, handshake }
    }
}

fn state_ttl(config: &Config) -> chrono::Duration {
    i64::try_from(config.state_ttl_seconds)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or_else(|| {
            warn!(
                "STATE_TTL_SECONDS={} is out of range, using 600",
                config.state_ttl_seconds
            );
            chrono::Duration::minutes(10)
        })
}

/// The full application: routes plus the cookie session and CORS layers.
pub fn app(app_state: AppState) -> Router {
    let session_layer = session_layer(&app_state.config);
    let cors_layer = cors_layer(&app_state.config);

    router::define_routes(app_state)
        .layer(session_layer)
        .layer(cors_layer)
}

fn session_layer(config: &Config) -> SessionManagerLayer<MemoryStore> {
    // Lax so the cookie comes back on the provider's cross-site redirect to the callback.
    SessionManagerLayer::new(MemoryStore::default())
        .with_secure(config.is_production())
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(Duration::seconds(
            config.session_expiry_seconds as i64,
        )))
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter(|origin| {
            let wildcard = origin.trim() == "*";
            if wildcard {
                warn!("Ignoring wildcard CORS origin, credentials require explicit origins");
            }
            !wildcard
        })
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin {origin}: {e}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
}

pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let interface = app_state
        .config
        .interface
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let addr = format!("{}:{}", interface, app_state.config.port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server starting... listening for connections on http://{addr}");

    axum::serve(listener, app(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}
