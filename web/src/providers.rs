//! Builds the provider registry from configuration.
//!
//! Both provider variants are always registered. One without credentials stays in the
//! registry and fails with a configuration error when a handshake is started.

use std::sync::Arc;
use std::time::Duration;

use identity::http::ClientBuilder;
use identity::oauth::providers::{custom, google};
use identity::oauth::{Endpoints, Provider};
use identity::{Error, Registry};
use log::*;
use secrecy::SecretString;
use service::config::Config;

pub fn build_registry(config: &Config) -> Result<Registry, Error> {
    let http_client = ClientBuilder::new()
        .with_timeout(Duration::from_secs(config.http_timeout_secs))
        .build()?;

    let custom_name = config.custom_provider_name.as_str();
    let custom_config = custom::Config::new(
        credential(
            config.custom_client_id(),
            custom_name,
            "CUSTOM_CLIENT_ID",
            String::new(),
        ),
        credential(
            config.custom_client_secret(),
            custom_name,
            "CUSTOM_CLIENT_SECRET",
            SecretString::from(String::new()),
        ),
        config.callback_url(custom_name),
    )
    .with_name(custom_name)
    .with_endpoints(Endpoints {
        auth_url: config.custom_auth_url.clone(),
        token_url: config.custom_token_url.clone(),
        profile_url: config.custom_profile_url.clone(),
    })
    .with_scopes(config.custom_scopes())
    .with_pkce(config.custom_use_pkce);
    let custom = custom::Provider::new(custom_config).with_http_client(http_client.clone());

    let google = google::Provider::new(
        credential(
            config.google_client_id(),
            google::NAME,
            "GOOGLE_CLIENT_ID",
            String::new(),
        ),
        credential(
            config.google_client_secret(),
            google::NAME,
            "GOOGLE_CLIENT_SECRET",
            SecretString::from(String::new()),
        ),
        config.callback_url(google::NAME),
        config.google_scopes(),
    )
    .with_http_client(http_client);

    let providers: Vec<Arc<dyn Provider>> = vec![Arc::new(custom), Arc::new(google)];
    let registry = Registry::new(providers);
    info!("Registered providers: {}", registry.names().join(", "));

    Ok(registry)
}

fn credential<T>(value: Option<T>, provider: &str, variable: &str, empty: T) -> T {
    value.unwrap_or_else(|| {
        warn!("{variable} is not set, handshakes with {provider} will fail until it is");
        empty
    })
}
