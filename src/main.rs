use log::{error, info};
use service::{config::Config, logging::Logger};
use std::sync::Arc;
use web::router::ROUTES;

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config as &Config);

    info!(
        "Starting front door [{}] on {}:{}",
        config.runtime_env(),
        config.interface.as_deref().unwrap_or("127.0.0.1"),
        config.port
    );
    if config.allow_state_override {
        info!("State override is enabled, do not run this configuration in production");
    }

    let registry = match web::providers::build_registry(&config) {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            error!("Failed to set up identity providers: {e}");
            std::process::exit(1);
        }
    };

    info!("Configured Routes:");
    info!("    {:<8}{}", "METHOD", "PATH");
    for (method, path) in ROUTES {
        info!("    {:<8}{}", method, path);
    }

    let app_state = web::AppState::new(config, registry);
    if let Err(e) = web::init_server(app_state).await {
        error!("Server stopped with error: {e}");
        std::process::exit(1);
    }
}
