use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use secrecy::SecretString;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Default endpoints of the self-hosted authorization server.
pub const DEFAULT_CUSTOM_AUTH_URL: &str = "http://localhost:9096/authorize";
pub const DEFAULT_CUSTOM_TOKEN_URL: &str = "http://localhost:9096/token";
pub const DEFAULT_CUSTOM_PROFILE_URL: &str = "http://localhost:9096/userinfo";

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that allowed to receive server responses.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "http://localhost:3000,https://localhost:3000"
    )]
    pub allowed_origins: Vec<String>,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 3000)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap_or(LevelFilter::Info)),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap_or(RustEnv::Development)),
    )]
    pub runtime_env: RustEnv,

    /// Cookie session expiry in seconds, measured from the last request (default: 24 hours)
    #[arg(long, env, default_value_t = 86400)]
    pub session_expiry_seconds: u64,

    /// How long a begun handshake waits for the provider's callback, in seconds
    #[arg(long, env, default_value_t = 600)]
    pub state_ttl_seconds: u64,

    /// Timeout in seconds for each call to a provider's token or profile endpoint
    #[arg(long, env, default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// Accept a `state` query parameter on /auth/{provider} in place of a random state.
    /// Only meant for tests against a stub provider.
    #[arg(long, env, default_value_t = false)]
    pub allow_state_override: bool,

    /// The public base URL of this server, used to build provider callback URLs
    #[arg(long, env, default_value = "http://localhost:3000")]
    pub public_base_url: String,

    /// Registry name of the self-hosted authorization server
    #[arg(long, env, default_value = "aps")]
    pub custom_provider_name: String,

    /// OAuth client ID registered with the self-hosted authorization server
    #[arg(long, env)]
    custom_client_id: Option<String>,

    /// OAuth client secret registered with the self-hosted authorization server
    #[arg(long, env, value_parser = parse_secret)]
    custom_client_secret: Option<SecretString>,

    #[arg(long, env, default_value = DEFAULT_CUSTOM_AUTH_URL)]
    pub custom_auth_url: String,

    #[arg(long, env, default_value = DEFAULT_CUSTOM_TOKEN_URL)]
    pub custom_token_url: String,

    #[arg(long, env, default_value = DEFAULT_CUSTOM_PROFILE_URL)]
    pub custom_profile_url: String,

    /// Space separated scopes requested from the self-hosted authorization server
    #[arg(long, env)]
    custom_scopes: Option<String>,

    /// Send a PKCE challenge to the self-hosted authorization server
    #[arg(long, env, default_value_t = false)]
    pub custom_use_pkce: bool,

    /// Google OAuth client ID
    #[arg(long, env)]
    google_client_id: Option<String>,

    /// Google OAuth client secret
    #[arg(long, env, value_parser = parse_secret)]
    google_client_secret: Option<SecretString>,

    /// Space separated scopes requested from Google (default: openid email profile)
    #[arg(long, env)]
    google_scopes: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn custom_client_id(&self) -> Option<String> {
        self.custom_client_id.clone()
    }

    pub fn custom_client_secret(&self) -> Option<SecretString> {
        self.custom_client_secret.clone()
    }

    pub fn custom_scopes(&self) -> Vec<String> {
        split_scopes(self.custom_scopes.as_deref())
    }

    pub fn google_client_id(&self) -> Option<String> {
        self.google_client_id.clone()
    }

    pub fn google_client_secret(&self) -> Option<SecretString> {
        self.google_client_secret.clone()
    }

    pub fn google_scopes(&self) -> Vec<String> {
        split_scopes(self.google_scopes.as_deref())
    }

    /// Callback URL registered with `provider`, e.g. `{base}/auth/aps/callback`.
    pub fn callback_url(&self, provider: &str) -> String {
        format!(
            "{}/auth/{}/callback",
            self.public_base_url.trim_end_matches('/'),
            provider
        )
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }

    pub fn is_production(&self) -> bool {
        self.runtime_env() == RustEnv::Production
    }
}

fn parse_secret(value: &str) -> Result<SecretString, Infallible> {
    Ok(SecretString::from(value.to_string()))
}

fn split_scopes(scopes: Option<&str>) -> Vec<String> {
    scopes
        .map(|s| s.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["front_door"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);

        assert_eq!(config.interface.as_deref(), Some("127.0.0.1"));
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level_filter, LevelFilter::Info);
        assert_eq!(config.runtime_env(), RustEnv::Development);
        assert!(!config.allow_state_override);
        assert_eq!(config.custom_provider_name, "aps");
        assert_eq!(config.custom_auth_url, DEFAULT_CUSTOM_AUTH_URL);
        assert_eq!(config.state_ttl_seconds, 600);
        assert!(config.google_scopes().is_empty());
    }

    #[test]
    fn test_credentials_and_scopes() {
        let config = parse(&[
            "--custom-client-id",
            "abc",
            "--custom-client-secret",
            "xyz",
            "--custom-scopes",
            "read  write",
            "--allow-state-override",
        ]);

        assert_eq!(config.custom_client_id().as_deref(), Some("abc"));
        assert_eq!(
            config.custom_client_secret().unwrap().expose_secret().as_str(),
            "xyz"
        );
        assert_eq!(config.custom_scopes(), vec!["read", "write"]);
        assert!(config.allow_state_override);
    }

    #[test]
    fn test_debug_output_hides_secrets() {
        let config = parse(&[
            "--custom-client-secret",
            "custom-secret-value",
            "--google-client-secret",
            "google-secret-value",
        ]);

        let debug = format!("{config:?}");
        assert!(!debug.contains("custom-secret-value"));
        assert!(!debug.contains("google-secret-value"));
        assert_eq!(
            config.google_client_secret().unwrap().expose_secret().as_str(),
            "google-secret-value"
        );
    }

    #[test]
    fn test_callback_url() {
        let config = parse(&["--public-base-url", "https://app.example.com/"]);
        assert_eq!(
            config.callback_url("google"),
            "https://app.example.com/auth/google/callback"
        );
    }

    #[test]
    fn test_runtime_env_and_log_level() {
        let config = parse(&["--runtime-env", "PRODUCTION", "--log-level-filter", "DEBUG"]);
        assert!(config.is_production());
        assert_eq!(config.log_level_filter, LevelFilter::Debug);
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        assert!(Config::try_parse_from(["front_door", "--log-level-filter", "LOUD"]).is_err());
    }

    #[test]
    fn test_rust_env_from_str() {
        assert_eq!("Staging".parse::<RustEnv>(), Ok(RustEnv::Staging));
        assert_eq!("qa".parse::<RustEnv>(), Err(RustEnvParseError));
    }
}
