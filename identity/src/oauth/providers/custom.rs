//! Generic authorization server provider.
//!
//! Talks RFC 6749 to a self-hosted authorization server. Name, endpoints, scopes and
//! PKCE use all come from configuration, so several instances can be registered side
//! by side under different names.

use async_trait::async_trait;
use chrono::Utc;
use secrecy::SecretString;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{oauth_error, Error, OAuthErrorKind};
use crate::oauth::token::TokenSet;
use crate::oauth::user::first_string;
use crate::oauth::{Endpoints, OAuthClient, PromptHint, Session, User};

/// Registry name used when none is configured.
pub const DEFAULT_NAME: &str = "aps";

pub const DEFAULT_AUTH_URL: &str = "http://localhost:9096/authorize";
pub const DEFAULT_TOKEN_URL: &str = "http://localhost:9096/token";
pub const DEFAULT_PROFILE_URL: &str = "http://localhost:9096/userinfo";

/// Configuration for a custom authorization server.
#[derive(Debug, Clone)]
pub struct Config {
    pub name: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub callback_url: String,
    pub endpoints: Endpoints,
    pub scopes: Vec<String>,
    pub use_pkce: bool,
    pub refresh_supported: bool,
}

impl Config {
    /// Credentials with the default name, endpoints and no scopes.
    pub fn new(client_id: String, client_secret: SecretString, callback_url: String) -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            client_id,
            client_secret,
            callback_url,
            endpoints: Endpoints {
                auth_url: DEFAULT_AUTH_URL.to_string(),
                token_url: DEFAULT_TOKEN_URL.to_string(),
                profile_url: DEFAULT_PROFILE_URL.to_string(),
            },
            scopes: Vec::new(),
            use_pkce: false,
            refresh_supported: true,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn with_pkce(mut self, use_pkce: bool) -> Self {
        self.use_pkce = use_pkce;
        self
    }

    pub fn with_refresh(mut self, refresh_supported: bool) -> Self {
        self.refresh_supported = refresh_supported;
        self
    }
}

/// Custom authorization server provider.
pub struct Provider {
    name: String,
    client: OAuthClient,
    scopes: Vec<String>,
    use_pkce: bool,
    refresh_supported: bool,
    prompt: PromptHint,
}

impl Provider {
    pub fn new(config: Config) -> Self {
        Self {
            client: OAuthClient::new(
                config.client_id,
                config.client_secret,
                config.callback_url,
                config.endpoints,
            ),
            name: config.name,
            scopes: config.scopes,
            use_pkce: config.use_pkce,
            refresh_supported: config.refresh_supported,
            prompt: PromptHint::default(),
        }
    }

    /// Use a shared, preconfigured HTTP client.
    pub fn with_http_client(mut self, http_client: reqwest::Client) -> Self {
        self.client = self.client.with_http_client(http_client);
        self
    }

    fn to_user(&self, session: &Session, raw: Map<String, Value>) -> Result<User, Error> {
        let user_id = first_string(&raw, &["id", "sub", "user_id"]).ok_or_else(|| {
            oauth_error(
                OAuthErrorKind::MalformedResponse,
                "profile response carries no user identifier",
            )
        })?;

        Ok(User {
            provider: self.name.clone(),
            user_id,
            email: first_string(&raw, &["email"]),
            name: first_string(&raw, &["name", "username"]),
            first_name: first_string(&raw, &["given_name", "first_name"]),
            last_name: first_string(&raw, &["family_name", "last_name"]),
            nick_name: first_string(&raw, &["nickname", "preferred_username"]),
            avatar_url: first_string(&raw, &["avatar_url", "picture"]),
            access_token: session.access_token().unwrap_or_default().to_string(),
            refresh_token: session.refresh_token().map(str::to_string),
            expires_at: session.expires_at(),
            id_token: session.id_token().map(str::to_string),
            raw_data: raw,
        })
    }
}

#[async_trait]
impl crate::oauth::Provider for Provider {
    fn name(&self) -> &str {
        &self.name
    }

    fn begin_auth(&self, state: &str) -> Result<Session, Error> {
        let prompt = self.prompt.take();
        let extra: Vec<(&str, &str)> = prompt.iter().map(|p| ("prompt", p.as_str())).collect();

        self.client
            .begin_session(&self.name, &self.scopes, state, self.use_pkce, &extra)
    }

    async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: Option<&str>,
    ) -> Result<TokenSet, Error> {
        self.client.exchange_code(code, pkce_verifier).await
    }

    async fn fetch_user(&self, session: &Session) -> Result<User, Error> {
        let access_token = session.usable_access_token(Utc::now())?;

        debug!("Fetching {} profile", self.name);
        let raw = self.client.fetch_profile(access_token).await?;
        self.to_user(session, raw)
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, Error> {
        self.client.refresh(refresh_token).await
    }

    fn refresh_token_available(&self) -> bool {
        self.refresh_supported
    }

    fn set_prompt(&self, prompt: &[&str]) {
        self.prompt.set(prompt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, SessionErrorKind};
    use crate::oauth::{CallbackParams, Provider as _};
    use mockito::Server;
    use url::Url;

    fn config(base: &str) -> Config {
        Config::new(
            "abc".to_string(),
            SecretString::from("xyz".to_string()),
            "https://app/cb".to_string(),
        )
        .with_name("custom-idp")
        .with_endpoints(Endpoints {
            auth_url: format!("{base}/authorize"),
            token_url: format!("{base}/token"),
            profile_url: format!("{base}/userinfo"),
        })
    }

    fn param(url: &str, key: &str) -> Option<String> {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    #[test]
    fn test_default_config() {
        let config = Config::new(
            "id".to_string(),
            SecretString::from("secret".to_string()),
            "http://localhost:3000/auth/aps/callback".to_string(),
        );
        let provider = Provider::new(config);

        assert_eq!(provider.name(), "aps");
        assert!(provider.refresh_token_available());
        let session = provider.begin_auth("s1").unwrap();
        assert!(session
            .auth_url()
            .unwrap()
            .starts_with("http://localhost:9096/authorize?"));
    }

    #[test]
    fn test_begin_auth_builds_url() {
        let provider = Provider::new(
            config("https://idp.example")
                .with_scopes(vec!["profile".to_string(), "email".to_string()]),
        );
        let session = provider.begin_auth("s1").unwrap();
        let url = session.auth_url().unwrap();

        assert_eq!(param(url, "client_id").as_deref(), Some("abc"));
        assert_eq!(param(url, "redirect_uri").as_deref(), Some("https://app/cb"));
        assert_eq!(param(url, "response_type").as_deref(), Some("code"));
        assert_eq!(param(url, "scope").as_deref(), Some("profile email"));
        assert_eq!(param(url, "state").as_deref(), Some("s1"));
        assert_eq!(session.provider(), "custom-idp");
        assert!(session.access_token().is_none());
    }

    #[test]
    fn test_begin_auth_missing_secret_is_config_error() {
        let config = Config::new(
            "abc".to_string(),
            SecretString::from(String::new()),
            "https://app/cb".to_string(),
        );
        let err = Provider::new(config).begin_auth("s1").unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Config);
    }

    #[test]
    fn test_prompt_applies_to_next_begin_auth_only() {
        let provider = Provider::new(config("https://idp.example"));
        let earlier = provider.begin_auth("s0").unwrap();

        provider.set_prompt(&["consent"]);
        let prompted = provider.begin_auth("s1").unwrap();
        let following = provider.begin_auth("s2").unwrap();

        assert_eq!(param(prompted.auth_url().unwrap(), "prompt").as_deref(), Some("consent"));
        assert_eq!(param(following.auth_url().unwrap(), "prompt"), None);
        assert_eq!(param(earlier.auth_url().unwrap(), "prompt"), None);
    }

    #[test]
    fn test_begin_auth_with_pkce() {
        let provider = Provider::new(config("https://idp.example").with_pkce(true));
        let session = provider.begin_auth("s1").unwrap();

        assert!(session.pkce_verifier().is_some());
        assert_eq!(
            param(session.auth_url().unwrap(), "code_challenge_method").as_deref(),
            Some("S256")
        );
    }

    #[tokio::test]
    async fn test_fetch_user_before_authorize_is_token_expired() {
        let provider = Provider::new(config("https://idp.example"));
        let session = provider.begin_auth("s1").unwrap();

        let err = provider.fetch_user(&session).await.unwrap_err();
        assert!(err.is_token_expired());
    }

    #[tokio::test]
    async fn test_authorize_then_fetch_user() {
        let mut server = Server::new_async().await;
        let _token = server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"tok1","refresh_token":"ref1","expires_in":3600}"#)
            .create_async()
            .await;
        let _profile = server
            .mock("GET", "/userinfo")
            .match_header("authorization", "Bearer tok1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"id":"u1","email":"a@b.com","name":"Ann Bee",
                    "given_name":"Ann","family_name":"Bee","avatar_url":"https://img/u1"}"#,
            )
            .create_async()
            .await;

        let provider = Provider::new(config(&server.url()));
        let mut session = provider.begin_auth("s1").unwrap();
        let token = session
            .authorize(&provider, &CallbackParams::new("code123", "s1"))
            .await
            .unwrap();
        assert_eq!(token, "tok1");

        let user = provider.fetch_user(&session).await.unwrap();
        assert_eq!(user.provider, "custom-idp");
        assert_eq!(user.user_id, "u1");
        assert_eq!(user.email.as_deref(), Some("a@b.com"));
        assert_eq!(user.name.as_deref(), Some("Ann Bee"));
        assert_eq!(user.first_name.as_deref(), Some("Ann"));
        assert_eq!(user.last_name.as_deref(), Some("Bee"));
        assert_eq!(user.avatar_url.as_deref(), Some("https://img/u1"));
        assert_eq!(user.access_token, "tok1");
        assert_eq!(user.refresh_token.as_deref(), Some("ref1"));
        assert!(user.expires_at.is_some());
        assert_eq!(user.raw_data.len(), 6);
    }

    #[tokio::test]
    async fn test_profile_without_identifier_is_malformed() {
        let mut server = Server::new_async().await;
        let _profile = server
            .mock("GET", "/userinfo")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"email":"a@b.com"}"#)
            .create_async()
            .await;

        let provider = Provider::new(config(&server.url()));
        let session = Session::unmarshal(&format!(
            r#"{{"v":1,"provider":"custom-idp","auth_url":"{}/authorize","access_token":"tok1"}}"#,
            server.url()
        ))
        .unwrap();

        let err = provider.fetch_user(&session).await.unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::OAuth(OAuthErrorKind::MalformedResponse)
        );
    }

    #[tokio::test]
    async fn test_authorize_without_code_is_missing_code() {
        let provider = Provider::new(config("https://idp.example"));
        let mut session = provider.begin_auth("s1").unwrap();

        let params = CallbackParams::from_pairs([("state", "s1")]);
        let err = session.authorize(&provider, &params).await.unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::OAuth(OAuthErrorKind::MissingCode));
    }

    #[tokio::test]
    async fn test_authorize_denied_callback() {
        let provider = Provider::new(config("https://idp.example"));
        let mut session = provider.begin_auth("s1").unwrap();

        let params = CallbackParams::from_pairs([("error", "access_denied"), ("state", "s1")]);
        let err = session.authorize(&provider, &params).await.unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::OAuth(OAuthErrorKind::AuthorizationDenied)
        );
    }

    #[test]
    fn test_unmarshal_session_from_other_provider_is_rejected() {
        let aps = Provider::new(config("https://idp.example").with_name("aps"));
        let other = Provider::new(config("https://idp.example").with_name("other"));
        let data = aps.begin_auth("s1").unwrap().marshal().unwrap();

        assert!(aps.unmarshal_session(&data).is_ok());
        let err = other.unmarshal_session(&data).unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::Session(SessionErrorKind::ProviderMismatch)
        );
    }

    #[tokio::test]
    async fn test_refresh_token() {
        let mut server = Server::new_async().await;
        let _token = server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"tok2","expires_in":3600}"#)
            .create_async()
            .await;

        let provider = Provider::new(config(&server.url()));
        let tokens = provider.refresh_token("ref1").await.unwrap();
        assert!(tokens.expires_at.is_some());
        assert!(tokens.refresh_token.is_none());
    }
}
