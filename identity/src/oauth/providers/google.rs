//! Google OAuth provider implementation.

use async_trait::async_trait;
use chrono::Utc;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{Error, ErrorKind, OAuthErrorKind};
use crate::oauth::token::TokenSet;
use crate::oauth::{Endpoints, OAuthClient, PromptHint, Session, User};

pub const NAME: &str = "google";

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const PROFILE_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Google's production endpoints.
pub fn default_endpoints() -> Endpoints {
    Endpoints {
        auth_url: AUTH_URL.to_string(),
        token_url: TOKEN_URL.to_string(),
        profile_url: PROFILE_URL.to_string(),
    }
}

/// OpenID Connect userinfo claims returned by Google.
#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    given_name: Option<String>,
    #[serde(default)]
    family_name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

/// Google OAuth provider.
///
/// Handles OAuth 2.0 flows for Google accounts, including:
/// - Authorization URL generation with PKCE and offline access
/// - Authorization code exchange
/// - Token refresh
/// - User info retrieval from the OpenID Connect userinfo endpoint
pub struct Provider {
    client: OAuthClient,
    scopes: Vec<String>,
    prompt: PromptHint,
}

impl Provider {
    /// Create a new Google OAuth provider.
    ///
    /// # Arguments
    ///
    /// * `client_id` - Google OAuth client ID
    /// * `client_secret` - Google OAuth client secret
    /// * `callback_url` - OAuth redirect URI
    /// * `scopes` - Requested scopes; `openid email profile` when empty
    pub fn new(
        client_id: String,
        client_secret: SecretString,
        callback_url: String,
        scopes: Vec<String>,
    ) -> Self {
        let scopes = if scopes.is_empty() {
            vec!["openid".to_string(), "email".to_string(), "profile".to_string()]
        } else {
            scopes
        };

        Self {
            client: OAuthClient::new(client_id, client_secret, callback_url, default_endpoints()),
            scopes,
            prompt: PromptHint::default(),
        }
    }

    /// Point the provider at different endpoints, e.g. a local stub.
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.client = self.client.with_endpoints(endpoints);
        self
    }

    /// Use a shared, preconfigured HTTP client.
    pub fn with_http_client(mut self, http_client: reqwest::Client) -> Self {
        self.client = self.client.with_http_client(http_client);
        self
    }
}

#[async_trait]
impl crate::oauth::Provider for Provider {
    fn name(&self) -> &str {
        NAME
    }

    fn begin_auth(&self, state: &str) -> Result<Session, Error> {
        let prompt = self.prompt.take();
        let mut extra = vec![("access_type", "offline")];
        if let Some(prompt) = prompt.as_deref() {
            extra.push(("prompt", prompt));
        }

        self.client
            .begin_session(NAME, &self.scopes, state, true, &extra)
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

        debug!("Fetching Google user info");
        let raw: Map<String, Value> = self.client.fetch_profile(access_token).await?;
        let info: GoogleUserInfo =
            serde_json::from_value(Value::Object(raw.clone())).map_err(|e| {
                warn!("Failed to parse Google user info: {:?}", e);
                Error {
                    source: Some(Box::new(e)),
                    error_kind: ErrorKind::OAuth(OAuthErrorKind::MalformedResponse),
                }
            })?;

        Ok(User {
            provider: NAME.to_string(),
            user_id: info.sub,
            email: info.email,
            name: info.name,
            first_name: info.given_name,
            last_name: info.family_name,
            nick_name: None,
            avatar_url: info.picture,
            access_token: access_token.to_string(),
            refresh_token: session.refresh_token().map(str::to_string),
            expires_at: session.expires_at(),
            id_token: session.id_token().map(str::to_string),
            raw_data: raw,
        })
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, Error> {
        self.client.refresh(refresh_token).await
    }

    fn refresh_token_available(&self) -> bool {
        true
    }

    fn set_prompt(&self, prompt: &[&str]) {
        self.prompt.set(prompt);
    }
}
