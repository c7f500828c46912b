//! Wire protocol shared by every provider variant.
//!
//! Builds RFC 6749 authorization URLs and performs the token and profile calls.
//! Provider variants own one `OAuthClient` and add their own defaults and profile
//! mapping on top.

use chrono::Utc;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use url::Url;

use super::pkce::{CodeVerifier, CHALLENGE_METHOD};
use super::token::{TokenResponse, TokenSet};
use super::Session;
use crate::error::{
    config_error, oauth_error, upstream_error, Error, ErrorKind, OAuthErrorKind,
    UpstreamErrorKind,
};

/// A provider's three endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoints {
    pub auth_url: String,
    pub token_url: String,
    pub profile_url: String,
}

/// Which grant a token request carries; rejections are reported differently.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Grant {
    AuthorizationCode,
    RefreshToken,
}

/// OAuth client credentials plus endpoints.
pub struct OAuthClient {
    client_id: String,
    client_secret: SecretString,
    redirect_uri: String,
    endpoints: Endpoints,
    http_client: reqwest::Client,
}

impl OAuthClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `client_id` - OAuth client ID
    /// * `client_secret` - OAuth client secret
    /// * `redirect_uri` - Callback URL registered with the provider
    /// * `endpoints` - Authorization, token and profile endpoints
    pub fn new(
        client_id: String,
        client_secret: SecretString,
        redirect_uri: String,
        endpoints: Endpoints,
    ) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            endpoints,
            http_client: reqwest::Client::new(),
        }
    }

    /// Use a shared, preconfigured HTTP client.
    pub fn with_http_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = http_client;
        self
    }

    /// Replace the endpoints, keeping credentials and HTTP client.
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    fn check_credentials(&self) -> Result<(), Error> {
        if self.client_id.trim().is_empty() {
            return Err(config_error("client id is not configured"));
        }
        if self.client_secret.expose_secret().trim().is_empty() {
            return Err(config_error("client secret is not configured"));
        }
        if self.redirect_uri.trim().is_empty() {
            return Err(config_error("callback URL is not configured"));
        }
        Ok(())
    }

    /// Build the authorization URL.
    ///
    /// `extra` pairs are appended after the standard parameters, in order.
    pub fn authorization_url(
        &self,
        scopes: &[String],
        state: &str,
        extra: &[(&str, &str)],
    ) -> Result<String, Error> {
        self.check_credentials()?;

        let mut url = Url::parse(&self.endpoints.auth_url).map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: ErrorKind::Config,
        })?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", &self.redirect_uri)
                .append_pair("response_type", "code");
            if !scopes.is_empty() {
                query.append_pair("scope", &scopes.join(" "));
            }
            query.append_pair("state", state);
            for (key, value) in extra {
                query.append_pair(key, value);
            }
        }

        Ok(url.into())
    }

    /// Build the authorization URL and wrap it in a fresh session for `provider`.
    ///
    /// With `pkce` set, a verifier is generated, its S256 challenge goes on the URL and
    /// the verifier is kept in the session for the code exchange.
    pub fn begin_session(
        &self,
        provider: &str,
        scopes: &[String],
        state: &str,
        pkce: bool,
        extra: &[(&str, &str)],
    ) -> Result<Session, Error> {
        let verifier = pkce.then(CodeVerifier::generate);
        let challenge = verifier.as_ref().map(CodeVerifier::challenge);

        let mut params: Vec<(&str, &str)> = extra.to_vec();
        if let Some(challenge) = challenge.as_deref() {
            params.push(("code_challenge", challenge));
            params.push(("code_challenge_method", CHALLENGE_METHOD));
        }

        let url = self.authorization_url(scopes, state, &params)?;
        Ok(Session::new(
            provider,
            url,
            state.to_string(),
            verifier.map(CodeVerifier::into_string),
        ))
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: Option<&str>,
    ) -> Result<TokenSet, Error> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];
        if let Some(verifier) = pkce_verifier {
            form.push(("code_verifier", verifier));
        }

        debug!("Exchanging OAuth code for tokens at {}", self.endpoints.token_url);
        let tokens = self.token_request(&form, Grant::AuthorizationCode).await?;
        info!("Successfully exchanged OAuth code for tokens");
        Ok(tokens)
    }

    /// Exchange a refresh token for a new token set.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, Error> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        debug!("Refreshing access token at {}", self.endpoints.token_url);
        let tokens = self.token_request(&form, Grant::RefreshToken).await?;
        info!("Successfully refreshed access token");
        Ok(tokens)
    }

    async fn token_request(&self, form: &[(&str, &str)], grant: Grant) -> Result<TokenSet, Error> {
        let mut body = form.to_vec();
        body.push(("client_id", self.client_id.as_str()));
        body.push(("client_secret", self.client_secret.expose_secret().as_str()));

        let response = self
            .http_client
            .post(&self.endpoints.token_url)
            .header(ACCEPT, "application/json")
            .form(&body)
            .send()
            .await
            .map_err(|e| {
                warn!("Token request failed: {:?}", e);
                Error::from(e)
            })?;

        let status = response.status();
        if status.is_success() {
            let body: TokenResponse = response.json().await.map_err(|e| {
                warn!("Failed to parse token response: {:?}", e);
                malformed(e)
            })?;
            return Ok(TokenSet::from_response(body, Utc::now()));
        }

        let error_text = response.text().await.unwrap_or_default();
        warn!("Token endpoint returned {}: {}", status, error_text);

        let rejected = status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED;
        if grant == Grant::RefreshToken && rejected {
            return Err(oauth_error(OAuthErrorKind::InvalidRefreshToken, &error_text));
        }
        Err(upstream_error(
            UpstreamErrorKind::Status(status.as_u16()),
            &error_text,
        ))
    }

    /// Fetch the profile payload with a bearer access token.
    pub async fn fetch_profile(&self, access_token: &str) -> Result<Map<String, Value>, Error> {
        let response = self
            .http_client
            .get(&self.endpoints.profile_url)
            .header(ACCEPT, "application/json")
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                warn!("Profile request failed: {:?}", e);
                Error::from(e)
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(oauth_error(
                OAuthErrorKind::TokenExpired,
                "provider rejected the access token",
            ));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!("Profile endpoint returned {}: {}", status, error_text);
            return Err(upstream_error(
                UpstreamErrorKind::Status(status.as_u16()),
                &error_text,
            ));
        }

        response.json::<Map<String, Value>>().await.map_err(|e| {
            warn!("Failed to parse profile response: {:?}", e);
            malformed(e)
        })
    }
}

fn malformed(err: reqwest::Error) -> Error {
    Error {
        source: Some(Box::new(err)),
        error_kind: ErrorKind::OAuth(OAuthErrorKind::MalformedResponse),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn endpoints(base: &str) -> Endpoints {
        Endpoints {
            auth_url: format!("{base}/authorize"),
            token_url: format!("{base}/token"),
            profile_url: format!("{base}/userinfo"),
        }
    }

    fn client(base: &str) -> OAuthClient {
        OAuthClient::new(
            "abc".to_string(),
            SecretString::from("xyz".to_string()),
            "https://app/cb".to_string(),
            endpoints(base),
        )
    }

    fn query(url: &str) -> Vec<(String, String)> {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn test_authorization_url_parameters() {
        let url = client("http://localhost:9096")
            .authorization_url(
                &["openid".to_string(), "email".to_string()],
                "s1",
                &[("prompt", "consent")],
            )
            .unwrap();

        assert!(url.starts_with("http://localhost:9096/authorize?"));
        assert_eq!(
            query(&url),
            vec![
                ("client_id".to_string(), "abc".to_string()),
                ("redirect_uri".to_string(), "https://app/cb".to_string()),
                ("response_type".to_string(), "code".to_string()),
                ("scope".to_string(), "openid email".to_string()),
                ("state".to_string(), "s1".to_string()),
                ("prompt".to_string(), "consent".to_string()),
            ]
        );
    }

    #[test]
    fn test_authorization_url_requires_credentials() {
        let client = OAuthClient::new(
            String::new(),
            SecretString::from("xyz".to_string()),
            "https://app/cb".to_string(),
            endpoints("http://localhost:9096"),
        );
        let err = client.authorization_url(&[], "s1", &[]).unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Config);
    }

    #[test]
    fn test_authorization_url_rejects_bad_endpoint() {
        let err = client("not a url")
            .authorization_url(&[], "s1", &[])
            .unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Config);
    }

    #[test]
    fn test_begin_session_with_pkce() {
        let session = client("http://localhost:9096")
            .begin_session("aps", &[], "s1", true, &[])
            .unwrap();

        let verifier = session.pkce_verifier().unwrap().to_string();
        let params = query(session.auth_url().unwrap());
        let challenge = CodeVerifier::from_string(verifier).challenge();

        assert!(params.contains(&("code_challenge".to_string(), challenge)));
        assert!(params.contains(&("code_challenge_method".to_string(), "S256".to_string())));
        assert_eq!(session.state(), Some("s1"));
    }

    #[test]
    fn test_begin_session_without_pkce() {
        let session = client("http://localhost:9096")
            .begin_session("aps", &[], "s1", false, &[])
            .unwrap();
        assert!(session.pkce_verifier().is_none());
        assert!(!session.auth_url().unwrap().contains("code_challenge"));
    }

    #[tokio::test]
    async fn test_exchange_code_posts_form() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("code".into(), "code123".into()),
                Matcher::UrlEncoded("code_verifier".into(), "v1".into()),
                Matcher::UrlEncoded("client_id".into(), "abc".into()),
                Matcher::UrlEncoded("client_secret".into(), "xyz".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"tok1","expires_in":3600}"#)
            .create_async()
            .await;

        let tokens = client(&server.url())
            .exchange_code("code123", Some("v1"))
            .await
            .unwrap();

        assert_eq!(tokens.access_token.expose_secret(), "tok1");
        assert!(tokens.expires_at.is_some());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_exchange_code_rejection_is_upstream() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let err = client(&server.url())
            .exchange_code("bad", None)
            .await
            .unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::Upstream(UpstreamErrorKind::Status(400))
        );
    }

    #[tokio::test]
    async fn test_refresh_rejection_is_invalid_refresh_token() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/token")
            .match_body(Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()))
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let err = client(&server.url()).refresh("stale").await.unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::OAuth(OAuthErrorKind::InvalidRefreshToken)
        );
    }

    #[tokio::test]
    async fn test_refresh_server_error_is_upstream() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/token")
            .with_status(503)
            .create_async()
            .await;

        let err = client(&server.url()).refresh("r").await.unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::Upstream(UpstreamErrorKind::Status(503))
        );
    }

    #[tokio::test]
    async fn test_token_response_not_json_is_malformed() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/token")
            .with_status(200)
            .with_body("access_token=tok1")
            .create_async()
            .await;

        let err = client(&server.url())
            .exchange_code("code123", None)
            .await
            .unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::OAuth(OAuthErrorKind::MalformedResponse)
        );
    }

    #[tokio::test]
    async fn test_fetch_profile_sends_bearer_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/userinfo")
            .match_header("authorization", "Bearer tok1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"u1","email":"a@b.com"}"#)
            .create_async()
            .await;

        let profile = client(&server.url()).fetch_profile("tok1").await.unwrap();
        assert_eq!(profile.get("id"), Some(&Value::String("u1".to_string())));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_profile_unauthorized_is_token_expired() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/userinfo")
            .with_status(401)
            .create_async()
            .await;

        let err = client(&server.url()).fetch_profile("old").await.unwrap_err();
        assert!(err.is_token_expired());
    }

    #[tokio::test]
    async fn test_fetch_profile_server_error_is_upstream() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/userinfo")
            .with_status(500)
            .create_async()
            .await;

        let err = client(&server.url()).fetch_profile("tok1").await.unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::Upstream(UpstreamErrorKind::Status(500))
        );
    }

    #[tokio::test]
    async fn test_fetch_profile_array_is_malformed() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/userinfo")
            .with_status(200)
            .with_body("[1,2,3]")
            .create_async()
            .await;

        let err = client(&server.url()).fetch_profile("tok1").await.unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::OAuth(OAuthErrorKind::MalformedResponse)
        );
    }
}
