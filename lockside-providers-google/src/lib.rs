//! Google OAuth provider for lockside.
//!
//! Implements the [`OAuthProvider`] seam: builds the consent-screen URL,
//! exchanges the authorization code at Google's token endpoint and maps the
//! userinfo payload into a [`ProviderProfile`].

use std::time::Duration;

use async_trait::async_trait;
use lockside_core::error::{AuthError, ProtocolError};
use lockside_core::pkce::CHALLENGE_METHOD;
use lockside_core::user::{Provider, ProviderProfile};
use lockside_core::OAuthProvider;
use log::warn;
use serde::Deserialize;

/// Google's OAuth2 authorization endpoint.
pub const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// Google's token endpoint.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// Google's userinfo endpoint.
pub const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

const SCOPES: &str = "openid email profile";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Google [`OAuthProvider`] implementation.
pub struct GoogleProvider {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    authorize_url: String,
    token_url: String,
    userinfo_url: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Userinfo payload from `oauth2/v2/userinfo`.
#[derive(Deserialize)]
struct GoogleUser {
    id: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

impl GoogleProvider {
    /// Provider against the real Google endpoints.
    pub fn new(
        client_id: String,
        client_secret: String,
        redirect_uri: String,
    ) -> Result<Self, AuthError> {
        Self::with_endpoints(
            client_id,
            client_secret,
            redirect_uri,
            GOOGLE_AUTHORIZE_URL.to_string(),
            GOOGLE_TOKEN_URL.to_string(),
            GOOGLE_USERINFO_URL.to_string(),
        )
    }

    /// Provider against custom endpoints (tests point this at a mock server).
    pub fn with_endpoints(
        client_id: String,
        client_secret: String,
        redirect_uri: String,
        authorize_url: String,
        token_url: String,
        userinfo_url: String,
    ) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| AuthError::Internal(format!("http client construction failed: {e}")))?;
        Ok(Self {
            client_id,
            client_secret,
            redirect_uri,
            authorize_url,
            token_url,
            userinfo_url,
            http,
        })
    }
}

#[async_trait]
impl OAuthProvider for GoogleProvider {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    fn authorization_url(&self, state: &str, code_challenge: Option<&str>) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", SCOPES)
            .append_pair("state", state);
        if let Some(challenge) = code_challenge {
            query
                .append_pair("code_challenge", challenge)
                .append_pair("code_challenge_method", CHALLENGE_METHOD);
        }
        format!("{}?{}", self.authorize_url, query.finish())
    }

    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<ProviderProfile, AuthError> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        if let Some(verifier) = code_verifier {
            params.push(("code_verifier", verifier));
        }

        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AuthError::Protocol(ProtocolError::Timeout("token exchange"))
                } else {
                    AuthError::Protocol(ProtocolError::Exchange(e.to_string()))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            warn!("google token endpoint rejected the exchange: {status}");
            return Err(ProtocolError::Exchange(format!("token endpoint returned {status}")).into());
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProtocolError::Exchange(format!("malformed token response: {e}")))?;

        let response = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AuthError::Protocol(ProtocolError::Timeout("userinfo fetch"))
                } else {
                    AuthError::Protocol(ProtocolError::UserInfo(e.to_string()))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            warn!("google userinfo endpoint rejected the request: {status}");
            return Err(ProtocolError::UserInfo(format!("userinfo endpoint returned {status}")).into());
        }

        let user: GoogleUser = response
            .json()
            .await
            .map_err(|e| ProtocolError::UserInfo(format!("malformed userinfo response: {e}")))?;

        Ok(ProviderProfile {
            provider: Provider::Google,
            provider_id: user.id,
            handle: None,
            display_name: user.name,
            email: user.email,
            avatar: user.picture,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_against(server: &MockServer) -> GoogleProvider {
        GoogleProvider::with_endpoints(
            "google-id".into(),
            "google-secret".into(),
            "http://localhost:3000/auth/google/callback".into(),
            format!("{}/authorize", server.uri()),
            format!("{}/token", server.uri()),
            format!("{}/userinfo", server.uri()),
        )
        .expect("provider")
    }

    #[tokio::test]
    async fn authorization_url_carries_state_and_challenge() {
        let server = MockServer::start().await;
        let provider = provider_against(&server);

        let url = provider.authorization_url("the-state", Some("the-challenge"));
        assert!(url.contains("state=the-state"));
        assert!(url.contains("code_challenge=the-challenge"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("scope=openid+email+profile"));
    }

    #[tokio::test]
    async fn exchange_maps_userinfo_into_profile() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("client_secret=google-secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "g-access-token",
                "token_type": "Bearer"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "108000000001",
                "email": "G.User@Example.com",
                "name": "G User",
                "picture": "https://lh3.example/photo.jpg"
            })))
            .mount(&server)
            .await;

        let provider = provider_against(&server);
        let profile = provider
            .exchange_code("auth-code", Some("verifier"))
            .await
            .unwrap();

        assert_eq!(profile.provider, Provider::Google);
        assert_eq!(profile.provider_id, "108000000001");
        assert!(profile.handle.is_none());
        assert_eq!(profile.display_name.as_deref(), Some("G User"));
        assert_eq!(profile.email.as_deref(), Some("G.User@Example.com"));
        assert_eq!(profile.avatar.as_deref(), Some("https://lh3.example/photo.jpg"));
    }

    #[tokio::test]
    async fn rejected_exchange_maps_to_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let provider = provider_against(&server);
        let err = provider.exchange_code("bad", None).await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::Protocol(ProtocolError::Exchange(_))
        ));
    }
}
