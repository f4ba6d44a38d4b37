//! Twitter legacy OAuth provider for lockside.
//!
//! This is the *fallback* path: it drives Twitter through the same uniform
//! delegated strategy as Google and Facebook, for operators who cannot (or
//! choose not to) use the hand-rolled PKCE handshake. The two flows are
//! independent; this one carries its own state and never touches the
//! session-held handshake.

use std::time::Duration;

use async_trait::async_trait;
use lockside_core::error::{AuthError, ProtocolError};
use lockside_core::pkce::CHALLENGE_METHOD;
use lockside_core::user::{Provider, ProviderProfile};
use lockside_core::OAuthProvider;
use log::warn;
use serde::Deserialize;

/// Twitter's OAuth2 authorization endpoint.
pub const TWITTER_AUTHORIZE_URL: &str = "https://twitter.com/i/oauth2/authorize";
/// Twitter's token endpoint.
pub const TWITTER_TOKEN_URL: &str = "https://api.twitter.com/2/oauth2/token";
/// Twitter's authenticated-user endpoint.
pub const TWITTER_USERINFO_URL: &str = "https://api.twitter.com/2/users/me";

const SCOPES: &str = "users.read tweet.read";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Twitter [`OAuthProvider`] implementation for the fallback flow.
pub struct TwitterProvider {
    consumer_key: String,
    consumer_secret: String,
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

#[derive(Deserialize)]
struct UserInfoResponse {
    data: TwitterUser,
}

#[derive(Deserialize)]
struct TwitterUser {
    id: String,
    name: Option<String>,
    username: Option<String>,
    profile_image_url: Option<String>,
}

impl TwitterProvider {
    /// Provider against the real Twitter endpoints.
    pub fn new(
        consumer_key: String,
        consumer_secret: String,
        redirect_uri: String,
    ) -> Result<Self, AuthError> {
        Self::with_endpoints(
            consumer_key,
            consumer_secret,
            redirect_uri,
            TWITTER_AUTHORIZE_URL.to_string(),
            TWITTER_TOKEN_URL.to_string(),
            TWITTER_USERINFO_URL.to_string(),
        )
    }

    /// Provider against custom endpoints (tests point this at a mock server).
    pub fn with_endpoints(
        consumer_key: String,
        consumer_secret: String,
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
            consumer_key,
            consumer_secret,
            redirect_uri,
            authorize_url,
            token_url,
            userinfo_url,
            http,
        })
    }
}

#[async_trait]
impl OAuthProvider for TwitterProvider {
    fn provider(&self) -> Provider {
        Provider::Twitter
    }

    fn authorization_url(&self, state: &str, code_challenge: Option<&str>) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.consumer_key)
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
            ("client_id", self.consumer_key.as_str()),
        ];
        if let Some(verifier) = code_verifier {
            params.push(("code_verifier", verifier));
        }

        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
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
            warn!("twitter token endpoint rejected the fallback exchange: {status}");
            return Err(ProtocolError::Exchange(format!("token endpoint returned {status}")).into());
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProtocolError::Exchange(format!("malformed token response: {e}")))?;

        let response = self
            .http
            .get(&self.userinfo_url)
            .query(&[("user.fields", "profile_image_url")])
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
            warn!("twitter userinfo endpoint rejected the fallback request: {status}");
            return Err(ProtocolError::UserInfo(format!("userinfo endpoint returned {status}")).into());
        }

        let info: UserInfoResponse = response
            .json()
            .await
            .map_err(|e| ProtocolError::UserInfo(format!("malformed userinfo response: {e}")))?;
        let user = info.data;

        Ok(ProviderProfile {
            provider: Provider::Twitter,
            provider_id: user.id,
            display_name: user.name.clone().or_else(|| user.username.clone()),
            handle: user.username,
            email: None,
            avatar: user.profile_image_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_against(server: &MockServer) -> TwitterProvider {
        TwitterProvider::with_endpoints(
            "consumer-key".into(),
            "consumer-secret".into(),
            "http://localhost:3000/auth/twitter/fallback/callback".into(),
            format!("{}/authorize", server.uri()),
            format!("{}/token", server.uri()),
            format!("{}/users/me", server.uri()),
        )
        .expect("provider")
    }

    #[tokio::test]
    async fn exchange_uses_basic_client_auth_and_maps_handle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "tw-access-token",
                "token_type": "bearer"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "id": "2244994945",
                    "name": "Day Trader",
                    "username": "daytrader"
                }
            })))
            .mount(&server)
            .await;

        let provider = provider_against(&server);
        let profile = provider
            .exchange_code("auth-code", Some("verifier"))
            .await
            .unwrap();

        assert_eq!(profile.provider, Provider::Twitter);
        assert_eq!(profile.provider_id, "2244994945");
        assert_eq!(profile.handle.as_deref(), Some("daytrader"));
        assert!(profile.email.is_none());
    }

    #[tokio::test]
    async fn authorization_url_defaults_to_twitter_scopes() {
        let server = MockServer::start().await;
        let provider = provider_against(&server);
        let url = provider.authorization_url("st", None);
        assert!(url.contains("scope=users.read+tweet.read"));
        assert!(!url.contains("code_challenge"));
    }
}
