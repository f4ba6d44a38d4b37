use std::time::Duration;

use lockside_core::error::{AuthError, ProtocolError};
use lockside_core::pkce::{self, Pkce, CHALLENGE_METHOD};
use lockside_core::user::{Provider, ProviderProfile};
use lockside_session::Handshake;
use log::{debug, warn};
use serde::Deserialize;

/// Twitter's OAuth2 authorization endpoint.
pub const TWITTER_AUTHORIZE_URL: &str = "https://twitter.com/i/oauth2/authorize";
/// Twitter's token endpoint.
pub const TWITTER_TOKEN_URL: &str = "https://api.twitter.com/2/oauth2/token";
/// Twitter's authenticated-user endpoint.
pub const TWITTER_USERINFO_URL: &str = "https://api.twitter.com/2/users/me";

const SCOPES: &str = "users.read tweet.read";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for the PKCE handshake engine.
#[derive(Clone, Debug)]
pub struct PkceConfig {
    /// OAuth2 client id (consumer key).
    pub client_id: String,
    /// OAuth2 client secret (consumer secret).
    pub client_secret: String,
    /// The externally visible callback URL registered with the provider.
    pub redirect_uri: String,
    /// Authorization endpoint.
    pub authorize_url: String,
    /// Token endpoint.
    pub token_url: String,
    /// Userinfo endpoint.
    pub userinfo_url: String,
    /// Bound on each outbound provider call.
    pub timeout: Duration,
}

impl PkceConfig {
    /// Config against the real Twitter endpoints.
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            authorize_url: TWITTER_AUTHORIZE_URL.to_string(),
            token_url: TWITTER_TOKEN_URL.to_string(),
            userinfo_url: TWITTER_USERINFO_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// The hand-rolled Authorization Code + PKCE handshake engine.
///
/// Pure protocol: the engine never touches the session itself. The route
/// orchestrator persists the [`Handshake`] returned by [`initiate`]
/// (`PkceHandshake::initiate`) and hands the stored verifier back to
/// [`complete`](PkceHandshake::complete) after it has validated the state.
pub struct PkceHandshake {
    config: PkceConfig,
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

impl PkceHandshake {
    /// Build an engine; the HTTP client carries the configured timeout.
    pub fn new(config: PkceConfig) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AuthError::Internal(format!("http client construction failed: {e}")))?;
        Ok(Self { config, http })
    }

    /// Begin a handshake.
    ///
    /// Returns the authorization URL for the browser redirect and the
    /// [`Handshake`] artifacts the caller must persist against the session
    /// before redirecting.
    pub fn initiate(&self, return_to: Option<String>) -> (String, Handshake) {
        let pkce = Pkce::new();
        let state = pkce::random_token();

        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", SCOPES)
            .append_pair("state", &state)
            .append_pair("code_challenge", &pkce.code_challenge)
            .append_pair("code_challenge_method", CHALLENGE_METHOD)
            .finish();

        debug!("initiated twitter pkce handshake");
        let handshake = Handshake::new(pkce.code_verifier, state, return_to);
        (format!("{}?{query}", self.config.authorize_url), handshake)
    }

    /// Complete a handshake: exchange the code with the stored verifier, then
    /// fetch the user's profile with the resulting access token.
    ///
    /// Only called after the orchestrator has consumed the session handshake
    /// and validated the state token.
    pub async fn complete(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<ProviderProfile, AuthError> {
        let access_token = self.exchange_code(code, code_verifier).await?;
        let user = self.fetch_userinfo(&access_token).await?;
        debug!("twitter pkce handshake completed for provider id {}", user.id);

        Ok(ProviderProfile {
            provider: Provider::Twitter,
            provider_id: user.id,
            display_name: user.name.clone().or_else(|| user.username.clone()),
            handle: user.username,
            email: None,
            avatar: user.profile_image_url,
        })
    }

    async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<String, AuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("code_verifier", code_verifier),
        ];

        let response = self
            .http
            .post(&self.config.token_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
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
            let body = response.text().await.unwrap_or_default();
            warn!("twitter token endpoint rejected the exchange: {status} {body}");
            return Err(ProtocolError::Exchange(format!("token endpoint returned {status}")).into());
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProtocolError::Exchange(format!("malformed token response: {e}")))?;
        Ok(token.access_token)
    }

    async fn fetch_userinfo(&self, access_token: &str) -> Result<TwitterUser, AuthError> {
        let response = self
            .http
            .get(&self.config.userinfo_url)
            .query(&[("user.fields", "profile_image_url")])
            .bearer_auth(access_token)
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
            warn!("twitter userinfo endpoint rejected the request: {status}");
            return Err(ProtocolError::UserInfo(format!("userinfo endpoint returned {status}")).into());
        }

        let info: UserInfoResponse = response
            .json()
            .await
            .map_err(|e| ProtocolError::UserInfo(format!("malformed userinfo response: {e}")))?;
        Ok(info.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn engine_against(server: &MockServer, timeout: Duration) -> PkceHandshake {
        let config = PkceConfig {
            client_id: "consumer-key".into(),
            client_secret: "consumer-secret".into(),
            redirect_uri: "http://localhost:3000/auth/twitter/callback".into(),
            authorize_url: format!("{}/authorize", server.uri()),
            token_url: format!("{}/token", server.uri()),
            userinfo_url: format!("{}/users/me", server.uri()),
            timeout,
        };
        PkceHandshake::new(config).expect("engine")
    }

    fn mock_token(server: &MockServer) -> Mock {
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code_verifier="))
            .and(header_exists("authorization"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({
                    "token_type": "bearer",
                    "access_token": "tw-access-token",
                    "expires_in": 7200
                })),
            )
    }

    #[tokio::test]
    async fn initiate_builds_a_complete_authorization_url() {
        let server = MockServer::start().await;
        let engine = engine_against(&server, DEFAULT_TIMEOUT);

        let (url, handshake) = engine.initiate(Some("/portfolio".into()));
        let parsed = url::Url::parse(&url).unwrap();
        let query: std::collections::HashMap<_, _> = parsed.query_pairs().into_owned().collect();

        assert_eq!(query["response_type"], "code");
        assert_eq!(query["client_id"], "consumer-key");
        assert_eq!(query["state"], handshake.state);
        assert_eq!(
            query["code_challenge"],
            pkce::challenge_for(&handshake.code_verifier)
        );
        assert_eq!(query["code_challenge_method"], "S256");
        assert_eq!(handshake.return_to.as_deref(), Some("/portfolio"));
        assert!(!handshake.is_expired());
    }

    #[tokio::test]
    async fn complete_exchanges_code_and_maps_profile() {
        let server = MockServer::start().await;
        mock_token(&server).mount(&server).await;
        Mock::given(method("GET"))
            .and(path("/users/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "id": "2244994945",
                    "name": "Day Trader",
                    "username": "daytrader",
                    "profile_image_url": "https://pbs.example/avatar.png"
                }
            })))
            .mount(&server)
            .await;

        let engine = engine_against(&server, DEFAULT_TIMEOUT);
        let profile = engine.complete("auth-code", "the-verifier").await.unwrap();

        assert_eq!(profile.provider, Provider::Twitter);
        assert_eq!(profile.provider_id, "2244994945");
        assert_eq!(profile.handle.as_deref(), Some("daytrader"));
        assert_eq!(profile.display_name.as_deref(), Some("Day Trader"));
        assert_eq!(profile.avatar.as_deref(), Some("https://pbs.example/avatar.png"));
        assert!(profile.email.is_none());
    }

    #[tokio::test]
    async fn rejected_exchange_is_a_distinct_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_request"
            })))
            .mount(&server)
            .await;

        let engine = engine_against(&server, DEFAULT_TIMEOUT);
        let err = engine.complete("bad-code", "verifier").await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::Protocol(ProtocolError::Exchange(_))
        ));
    }

    #[tokio::test]
    async fn slow_token_endpoint_surfaces_as_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(500))
                    .set_body_json(json!({ "access_token": "late" })),
            )
            .mount(&server)
            .await;

        let engine = engine_against(&server, Duration::from_millis(50));
        let err = engine.complete("auth-code", "verifier").await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::Protocol(ProtocolError::Timeout("token exchange"))
        ));
    }

    #[tokio::test]
    async fn failed_userinfo_is_a_distinct_outcome() {
        let server = MockServer::start().await;
        mock_token(&server).mount(&server).await;
        Mock::given(method("GET"))
            .and(path("/users/me"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let engine = engine_against(&server, DEFAULT_TIMEOUT);
        let err = engine.complete("auth-code", "verifier").await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::Protocol(ProtocolError::UserInfo(_))
        ));
    }
}
