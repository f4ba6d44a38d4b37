//! Facebook OAuth provider for lockside.
//!
//! Same shape as the Google provider, against the Graph API endpoints. The
//! avatar comes back nested under `picture.data.url`.

use std::time::Duration;

use async_trait::async_trait;
use lockside_core::error::{AuthError, ProtocolError};
use lockside_core::pkce::CHALLENGE_METHOD;
use lockside_core::user::{Provider, ProviderProfile};
use lockside_core::OAuthProvider;
use log::warn;
use serde::Deserialize;

/// Facebook's OAuth dialog endpoint.
pub const FACEBOOK_AUTHORIZE_URL: &str = "https://www.facebook.com/v19.0/dialog/oauth";
/// Facebook's token endpoint.
pub const FACEBOOK_TOKEN_URL: &str = "https://graph.facebook.com/v19.0/oauth/access_token";
/// Facebook's profile endpoint.
pub const FACEBOOK_USERINFO_URL: &str = "https://graph.facebook.com/me";

const SCOPES: &str = "public_profile,email";
const USERINFO_FIELDS: &str = "id,name,email,picture";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Facebook [`OAuthProvider`] implementation.
pub struct FacebookProvider {
    app_id: String,
    app_secret: String,
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
struct FacebookUser {
    id: String,
    name: Option<String>,
    email: Option<String>,
    picture: Option<FacebookPicture>,
}

#[derive(Deserialize)]
struct FacebookPicture {
    data: FacebookPictureData,
}

#[derive(Deserialize)]
struct FacebookPictureData {
    url: String,
}

impl FacebookProvider {
    /// Provider against the real Graph API endpoints.
    pub fn new(
        app_id: String,
        app_secret: String,
        redirect_uri: String,
    ) -> Result<Self, AuthError> {
        Self::with_endpoints(
            app_id,
            app_secret,
            redirect_uri,
            FACEBOOK_AUTHORIZE_URL.to_string(),
            FACEBOOK_TOKEN_URL.to_string(),
            FACEBOOK_USERINFO_URL.to_string(),
        )
    }

    /// Provider against custom endpoints (tests point this at a mock server).
    pub fn with_endpoints(
        app_id: String,
        app_secret: String,
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
            app_id,
            app_secret,
            redirect_uri,
            authorize_url,
            token_url,
            userinfo_url,
            http,
        })
    }
}

#[async_trait]
impl OAuthProvider for FacebookProvider {
    fn provider(&self) -> Provider {
        Provider::Facebook
    }

    fn authorization_url(&self, state: &str, code_challenge: Option<&str>) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.app_id)
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
            ("client_id", self.app_id.as_str()),
            ("client_secret", self.app_secret.as_str()),
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
            warn!("facebook token endpoint rejected the exchange: {status}");
            return Err(ProtocolError::Exchange(format!("token endpoint returned {status}")).into());
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProtocolError::Exchange(format!("malformed token response: {e}")))?;

        let response = self
            .http
            .get(&self.userinfo_url)
            .query(&[("fields", USERINFO_FIELDS)])
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
            warn!("facebook profile endpoint rejected the request: {status}");
            return Err(ProtocolError::UserInfo(format!("userinfo endpoint returned {status}")).into());
        }

        let user: FacebookUser = response
            .json()
            .await
            .map_err(|e| ProtocolError::UserInfo(format!("malformed userinfo response: {e}")))?;

        Ok(ProviderProfile {
            provider: Provider::Facebook,
            provider_id: user.id,
            handle: None,
            display_name: user.name,
            email: user.email,
            avatar: user.picture.map(|p| p.data.url),
        })
    }
}
