use async_trait::async_trait;
use lockside_core::error::{AuthError, ProtocolError};
use lockside_core::pkce::{self, Pkce};
use lockside_core::user::{Provider, ProviderProfile};
use lockside_core::{DelegatedFlow, OAuthProvider};
use log::debug;

/// Orchestrates the standard OAuth2 Authorization Code flow for one provider.
pub struct OAuth2Flow<P: OAuthProvider> {
    provider: P,
}

impl<P: OAuthProvider> OAuth2Flow<P> {
    /// Wrap a provider in the uniform flow.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Generate the redirect URL, CSRF state and PKCE pair.
    pub fn initiate_login(&self) -> (String, String, Pkce) {
        let state = pkce::random_token();
        let pkce = Pkce::new();
        let url = self
            .provider
            .authorization_url(&state, Some(&pkce.code_challenge));
        debug!("initiating {} login", self.provider.provider());
        (url, state, pkce)
    }

    /// Complete the flow by exchanging the code.
    ///
    /// The state comparison happens before any network I/O; a mismatch never
    /// reaches the token endpoint.
    pub async fn finalize_login(
        &self,
        code: &str,
        received_state: &str,
        expected_state: &str,
        code_verifier: &str,
    ) -> Result<ProviderProfile, AuthError> {
        if received_state != expected_state {
            return Err(ProtocolError::StateMismatch.into());
        }
        self.provider.exchange_code(code, Some(code_verifier)).await
    }
}

#[async_trait]
impl<P: OAuthProvider> DelegatedFlow for OAuth2Flow<P> {
    fn provider(&self) -> Provider {
        self.provider.provider()
    }

    fn initiate(&self) -> (String, String, Pkce) {
        self.initiate_login()
    }

    async fn finalize(
        &self,
        code: &str,
        received_state: &str,
        expected_state: &str,
        code_verifier: &str,
    ) -> Result<ProviderProfile, AuthError> {
        self.finalize_login(code, received_state, expected_state, code_verifier)
            .await
    }
}
