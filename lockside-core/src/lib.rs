//! # Lockside Core
//!
//! `lockside-core` provides the foundational traits and types for the lockside
//! authentication stack: the persisted [`User`](user::User) identity model, the
//! error taxonomy shared by every crate, PKCE utilities, and the seam traits
//! that the provider crates and the route orchestrator meet at.

#![warn(missing_docs)]

use async_trait::async_trait;

/// PKCE (Proof Key for Code Exchange) utilities.
pub mod pkce;

/// Errors that can occur during the authentication process.
pub mod error;
use crate::error::AuthError;

/// The persisted user identity and its projections.
pub mod user;
use crate::user::{Provider, ProviderProfile};

use crate::pkce::Pkce;

/// Trait for an OAuth2-compatible provider.
///
/// One implementation per upstream provider; each knows its own endpoints and
/// default scopes and maps the provider's userinfo payload into a
/// [`ProviderProfile`].
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Which provider this implementation talks to.
    fn provider(&self) -> Provider;

    /// Build the authorization URL embedding `state` and, when the flow uses
    /// PKCE, the code challenge.
    fn authorization_url(&self, state: &str, code_challenge: Option<&str>) -> String;

    /// Exchange an authorization code (plus PKCE verifier, when used) for the
    /// provider's view of the user.
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<ProviderProfile, AuthError>;
}

/// A type-erased delegated authentication flow.
///
/// The route orchestrator dispatches on this interface instead of matching on
/// provider name strings: every delegated provider (Google, Facebook, the
/// Twitter legacy fallback) registers one of these.
#[async_trait]
pub trait DelegatedFlow: Send + Sync {
    /// Which provider the flow authenticates against.
    fn provider(&self) -> Provider;

    /// Begin the flow: returns the authorization URL to redirect the browser
    /// to, the anti-forgery state embedded in it, and the PKCE pair whose
    /// verifier the caller must hold on to until the callback.
    fn initiate(&self) -> (String, String, Pkce);

    /// Complete the flow by exchanging the callback's code.
    ///
    /// `received_state` must exactly equal `expected_state` or the exchange is
    /// refused before any network I/O happens.
    async fn finalize(
        &self,
        code: &str,
        received_state: &str,
        expected_state: &str,
        code_verifier: &str,
    ) -> Result<ProviderProfile, AuthError>;
}
