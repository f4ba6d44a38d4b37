//! Flow orchestration for lockside.
//!
//! Two flavours of the OAuth2 Authorization Code dance live here:
//!
//! - [`OAuth2Flow`]: the uniform delegated strategy. One instance per
//!   registered provider; the route orchestrator drives it through the
//!   type-erased `DelegatedFlow` trait.
//! - [`PkceHandshake`]: the hand-rolled Authorization Code + PKCE engine used
//!   for Twitter, where the exchange is performed directly against the
//!   provider's token and userinfo endpoints.

pub mod oauth2;
pub mod pkce;

pub use oauth2::OAuth2Flow;
pub use pkce::{PkceConfig, PkceHandshake};
