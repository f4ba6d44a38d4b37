use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// The challenge transform advertised to the provider.
pub const CHALLENGE_METHOD: &str = "S256";

/// A PKCE verifier/challenge pair.
///
/// The verifier stays with the initiating client; only the one-way challenge
/// travels through the browser, so an intercepted authorization code is
/// useless without the original secret.
#[derive(Debug, Clone)]
pub struct Pkce {
    /// High-entropy URL-safe secret, generated per handshake.
    pub code_verifier: String,
    /// `BASE64URL(SHA-256(code_verifier))`, sent with the authorization request.
    pub code_challenge: String,
}

impl Pkce {
    /// Generate a fresh pair from the OS RNG.
    pub fn new() -> Self {
        let code_verifier = random_token();
        let code_challenge = challenge_for(&code_verifier);
        Self {
            code_verifier,
            code_challenge,
        }
    }
}

impl Default for Pkce {
    fn default() -> Self {
        Self::new()
    }
}

/// 32 bytes from the OS RNG, URL-safe base64 without padding (43 chars).
///
/// Also used for the anti-forgery `state` token, which must be independent of
/// the verifier.
pub fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Derive the S256 code challenge for a verifier.
pub fn challenge_for(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
