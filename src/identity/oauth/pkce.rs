use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};

const VERIFIER_LENGTH: usize = 96;
const VERIFIER_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// PKCE verifier/challenge pair bound to a single authorization attempt.
///
/// The verifier stays in client-scoped storage until the matching callback;
/// only the S256 challenge travels in the authorization URL.
#[derive(Debug, Clone)]
pub struct PkcePair {
    verifier: String,
    challenge: String,
}

impl PkcePair {
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let verifier: String = (0..VERIFIER_LENGTH)
            .map(|_| VERIFIER_CHARSET[rng.gen_range(0..VERIFIER_CHARSET.len())] as char)
            .collect();
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));

        Self {
            verifier,
            challenge,
        }
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    pub fn method(&self) -> &'static str {
        "S256"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifier_is_within_rfc_bounds() {
        let pair = PkcePair::generate();
        assert!(pair.verifier().len() >= 43 && pair.verifier().len() <= 128);
        assert!(pair
            .verifier()
            .bytes()
            .all(|byte| VERIFIER_CHARSET.contains(&byte)));
        assert_eq!(pair.method(), "S256");
    }

    #[test]
    fn challenge_is_sha256_of_verifier() {
        let pair = PkcePair::generate();
        let expected = URL_SAFE_NO_PAD.encode(Sha256::digest(pair.verifier().as_bytes()));
        assert_eq!(pair.challenge(), expected);
    }

    #[test]
    fn pairs_are_unique_per_attempt() {
        assert_ne!(PkcePair::generate().verifier(), PkcePair::generate().verifier());
    }
}
