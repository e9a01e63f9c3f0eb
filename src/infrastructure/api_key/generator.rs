//! API key secret generation
//!
//! Secrets are a recognizable fixed prefix plus 32 bytes (256 bits) of
//! CSPRNG output, URL-safe base64 encoded. Generation is pure; hashing and
//! persistence happen elsewhere.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;

/// Number of random bytes behind each secret
const SECRET_BYTES: usize = 32;

/// Generator for opaque API key secrets
#[derive(Debug, Clone)]
pub struct SecretGenerator {
    /// Fixed prefix for all secrets (e.g. "wk_live_", "wk_test_")
    prefix: String,
}

impl SecretGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Generator for production secrets
    pub fn production() -> Self {
        Self::new("wk_live_")
    }

    /// Generator for test secrets
    pub fn test() -> Self {
        Self::new("wk_test_")
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Produce a new secret string
    pub fn generate(&self) -> String {
        let mut random_bytes = [0u8; SECRET_BYTES];
        rand::thread_rng().fill_bytes(&mut random_bytes);

        format!("{}{}", self.prefix, URL_SAFE_NO_PAD.encode(random_bytes))
    }

    /// Cheap short-circuit used before any hash comparison: a presented
    /// secret without the expected prefix can never match a stored key.
    pub fn has_expected_prefix(&self, secret: &str) -> bool {
        secret.starts_with(&self.prefix) && secret.len() > self.prefix.len()
    }
}

impl Default for SecretGenerator {
    fn default() -> Self {
        Self::production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_has_prefix() {
        let generator = SecretGenerator::production();
        let secret = generator.generate();

        assert!(secret.starts_with("wk_live_"));
        // 32 bytes base64url-encoded = 43 chars, plus prefix
        assert_eq!(secret.len(), "wk_live_".len() + 43);
    }

    #[test]
    fn test_generate_test_prefix() {
        let generator = SecretGenerator::test();
        assert!(generator.generate().starts_with("wk_test_"));
    }

    #[test]
    fn test_secrets_are_unique() {
        let generator = SecretGenerator::production();
        assert_ne!(generator.generate(), generator.generate());
    }

    #[test]
    fn test_has_expected_prefix() {
        let generator = SecretGenerator::production();
        let secret = generator.generate();

        assert!(generator.has_expected_prefix(&secret));
        assert!(!generator.has_expected_prefix("wk_test_abc"));
        assert!(!generator.has_expected_prefix("sk-something-else"));
        // Bare prefix with no body does not count
        assert!(!generator.has_expected_prefix("wk_live_"));
    }

    #[test]
    fn test_custom_prefix() {
        let generator = SecretGenerator::new("wk_ci_");
        assert!(generator.generate().starts_with("wk_ci_"));
    }
}
