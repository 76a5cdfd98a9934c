//! Pre-shared secret presented by schedulers.

use adpool_core::config::auth::AuthConfig;

/// Checks the `X-System-Secret` header value.
#[derive(Clone)]
pub struct SystemSecret {
    secret: Option<Vec<u8>>,
}

impl std::fmt::Debug for SystemSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemSecret")
            .field("configured", &self.secret.is_some())
            .finish()
    }
}

impl SystemSecret {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            secret: config
                .system_secret
                .as_ref()
                .filter(|s| !s.is_empty())
                .map(|s| s.as_bytes().to_vec()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    /// Compare without short-circuiting on the first differing byte.
    /// Always false when no secret is configured.
    pub fn verify(&self, presented: &str) -> bool {
        let Some(expected) = &self.secret else {
            return false;
        };
        let presented = presented.as_bytes();
        if presented.len() != expected.len() {
            return false;
        }
        presented
            .iter()
            .zip(expected.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}
