//! Cache key builders for all AdPool cache entries.

/// Prefix applied to all AdPool cache keys.
const PREFIX: &str = "adpool";

/// Cache key for a fixed-window rate limit counter.
pub fn rate_limit(scope: &str, identifier: &str) -> String {
    format!("{PREFIX}:rate:{scope}:{identifier}")
}

/// Cache key for a lockout flag set once a counter overflows.
pub fn lockout(scope: &str, identifier: &str) -> String {
    format!("{PREFIX}:lockout:{scope}:{identifier}")
}
