//! # adpool-auth
//!
//! Credential checks for the trigger surface: administrator JWTs, the
//! pre-shared system secret, and a fixed-window rate limiter shared
//! across processes through the cache provider.

pub mod jwt;
pub mod limiter;
pub mod system;

pub use jwt::{Claims, JwtDecoder};
#[cfg(any(test, feature = "test-support"))]
pub use jwt::JwtEncoder;
pub use limiter::{RateDecision, RateLimiter};
pub use system::SystemSecret;
