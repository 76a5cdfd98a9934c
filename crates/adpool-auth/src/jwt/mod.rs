//! HS256 administrator tokens.

mod claims;
mod decoder;
#[cfg(any(test, feature = "test-support"))]
mod encoder;

pub use claims::Claims;
pub use decoder::JwtDecoder;
#[cfg(any(test, feature = "test-support"))]
pub use encoder::JwtEncoder;
