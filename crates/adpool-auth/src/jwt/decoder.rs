//! JWT token validation.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

use adpool_core::config::auth::AuthConfig;
use adpool_core::error::AppError;

use super::claims::Claims;

/// Validates administrator tokens.
#[derive(Clone)]
pub struct JwtDecoder {
    decoding_key: DecodingKey,
    validation: Validation,
    admin_role: String,
}

impl std::fmt::Debug for JwtDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtDecoder")
            .field("validation", &self.validation)
            .field("admin_role", &self.admin_role)
            .finish()
    }
}

impl JwtDecoder {
    /// Creates a new decoder from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 5; // seconds of clock skew
        if let Some(issuer) = &config.jwt_issuer {
            validation.set_issuer(&[issuer]);
        }

        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            admin_role: config.admin_role.clone(),
        }
    }

    /// Decode a token and require the administrator role.
    pub fn decode_admin(&self, token: &str) -> Result<Claims, AppError> {
        let claims = self.decode(token)?;
        if !claims.has_role(&self.admin_role) {
            return Err(AppError::authorization("Administrator role required"));
        }
        Ok(claims)
    }

    /// Decode and validate signature, expiry and issuer.
    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let token_data =
            decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        AppError::authentication("Token has expired")
                    }
                    jsonwebtoken::errors::ErrorKind::InvalidToken => {
                        AppError::authentication("Invalid token format")
                    }
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        AppError::authentication("Invalid token signature")
                    }
                    jsonwebtoken::errors::ErrorKind::InvalidIssuer => {
                        AppError::authentication("Invalid token issuer")
                    }
                    _ => AppError::authentication(format!("Token validation failed: {e}")),
                }
            })?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use adpool_core::error::ErrorKind;

    use super::*;
    use crate::jwt::JwtEncoder;

    fn config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret".into(),
            jwt_issuer: Some("adpool-tests".into()),
            ..AuthConfig::default()
        }
    }

    #[test]
    fn test_admin_token_round_trip() {
        let config = config();
        let token = JwtEncoder::new(&config)
            .issue("ops-1", "admin", Duration::minutes(5))
            .unwrap();
        let claims = JwtDecoder::new(&config).decode_admin(&token).unwrap();
        assert_eq!(claims.sub, "ops-1");
    }

    #[test]
    fn test_non_admin_role_is_forbidden() {
        let config = config();
        let token = JwtEncoder::new(&config)
            .issue("reseller-9", "reseller", Duration::minutes(5))
            .unwrap();
        let err = JwtDecoder::new(&config).decode_admin(&token).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authorization);
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let config = config();
        let token = JwtEncoder::new(&config)
            .issue("ops-1", "admin", Duration::minutes(-10))
            .unwrap();
        let err = JwtDecoder::new(&config).decode(&token).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = JwtEncoder::new(&config())
            .issue("ops-1", "admin", Duration::minutes(5))
            .unwrap();
        let other = AuthConfig {
            jwt_secret: "another-secret".into(),
            ..config()
        };
        let err = JwtDecoder::new(&other).decode(&token).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);
    }
}
