//! JWT bearer token validation
//!
//! Security notes:
//! - Tokens are signed with HS256 (HMAC-SHA256)
//! - The audience is checked only when one is configured
//! - In production, JWT_SECRET should be a strong random value from environment

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::PlanError;

/// Payload stored in JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Caller identifier
    pub sub: String,
    /// Intended audience
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Identity of an authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub subject: String,
}

/// JWT validator and generator
#[derive(Clone)]
pub struct JwtValidator {
    secret: String,
    audience: Option<String>,
}

impl JwtValidator {
    /// Create a new JWT validator
    pub fn new(secret: String, audience: Option<String>) -> Result<Self, PlanError> {
        if secret.is_empty() {
            return Err(PlanError::Config("JWT secret must not be empty".into()));
        }
        Ok(Self { secret, audience })
    }

    /// Issue a token for `subject` valid for `ttl_seconds`
    pub fn generate_token(&self, subject: &str, ttl_seconds: u64) -> Result<String, PlanError> {
        let now = now_secs()?;
        let claims = Claims {
            sub: subject.to_string(),
            aud: self.audience.clone(),
            iat: now,
            exp: now + ttl_seconds,
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| PlanError::Internal(format!("Failed to generate token: {}", e)))
    }

    /// Verify a token and return the caller it names
    pub fn verify(&self, token: &str) -> Result<CallerIdentity, PlanError> {
        let mut validation = Validation::new(Algorithm::HS256);
        match &self.audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|err| {
            use jsonwebtoken::errors::ErrorKind;
            let msg = match err.kind() {
                ErrorKind::ExpiredSignature => "Token expired",
                ErrorKind::InvalidSignature => "Invalid signature",
                ErrorKind::InvalidAudience => "Invalid audience",
                ErrorKind::InvalidToken => "Invalid token",
                _ => "Token validation failed",
            };
            PlanError::Unauthorized(msg.into())
        })?;

        Ok(CallerIdentity {
            subject: data.claims.sub,
        })
    }
}

fn now_secs() -> Result<u64, PlanError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| PlanError::Internal(format!("System time error: {}", e)))
}

/// Extract token from an `Authorization: Bearer <token>` header
pub fn extract_token_from_header(auth_header: Option<&str>) -> Option<&str> {
    let token = auth_header?.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-that-is-at-least-32-characters-long";

    #[test]
    fn test_generate_and_verify_token() {
        let validator = JwtValidator::new(SECRET.into(), None).unwrap();
        let token = validator.generate_token("client-1", 3600).unwrap();

        let caller = validator.verify(&token).unwrap();
        assert_eq!(caller.subject, "client-1");
    }

    #[test]
    fn test_invalid_token() {
        let validator = JwtValidator::new(SECRET.into(), None).unwrap();
        let err = validator.verify("invalid-token").unwrap_err();
        assert!(matches!(err, PlanError::Unauthorized(_)));
    }

    #[test]
    fn test_wrong_secret() {
        let issuer = JwtValidator::new(SECRET.into(), None).unwrap();
        let other =
            JwtValidator::new("different-secret-that-is-at-least-32-characters".into(), None)
                .unwrap();

        let token = issuer.generate_token("client-1", 3600).unwrap();
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn test_audience_enforced_when_configured() {
        let issuer = JwtValidator::new(SECRET.into(), Some("plans-api".into())).unwrap();
        let token = issuer.generate_token("client-1", 3600).unwrap();
        assert!(issuer.verify(&token).is_ok());

        let elsewhere = JwtValidator::new(SECRET.into(), Some("billing".into())).unwrap();
        assert!(elsewhere.verify(&token).is_err());

        // No configured audience accepts any.
        let lenient = JwtValidator::new(SECRET.into(), None).unwrap();
        assert!(lenient.verify(&token).is_ok());
    }

    #[test]
    fn test_expired_token_rejected() {
        let validator = JwtValidator::new(SECRET.into(), None).unwrap();
        let claims = Claims {
            sub: "client-1".into(),
            aud: None,
            iat: 1,
            exp: 2,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(validator.verify(&token).is_err());
    }

    #[test]
    fn test_extract_token_from_header() {
        assert_eq!(extract_token_from_header(Some("Bearer abc123")), Some("abc123"));
        assert_eq!(extract_token_from_header(None), None);
        assert_eq!(extract_token_from_header(Some("Bearer ")), None);
        assert_eq!(extract_token_from_header(Some("Basic abc123")), None);
        assert_eq!(extract_token_from_header(Some("abc123")), None);
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(JwtValidator::new(String::new(), None).is_err());
    }
}
