//! Bearer token issuance and verification (HS256)

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::MAX_TOKEN_TTL_HOURS;
use crate::error::ApiError;

/// Claims carried by every token
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: usize,
    /// Expiry (Unix timestamp)
    pub exp: usize,
}

/// Signs and checks tokens with the process-wide secret
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl: Duration::hours(ttl_hours.clamp(1, MAX_TOKEN_TTL_HOURS)),
        }
    }

    /// Issue a token for `subject`, valid for the configured lifetime
    pub fn issue(&self, subject: &str) -> Result<String, ApiError> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp() as usize,
            exp: (now + self.ttl).timestamp() as usize,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))
    }

    /// Credential verification step of the request pipeline.
    ///
    /// Takes the raw `Authorization` header value and returns the subject id.
    /// The token is everything after the first space; the scheme keyword is
    /// not checked. No persistence access happens here.
    pub fn verify(&self, raw_header: Option<&str>) -> Result<String, ApiError> {
        let header = raw_header.ok_or(ApiError::MissingCredential)?;
        let token = header
            .split_once(' ')
            .map(|(_, token)| token)
            .ok_or(ApiError::InvalidCredential)?;

        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            tracing::debug!("Token rejected: {}", e);
            ApiError::InvalidCredential
        })?;
        Ok(data.claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("unit-test-secret", 24)
    }

    fn signed(secret: &str, sub: &str, exp_offset_secs: i64) -> String {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: sub.to_string(),
            iat: now as usize,
            exp: (now + exp_offset_secs) as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_issue_then_verify_returns_subject() {
        let tokens = service();
        let token = tokens.issue("u1").unwrap();
        let header = format!("Bearer {}", token);
        assert_eq!(tokens.verify(Some(&header)).unwrap(), "u1");
    }

    #[test]
    fn test_missing_header() {
        assert!(matches!(service().verify(None), Err(ApiError::MissingCredential)));
    }

    #[test]
    fn test_scheme_keyword_is_not_checked() {
        let tokens = service();
        let header = format!("Token {}", tokens.issue("u1").unwrap());
        assert_eq!(tokens.verify(Some(&header)).unwrap(), "u1");
    }

    #[test]
    fn test_header_without_space_is_invalid() {
        let tokens = service();
        let bare = tokens.issue("u1").unwrap();
        assert!(matches!(tokens.verify(Some(&bare)), Err(ApiError::InvalidCredential)));
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let header = format!("Bearer {}", signed("some-other-secret", "u1", 3600));
        assert!(matches!(
            service().verify(Some(&header)),
            Err(ApiError::InvalidCredential)
        ));
    }

    #[test]
    fn test_expired_is_invalid() {
        let header = format!("Bearer {}", signed("unit-test-secret", "u1", -60));
        assert!(matches!(
            service().verify(Some(&header)),
            Err(ApiError::InvalidCredential)
        ));
    }

    #[test]
    fn test_oversized_lifetime_is_capped() {
        let tokens = TokenService::new("unit-test-secret", i64::MAX);
        let header = format!("Bearer {}", tokens.issue("u1").unwrap());
        assert_eq!(tokens.verify(Some(&header)).unwrap(), "u1");
        assert_eq!(tokens.ttl, Duration::hours(MAX_TOKEN_TTL_HOURS));
    }

    #[test]
    fn test_malformed_is_invalid() {
        assert!(matches!(
            service().verify(Some("Bearer not.a.jwt")),
            Err(ApiError::InvalidCredential)
        ));
    }
}
