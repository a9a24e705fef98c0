use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims encoded in a session token.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject: the user's id.
    pub sub: Uuid,
    /// The user's email at issuance.
    pub email: String,
    /// Issued at (seconds since epoch).
    pub iat: i64,
    /// Expiration (seconds since epoch).
    pub exp: i64,
}

impl Claims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or_default()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    /// Signature checks out but the token is past `exp`.
    #[error("token expired at {expired_at}")]
    Expired { expired_at: DateTime<Utc> },
    /// Malformed token or bad signature.
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Issues and verifies HS256 session tokens with a server-held secret.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Issues a token for `user_id` that expires after the configured ttl.
    pub fn issue(&self, user_id: Uuid, email: &str) -> Result<String, TokenError> {
        self.issue_with_ttl(user_id, email, self.ttl, Utc::now())
    }

    pub fn issue_with_ttl(
        &self,
        user_id: Uuid,
        email: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verifies the signature, then checks expiry against `now` without leeway: the
    /// token is valid up to and including its `exp` second.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();
        // Expiry is checked below so the expiry instant can be reported back.
        validation.validate_exp = false;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| TokenError::Invalid(e.to_string()))?;

        if now.timestamp() > claims.exp {
            return Err(TokenError::Expired {
                expired_at: claims.expires_at(),
            });
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn service() -> TokenService {
        TokenService::new("test_secret_for_gen_verify", Duration::hours(24))
    }

    #[test]
    fn test_token_generation_and_verification() {
        let tokens = service();
        let user_id = Uuid::new_v4();
        let token = tokens.issue(user_id, "a@example.com").unwrap();
        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "a@example.com");
        assert_eq!(claims.exp - claims.iat, 24 * 60 * 60);
    }

    #[test]
    fn test_token_valid_until_expiry_instant() {
        let tokens = service();
        let issued = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let token = tokens
            .issue_with_ttl(Uuid::new_v4(), "a@example.com", Duration::hours(24), issued)
            .unwrap();
        let expiry = issued + Duration::hours(24);

        assert!(tokens.verify_at(&token, issued).is_ok());
        assert!(tokens.verify_at(&token, expiry).is_ok());
        assert_eq!(
            tokens.verify_at(&token, expiry + Duration::seconds(1)),
            Err(TokenError::Expired { expired_at: expiry })
        );
    }

    #[test]
    fn test_expired_token_reports_expiry() {
        let tokens = service();
        let issued = Utc::now() - Duration::hours(26);
        let token = tokens
            .issue_with_ttl(Uuid::new_v4(), "old@example.com", Duration::hours(24), issued)
            .unwrap();

        match tokens.verify(&token) {
            Err(TokenError::Expired { expired_at }) => {
                assert_eq!(expired_at.timestamp(), (issued + Duration::hours(24)).timestamp());
            }
            other => panic!("expected expiry, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_token_signature() {
        let token = service().issue(Uuid::new_v4(), "a@example.com").unwrap();
        let other = TokenService::new("a_completely_different_secret", Duration::hours(24));

        match other.verify(&token) {
            Err(TokenError::Invalid(msg)) => assert!(msg.contains("InvalidSignature")),
            other => panic!("expected signature failure, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_token() {
        assert!(matches!(
            service().verify("not-a-jwt"),
            Err(TokenError::Invalid(_))
        ));
    }
}
