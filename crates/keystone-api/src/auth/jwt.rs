//! JWT token generation and validation
//!
//! Implements stateless bearer tokens with HMAC-SHA256 signing. A token is
//! valid only while its signature verifies against the configured secret and
//! the current time is strictly before its expiry. There is no server-side
//! revocation: logout and password changes leave outstanding tokens valid
//! until they expire.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use keystone_core::{AuthConfig, Role};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

/// Identity carried by a token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub subject: Uuid,
    pub email: String,
    pub role: Role,
}

/// JWT Claims structure as encoded on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Token issuer
    pub iss: String,
    /// Subject - account ID
    pub sub: String,
    /// Issued at timestamp (Unix epoch)
    pub iat: u64,
    /// Expiration timestamp (Unix epoch)
    pub exp: u64,
    /// Account email address
    pub email: String,
    /// Account role at issue time
    pub role: Role,
}

impl Claims {
    /// Subject as an account id, if it parses
    pub fn subject(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }

    /// Identity payload, if the subject is well-formed
    pub fn identity(&self) -> Option<TokenClaims> {
        Some(TokenClaims {
            subject: self.subject()?,
            email: self.email.clone(),
            role: self.role,
        })
    }
}

/// JWT token errors
///
/// Verification failures collapse into a single
/// [`TokenError::Invalid`]: callers cannot tell a bad signature from an
/// expired or malformed token.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Failed to encode JWT: {0}")]
    Encoding(String),

    #[error("Invalid token")]
    Invalid,
}

fn now_secs() -> Result<u64, TokenError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| TokenError::Encoding(e.to_string()))
}

/// Sign a claims payload that expires `ttl` from now
pub fn issue_token(
    claims: &TokenClaims,
    secret: &str,
    ttl: Duration,
    issuer: &str,
) -> Result<String, TokenError> {
    let now = now_secs()?;

    let claims = Claims {
        iss: issuer.to_string(),
        sub: claims.subject.to_string(),
        iat: now,
        exp: now.saturating_add(ttl.as_secs()),
        email: claims.email.clone(),
        role: claims.role,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| TokenError::Encoding(e.to_string()))
}

/// Check structure, signature, issuer and expiry of a token
pub fn verify_token(token: &str, secret: &str, issuer: &str) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[issuer]);
    validation.set_required_spec_claims(&["exp", "iss", "sub"]);
    validation.leeway = 0;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!(reason = ?e.kind(), "Token rejected");
        TokenError::Invalid
    })?;

    // The library accepts exp == now; expiry here is strict
    if token_data.claims.exp <= now_secs().map_err(|_| TokenError::Invalid)? {
        tracing::debug!(reason = "expired", "Token rejected");
        return Err(TokenError::Invalid);
    }

    Ok(token_data.claims)
}

/// Token issuance and verification bound to the process-wide configuration
#[derive(Clone)]
pub struct TokenService {
    secret: String,
    ttl: Duration,
    issuer: String,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl", &self.ttl)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            secret: config.jwt_secret.clone(),
            ttl: Duration::from_secs(config.token_ttl_secs),
            issuer: config.issuer.clone(),
        }
    }

    /// Configured token lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        self.issue_with_ttl(claims, self.ttl)
    }

    pub fn issue_with_ttl(&self, claims: &TokenClaims, ttl: Duration) -> Result<String, TokenError> {
        issue_token(claims, &self.secret, ttl, &self.issuer)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        verify_token(token, &self.secret, &self.issuer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL_SAFE_ALPHABET: &[u8] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

    fn service() -> TokenService {
        TokenService::new(&AuthConfig::default())
    }

    fn claims(role: Role) -> TokenClaims {
        TokenClaims {
            subject: Uuid::new_v4(),
            email: "test@example.com".to_string(),
            role,
        }
    }

    /// Flip the most significant bit of the 6-bit value behind one character
    fn flip_char(c: u8) -> u8 {
        let index = URL_SAFE_ALPHABET
            .iter()
            .position(|&a| a == c)
            .expect("base64url character");
        URL_SAFE_ALPHABET[index ^ 32]
    }

    #[test]
    fn test_issue_and_verify_round_trip() {
        let service = service();
        let original = claims(Role::Admin);

        let token = service.issue(&original).expect("Failed to generate token");
        let decoded = service.verify(&token).expect("Failed to validate token");

        assert_eq!(decoded.identity(), Some(original));
        assert_eq!(decoded.iss, "keystone");
        assert_eq!(decoded.exp - decoded.iat, 7 * 24 * 60 * 60);
    }

    #[test]
    fn test_zero_ttl_is_expired() {
        let service = service();
        let token = service
            .issue_with_ttl(&claims(Role::User), Duration::ZERO)
            .unwrap();
        assert!(matches!(service.verify(&token), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_expired_token() {
        let config = AuthConfig::default();
        let now = now_secs().unwrap();

        // Create a token that expired 1 hour ago
        let expired = Claims {
            iss: config.issuer.clone(),
            sub: Uuid::new_v4().to_string(),
            iat: now - 7200,
            exp: now - 3600,
            email: "test@example.com".to_string(),
            role: Role::User,
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &expired,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .unwrap();

        let result = TokenService::new(&config).verify(&token);
        assert!(matches!(result, Err(TokenError::Invalid)));
    }

    #[test]
    fn test_wrong_secret() {
        let config1 = AuthConfig {
            jwt_secret: "secret1".to_string(),
            ..Default::default()
        };
        let config2 = AuthConfig {
            jwt_secret: "secret2".to_string(),
            ..Default::default()
        };

        let token = TokenService::new(&config1)
            .issue(&claims(Role::User))
            .unwrap();

        let result = TokenService::new(&config2).verify(&token);
        assert!(matches!(result, Err(TokenError::Invalid)));
    }

    #[test]
    fn test_wrong_issuer() {
        let other = AuthConfig {
            issuer: "someone-else".to_string(),
            ..Default::default()
        };
        let token = TokenService::new(&other).issue(&claims(Role::User)).unwrap();
        assert!(service().verify(&token).is_err());
    }

    #[test]
    fn test_malformed_token() {
        let service = service();
        for token in ["", "invalid.token.here", "a.b", "not-a-jwt"] {
            assert!(
                matches!(service.verify(token), Err(TokenError::Invalid)),
                "accepted {token:?}"
            );
        }
    }

    #[test]
    fn test_any_tampered_character_fails() {
        let service = service();
        let token = service.issue(&claims(Role::User)).unwrap();
        let bytes = token.as_bytes();

        for i in 0..bytes.len() {
            if bytes[i] == b'.' {
                continue;
            }
            let mut tampered = bytes.to_vec();
            tampered[i] = flip_char(bytes[i]);
            let tampered = String::from_utf8(tampered).unwrap();
            assert!(
                service.verify(&tampered).is_err(),
                "tampered token accepted at position {i}"
            );
        }
    }

    #[test]
    fn test_role_escalation_in_payload_fails() {
        let service = service();
        let token = service.issue(&claims(Role::User)).unwrap();
        let forged_payload = {
            let parts: Vec<&str> = token.split('.').collect();
            let other = service.issue(&claims(Role::Admin)).unwrap();
            let other_payload = other.split('.').nth(1).unwrap().to_string();
            format!("{}.{}.{}", parts[0], other_payload, parts[2])
        };
        assert!(service.verify(&forged_payload).is_err());
    }

    #[test]
    fn test_debug_hides_secret() {
        let debug = format!("{:?}", service());
        assert!(!debug.contains(keystone_core::config::DEVELOPMENT_SECRET));
    }
}
