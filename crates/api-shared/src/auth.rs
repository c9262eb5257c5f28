//! Bearer-token authentication and role checks.
//!
//! Tokens are HS256 JWTs carrying the user id (`sub`) and a [`Role`]. Handlers first
//! authenticate the token (401 on failure) and then call [`authorize`] with the roles allowed
//! for that endpoint (403 on failure).

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("role {0} is not permitted")]
    Forbidden(Role),
    #[error("failed to sign token: {0}")]
    Signing(String),
}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Patient,
    Doctor,
    Admin,
}

impl Role {
    /// Every role; for endpoints any authenticated user may call.
    pub const ANY: &'static [Role] = &[Role::Patient, Role::Doctor, Role::Admin];
    /// Clinical staff.
    pub const STAFF: &'static [Role] = &[Role::Doctor, Role::Admin];
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Admin => "admin",
        })
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Signing and verification keys derived from a shared secret.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    pub fn issue(&self, subject: &str, role: Role, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value. The scheme is
/// matched case-insensitively.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    header
        .and_then(|h| h.split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)
}

/// Checks the caller's role against the roles allowed for an endpoint.
pub fn authorize(claims: &Claims, allowed: &[Role]) -> Result<(), AuthError> {
    if allowed.contains(&claims.role) {
        Ok(())
    } else {
        Err(AuthError::Forbidden(claims.role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> JwtKeys {
        JwtKeys::from_secret(b"test-secret")
    }

    #[test]
    fn issued_token_verifies_with_same_secret() {
        let token = keys().issue("42", Role::Doctor, Duration::hours(1)).unwrap();
        let claims = keys().verify(&token).expect("token should verify");

        assert_eq!(claims.sub, "42");
        assert_eq!(claims.role, Role::Doctor);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = JwtKeys::from_secret(b"other")
            .issue("42", Role::Admin, Duration::hours(1))
            .unwrap();
        assert!(matches!(keys().verify(&token), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = keys().issue("42", Role::Admin, Duration::hours(-2)).unwrap();
        assert!(matches!(keys().verify(&token), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn bearer_token_requires_scheme_and_value() {
        assert_eq!(bearer_token(Some("Bearer abc")), Ok("abc"));
        assert_eq!(bearer_token(Some("bearer abc")), Ok("abc"));
        assert_eq!(bearer_token(Some("BEARER abc")), Ok("abc"));
        assert_eq!(bearer_token(Some("Basic abc")), Err(AuthError::MissingToken));
        assert_eq!(bearer_token(Some("Bearer ")), Err(AuthError::MissingToken));
        assert_eq!(bearer_token(None), Err(AuthError::MissingToken));
    }

    #[test]
    fn authorize_checks_allowed_roles() {
        let patient = Claims {
            sub: "1".into(),
            role: Role::Patient,
            iat: 0,
            exp: 0,
        };
        assert_eq!(authorize(&patient, Role::ANY), Ok(()));
        assert_eq!(
            authorize(&patient, Role::STAFF),
            Err(AuthError::Forbidden(Role::Patient))
        );
    }

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("Doctor".parse::<Role>(), Ok(Role::Doctor));
        assert!("nurse".parse::<Role>().is_err());
    }
}
