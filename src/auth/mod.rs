use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config;
use crate::types::Role;

/// Token claims. Tokens are issued by the identity provider or `hrctl token issue`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    pub organization_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<Uuid>,
    pub role: Role,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(
        user_id: Uuid,
        organization_id: Uuid,
        employee_id: Option<Uuid>,
        role: Role,
        permissions: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        let expiry_hours = config::config().security.jwt_expiry_hours;
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub: user_id,
            organization_id,
            employee_id,
            role,
            permissions,
            exp,
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug)]
pub enum JwtError {
    TokenGeneration(String),
    InvalidToken(String),
    InvalidSecret,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::TokenGeneration(msg) => write!(f, "JWT generation error: {}", msg),
            JwtError::InvalidToken(msg) => write!(f, "Invalid JWT token: {}", msg),
            JwtError::InvalidSecret => write!(f, "JWT secret not configured"),
        }
    }
}

impl std::error::Error for JwtError {}

pub fn generate_jwt(claims: &Claims) -> Result<String, JwtError> {
    generate_jwt_with_secret(claims, &config::config().security.jwt_secret)
}

pub fn generate_jwt_with_secret(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

/// Decode and verify an HS256 token, including expiry
pub fn validate_jwt(token: &str) -> Result<Claims, JwtError> {
    let secret = &config::config().security.jwt_secret;
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    decode::<Claims>(token, &decoding_key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| JwtError::InvalidToken(e.to_string()))
}

/// `granted` covers `required` when every `:`-separated segment matches or is `*`.
/// A trailing `*` segment covers all remaining segments.
pub fn permission_matches(granted: &str, required: &str) -> bool {
    let mut granted_parts = granted.split(':');
    let mut required_parts = required.split(':');
    loop {
        match (granted_parts.next(), required_parts.next()) {
            (None, None) => return true,
            (Some("*"), None) => return true,
            (Some("*"), Some(_)) => {
                // trailing wildcard
                if granted_parts.clone().next().is_none() {
                    return true;
                }
            }
            (Some(g), Some(r)) if g == r => {}
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_segments() {
        assert!(permission_matches("hris:employees:read", "hris:employees:read"));
        assert!(permission_matches("hris:*:read", "hris:employees:read"));
        assert!(permission_matches("hris:*", "hris:employees:delete"));
        assert!(permission_matches("*", "payroll:tax-rules:update"));
        assert!(!permission_matches("hris:employees:read", "hris:employees:update"));
        assert!(!permission_matches("hris:*:read", "payroll:employees:read"));
        assert!(!permission_matches("hris:employees", "hris:employees:read"));
    }

    #[test]
    fn round_trips_with_explicit_secret() {
        let claims = Claims::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            None,
            Role::Manager,
            vec!["hris:*:read".to_string()],
        );
        let token = generate_jwt_with_secret(&claims, "test-secret").unwrap();
        assert_eq!(token.split('.').count(), 3);
        assert!(matches!(generate_jwt_with_secret(&claims, ""), Err(JwtError::InvalidSecret)));
    }

    #[test]
    fn claims_without_optional_fields_deserialize() {
        let raw = serde_json::json!({
            "sub": Uuid::nil(),
            "organization_id": Uuid::nil(),
            "role": "employee",
            "exp": 1,
            "iat": 0
        });
        let claims: Claims = serde_json::from_value(raw).unwrap();
        assert!(claims.employee_id.is_none());
        assert!(claims.permissions.is_empty());
    }
}
