use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use service_core::authz::{BearerPrincipal, Role};
use uuid::Uuid;

use crate::config::{JwtConfig, MIN_JWT_SECRET_LEN};
use crate::models::ApiUser;

/// Issues and validates the API's HS256 bearer tokens.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry_hours: i64,
}

/// Claims embedded in a bearer token.
///
/// The role is captured at issuance and stays authoritative until `exp`,
/// even if the account's role changes in the meantime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BearerClaims {
    /// Subject (user ID)
    pub sub: String,
    pub email: String,
    pub role: Role,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub jti: String,
}

impl BearerClaims {
    pub fn principal(&self) -> BearerPrincipal {
        BearerPrincipal {
            id: self.sub.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Result<Self, anyhow::Error> {
        let secret = config.secret.expose_secret().as_bytes();
        if secret.len() < MIN_JWT_SECRET_LEN {
            return Err(anyhow::anyhow!(
                "JWT secret must be at least {} bytes",
                MIN_JWT_SECRET_LEN
            ));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            expiry_hours: config.expiry_hours,
        })
    }

    /// Issue a token for `user` valid for the configured lifetime.
    pub fn issue_token(&self, user: &ApiUser) -> Result<IssuedToken, anyhow::Error> {
        self.issue_token_at(user, Utc::now())
    }

    /// Issue a token as if it were `now`.
    pub fn issue_token_at(
        &self,
        user: &ApiUser,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, anyhow::Error> {
        let expires_at = now + Duration::hours(self.expiry_hours);

        let claims = BearerClaims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode bearer token: {}", e))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Check signature and expiry and return the claims.
    pub fn validate_token(
        &self,
        token: &str,
    ) -> Result<BearerClaims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode::<BearerClaims>(token, &self.decoding_key, &validation).map(|data| data.claims)
    }

    pub fn expiry_seconds(&self) -> i64 {
        self.expiry_hours * 3600
    }
}
