use metrics::counter;
use secrecy::Secret;
use std::sync::Arc;

use super::{BearerClaims, JwtService, ServiceError, UserStore};
use crate::dtos::auth::{LoginRequest, LoginResponse};
use crate::models::UserSummary;
use crate::utils::{verify_against_dummy, verify_password};

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    jwt: JwtService,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, jwt: JwtService) -> Self {
        Self { users, jwt }
    }

    /// Exchange email and password for a bearer token.
    ///
    /// Unknown email and wrong password both yield `InvalidCredentials`.
    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse, ServiceError> {
        let password = Secret::new(req.password);

        let user = match self.users.find_by_email(&req.email).await? {
            Some(user) => user,
            None => {
                verify_against_dummy(&password);
                counter!("homily_login_attempts_total", "outcome" => "rejected").increment(1);
                tracing::info!("Login rejected");
                return Err(ServiceError::InvalidCredentials);
            }
        };

        if verify_password(&password, &user.password_hash).is_err() {
            counter!("homily_login_attempts_total", "outcome" => "rejected").increment(1);
            tracing::info!(user_id = %user.id, "Login rejected");
            return Err(ServiceError::InvalidCredentials);
        }

        let issued = self.jwt.issue_token(&user)?;
        counter!("homily_login_attempts_total", "outcome" => "accepted").increment(1);
        tracing::info!(user_id = %user.id, role = %user.role, "User logged in");

        Ok(LoginResponse {
            token: issued.token,
            user: user.summary(),
        })
    }

    /// The caller as described by its token; the stored record is not consulted.
    pub fn whoami(&self, claims: &BearerClaims) -> Result<UserSummary, ServiceError> {
        let id = claims
            .sub
            .parse()
            .map_err(|_| ServiceError::Internal(anyhow::anyhow!("token subject is not a uuid")))?;
        Ok(UserSummary {
            id,
            email: claims.email.clone(),
            role: claims.role,
        })
    }
}
