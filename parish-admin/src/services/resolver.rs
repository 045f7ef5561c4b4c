//! Turns a credential into a principal, one procedure per scheme.

use service_core::authz::{BearerPrincipal, HostedPrincipal};
use std::sync::Arc;

use super::ancillary::AncillaryApi;
use super::role_directory::RoleDirectory;
use crate::models::HostedUser;
use crate::utils::jwt::decode_unverified;

#[derive(Clone)]
pub struct RoleResolver {
    roles: Arc<dyn RoleDirectory>,
    ancillary: Arc<dyn AncillaryApi>,
}

impl RoleResolver {
    pub fn new(roles: Arc<dyn RoleDirectory>, ancillary: Arc<dyn AncillaryApi>) -> Self {
        Self { roles, ancillary }
    }

    /// Attach the role rows for an identity the provider already vouched for.
    ///
    /// Roles are queried on every call. A failed query yields an empty role
    /// set, which grants nothing.
    pub async fn resolve_hosted(&self, user: &HostedUser) -> HostedPrincipal {
        let roles = match self.roles.roles_for(user.id).await {
            Ok(roles) => roles,
            Err(e) => {
                tracing::error!(user_id = %user.id, error = %e, "Role lookup failed, resolving without roles");
                Default::default()
            }
        };

        HostedPrincipal {
            id: user.id,
            email: user.email.clone(),
            roles,
        }
    }

    /// Principal for a homily API token, or `None` when the token is
    /// malformed or the server no longer accepts it.
    pub async fn resolve_ancillary(&self, token: &str) -> Option<BearerPrincipal> {
        let claims = match decode_unverified(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::warn!(error = %e, "Stored bearer token is malformed");
                return None;
            }
        };

        let user = match self.ancillary.me(token).await {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!(sub = %claims.sub, error = %e, "Bearer token not accepted by homily API");
                return None;
            }
        };

        if user.id.to_string() != claims.sub {
            tracing::warn!(sub = %claims.sub, user_id = %user.id, "Bearer token subject mismatch");
            return None;
        }

        Some(BearerPrincipal {
            id: claims.sub,
            email: claims.email,
            role: claims.role,
        })
    }
}
