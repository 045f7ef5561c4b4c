use crate::error::AppError;

use super::{Principal, Role};

/// Read-only authorization state derived from the resolved principal.
///
/// The default value is unauthenticated, which is also what callers must use
/// while a session is still being resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationContext {
    principal: Option<Principal>,
}

impl AuthorizationContext {
    pub fn new(principal: Option<Principal>) -> Self {
        Self { principal }
    }

    pub fn unauthenticated() -> Self {
        Self::default()
    }

    pub fn authenticated(principal: impl Into<Principal>) -> Self {
        Self {
            principal: Some(principal.into()),
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.principal
            .as_ref()
            .is_some_and(|p| p.holds(Role::Admin))
    }

    pub fn is_editor(&self) -> bool {
        self.is_admin()
            || self
                .principal
                .as_ref()
                .is_some_and(|p| p.holds(Role::Editor))
    }

    pub fn has_role(&self, role: Role) -> bool {
        match role {
            Role::Admin => self.is_admin(),
            Role::Editor => self.is_editor(),
        }
    }

    pub fn require_authenticated(&self) -> Result<&Principal, AppError> {
        self.principal
            .as_ref()
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Authentication required")))
    }

    pub fn require_role(&self, role: Role) -> Result<&Principal, AppError> {
        let principal = self.require_authenticated()?;
        if self.has_role(role) {
            Ok(principal)
        } else {
            tracing::warn!(
                principal_id = %principal.id(),
                scheme = ?principal.scheme(),
                required = %role,
                "Insufficient role"
            );
            Err(AppError::Forbidden(anyhow::anyhow!("Insufficient permissions")))
        }
    }

    pub fn require_editor(&self) -> Result<&Principal, AppError> {
        self.require_role(Role::Editor)
    }

    pub fn require_admin(&self) -> Result<&Principal, AppError> {
        self.require_role(Role::Admin)
    }
}
