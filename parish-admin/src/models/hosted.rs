use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use service_core::authz::Role;
use std::collections::BTreeSet;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: String,
}

/// Session issued by the hosted provider. Stored verbatim in the hosted
/// credential slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix timestamp.
    pub expires_at: i64,
    pub user: HostedUser,
}

/// One hosted identity with its resolved roles, as listed for admins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalRoles {
    pub id: Uuid,
    pub email: String,
    pub roles: BTreeSet<Role>,
    pub created_at: Option<DateTime<Utc>>,
}

impl PrincipalRoles {
    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }

    pub fn is_editor(&self) -> bool {
        self.roles.contains(&Role::Editor)
    }

    pub fn role_list(&self) -> String {
        if self.roles.is_empty() {
            return "none".to_string();
        }
        self.roles
            .iter()
            .map(Role::as_hosted_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}
