use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::Role;

/// Which identity scheme vouched for a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Hosted,
    Bearer,
}

/// Identity from the hosted provider with its role assignments attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedPrincipal {
    pub id: Uuid,
    pub email: String,
    /// Union of the role-assignment rows for `id`. Empty means no elevated access.
    pub roles: BTreeSet<Role>,
}

/// Identity proven by a homily API bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BearerPrincipal {
    pub id: String,
    pub email: String,
    /// Role claimed at issuance. Not re-checked until the token expires.
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "lowercase")]
pub enum Principal {
    Hosted(HostedPrincipal),
    Bearer(BearerPrincipal),
}

impl Principal {
    pub fn scheme(&self) -> Scheme {
        match self {
            Principal::Hosted(_) => Scheme::Hosted,
            Principal::Bearer(_) => Scheme::Bearer,
        }
    }

    pub fn id(&self) -> String {
        match self {
            Principal::Hosted(p) => p.id.to_string(),
            Principal::Bearer(p) => p.id.clone(),
        }
    }

    pub fn email(&self) -> &str {
        match self {
            Principal::Hosted(p) => &p.email,
            Principal::Bearer(p) => &p.email,
        }
    }

    /// Exact role membership, without the admin-implies-editor rule.
    pub fn holds(&self, role: Role) -> bool {
        match self {
            Principal::Hosted(p) => p.roles.contains(&role),
            Principal::Bearer(p) => p.role == role,
        }
    }

    pub fn roles(&self) -> BTreeSet<Role> {
        match self {
            Principal::Hosted(p) => p.roles.clone(),
            Principal::Bearer(p) => BTreeSet::from([p.role]),
        }
    }
}

impl From<HostedPrincipal> for Principal {
    fn from(p: HostedPrincipal) -> Self {
        Principal::Hosted(p)
    }
}

impl From<BearerPrincipal> for Principal {
    fn from(p: BearerPrincipal) -> Self {
        Principal::Bearer(p)
    }
}
