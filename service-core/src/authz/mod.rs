//! Authorization model shared by every protected surface.
//!
//! Two identity schemes exist side by side: the hosted identity provider
//! (roles come from the role-assignment relation) and the self-issued bearer
//! tokens of the homily API (role fixed in the signed claim). Both resolve to
//! a [`Principal`], and every authorization decision goes through an
//! [`AuthorizationContext`] built from it.

mod context;
mod principal;
mod role;

pub use context::AuthorizationContext;
pub use principal::{BearerPrincipal, HostedPrincipal, Principal, Scheme};
pub use role::{ParseRoleError, Role};
