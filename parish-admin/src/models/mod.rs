mod ancillary;
mod hosted;

pub use ancillary::{AncillaryLogin, AncillaryUser, HomilySummary};
pub use hosted::{HostedSession, HostedUser, PrincipalRoles};
