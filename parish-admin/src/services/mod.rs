pub mod ancillary;
pub mod bootstrap;
pub mod credential_store;
pub mod database;
pub mod identity;
pub mod metrics;
pub mod resolver;
pub mod role_directory;

pub use ancillary::{AncillaryApi, AncillaryError, HomilyApiClient};
pub use bootstrap::{SessionBootstrapper, SessionState};
pub use credential_store::{CredentialStore, MemoryCredentialStore, SessionCredentialStore};
pub use database::PgRoleDirectory;
pub use identity::{GoTrueClient, IdentityProvider, ProviderError, SignUpOutcome};
pub use resolver::RoleResolver;
pub use role_directory::{
    DirectoryError, GrantOutcome, MemoryRoleDirectory, RevokeOutcome, RoleDirectory,
};
