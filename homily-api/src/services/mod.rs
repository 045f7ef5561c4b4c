pub mod auth;
pub mod bootstrap;
pub mod database;
pub mod error;
pub mod homilies;
pub mod jwt;
pub mod memory;
pub mod metrics;
pub mod store;
pub mod users;

pub use auth::AuthService;
pub use bootstrap::{ensure_admin, BootstrapOutcome};
pub use database::Database;
pub use error::ServiceError;
pub use homilies::HomilyService;
pub use jwt::{BearerClaims, IssuedToken, JwtService};
pub use memory::MemoryStore;
pub use store::{HomilyStore, UserStore};
pub use users::UserService;
