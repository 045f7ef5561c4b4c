pub mod auth;

pub use auth::{bearer_auth_middleware, require_admin, require_editor, AuthUser};
