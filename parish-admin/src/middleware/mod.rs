pub mod auth;

pub use auth::{require_admin_page, require_dashboard_access, require_podcast_access};
