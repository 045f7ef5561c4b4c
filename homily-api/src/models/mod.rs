mod homily;
mod user;

pub use homily::Homily;
pub use user::{normalize_email, ApiUser, UserRow, UserSummary};
