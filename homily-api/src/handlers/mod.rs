pub mod auth;
pub mod homilies;
pub mod metrics;
pub mod users;
