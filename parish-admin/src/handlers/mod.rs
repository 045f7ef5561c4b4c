pub mod admin;
pub mod app;
pub mod auth;
pub mod metrics;
pub mod podcast;
