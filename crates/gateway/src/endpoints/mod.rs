//! # Gatewayエンドポイント

pub mod auth;
pub mod health;
pub mod not_found;

pub use auth::handle_auth;
pub use health::handle_health;
pub use not_found::handle_not_found;
