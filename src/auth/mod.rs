//! Users, sessions and the extractors that guard the API.

pub mod db;
pub mod handlers;
pub mod middleware;
pub mod password;

pub use handlers::bootstrap_admin;
pub use middleware::{AdminContext, AuthContext, SESSION_COOKIE_NAME};
