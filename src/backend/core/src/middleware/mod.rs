//! Request middleware for AssetDesk.
pub mod auth;

pub use auth::{AuthConfig, AuthError, AuthLayer, AuthService, Authenticator, Claims};
