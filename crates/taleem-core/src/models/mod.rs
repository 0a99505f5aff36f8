//! Data models for the Taleem Edge auth endpoints.
//!
//! - `User`, `Role`: the cached profile kept under `user_data`
//! - `TokenPair`, `AuthResponse`: login/register payloads
//! - `RefreshRequest`, `RefreshResponse`: token refresh payloads

pub mod user;

pub use user::{AuthResponse, RefreshRequest, RefreshResponse, Role, TokenPair, User};
