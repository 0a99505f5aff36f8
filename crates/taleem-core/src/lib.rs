//! Taleem Edge core library.
//!
//! The authenticated API client shared by every Taleem Edge front-end:
//! bearer token attachment, one-shot silent refresh on 401, persisted
//! session credentials and the login/signup flows that create them.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError, ApiRequest, ApiResponse};
pub use auth::{AuthService, Session, SessionStore, StoreKey};
pub use config::{ApiConfig, Config, Environment};

// HTTP types (`Method`, `StatusCode`, headers) appear in the public API
pub use reqwest;
