//! Authentication module for managing session credentials.
//!
//! This module provides:
//! - `SessionStore`: the injectable key-value store behind `access_token`,
//!   `refresh_token` and `user_data`, with memory, file and keychain backends
//! - `Session`: typed access to the stored credentials and profile
//! - `AuthService`: login, signup and logout against the backend

pub mod credentials;
pub mod service;
pub mod session;
pub mod store;

pub use credentials::KeyringStore;
pub use service::{AuthError, AuthService, LoginOutcome, SignupForm};
pub use session::Session;
pub use store::{FileStore, MemoryStore, SessionStore, StoreError, StoreKey};
