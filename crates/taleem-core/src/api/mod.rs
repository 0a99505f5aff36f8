//! REST API client module for the Taleem Edge backend.
//!
//! This module provides the `ApiClient` every consumer uses instead of raw
//! HTTP. It attaches the stored bearer token to each request and silently
//! refreshes it once when the backend answers 401.
//!
//! The HTTP library sits behind the `Transport` trait; `ReqwestTransport`
//! is the production implementation.

pub mod client;
pub mod error;
pub mod request;
pub mod transport;

pub use client::{
    ApiClient, Attempt, LogListener, SessionListener, SessionState, LOGIN_PATH, REFRESH_PATH,
};
pub use error::{ApiError, TransportError};
pub use request::{ApiRequest, ApiResponse, FormPart, PartValue, RequestBody, ResponseKind};
pub use transport::{OutboundRequest, ReqwestTransport, Transport};
