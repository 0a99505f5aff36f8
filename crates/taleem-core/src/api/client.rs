//! Authenticated API client for the Taleem Edge backend.
//!
//! Every call goes through three stages:
//!
//! 1. `authorize`: resolve the path and attach `Authorization: Bearer <token>`
//!    using the access token read from the store right before sending.
//! 2. `Transport::send`: the base HTTP call.
//! 3. `recover_unauthorized`: on a first-attempt 401, exchange the refresh
//!    token for a new access token and resend once. If the refresh fails the
//!    session is cleared and the login redirect fires.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auth::{SessionStore, StoreError, StoreKey};
use crate::config::ApiConfig;
use crate::models::{RefreshRequest, RefreshResponse};

use super::request::{ApiRequest, ApiResponse, FormPart, RequestBody, ResponseKind};
use super::transport::{OutboundRequest, ReqwestTransport, Transport};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Token refresh endpoint, relative to the base URL
pub const REFRESH_PATH: &str = "auth/token/refresh/";

/// Entry point the client is sent to when the session cannot be recovered
pub const LOGIN_PATH: &str = "/auth/login";

/// Receives the logout redirect after an unrecoverable auth failure.
pub trait SessionListener: Send + Sync {
    fn session_expired(&self, login_path: &str);
}

/// Default listener, only records the redirect in the log.
pub struct LogListener;

impl SessionListener for LogListener {
    fn session_expired(&self, login_path: &str) {
        warn!(login_path, "Session expired, redirecting to login");
    }
}

/// Which send of a logical request this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    First,
    /// Resend after a refresh, never refreshed again
    Retry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticated,
    Refreshing,
}

enum Outcome {
    Done(ApiResponse),
    Unauthorized {
        sent_token: Option<String>,
        response: ApiResponse,
    },
}

/// Clears the refreshing flag even if the refresh future is dropped
struct RefreshingGuard<'a>(&'a AtomicBool);

impl<'a> RefreshingGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for RefreshingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// API client for the Taleem Edge backend.
/// Clone is cheap - every field is shared behind an Arc.
#[derive(Clone)]
pub struct ApiClient {
    config: ApiConfig,
    transport: Arc<dyn Transport>,
    store: Arc<dyn SessionStore>,
    listener: Arc<dyn SessionListener>,
    refresh_lock: Arc<Mutex<()>>,
    refreshing: Arc<AtomicBool>,
}

impl ApiClient {
    /// Create a client using the reqwest transport
    pub fn new(config: ApiConfig, store: Arc<dyn SessionStore>) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new()?;
        Ok(Self::with_transport(config, Arc::new(transport), store))
    }

    pub fn with_transport(
        config: ApiConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            config,
            transport,
            store,
            listener: Arc::new(LogListener),
            refresh_lock: Arc::new(Mutex::new(())),
            refreshing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Replace the handler notified when the session is torn down
    pub fn with_listener(mut self, listener: Arc<dyn SessionListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn session_state(&self) -> Result<SessionState, ApiError> {
        if self.refreshing.load(Ordering::SeqCst) {
            return Ok(SessionState::Refreshing);
        }
        Ok(match self.store.get(StoreKey::AccessToken)? {
            Some(_) => SessionState::Authenticated,
            None => SessionState::Anonymous,
        })
    }

    // ========================================================================
    // Pipeline
    // ========================================================================

    /// Send a request, transparently recovering from one expired access token.
    pub async fn request(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let token = self.store.get(StoreKey::AccessToken)?;
        match self.send_attempt(&request, token, Attempt::First).await? {
            Outcome::Done(response) => Ok(response),
            Outcome::Unauthorized {
                sent_token,
                response,
            } => {
                let new_token = self
                    .recover_unauthorized(sent_token.as_deref(), response)
                    .await?;
                match self
                    .send_attempt(&request, Some(new_token), Attempt::Retry)
                    .await?
                {
                    Outcome::Done(response) => Ok(response),
                    Outcome::Unauthorized { response, .. } => {
                        Err(ApiError::from_status(response.status, &response.body))
                    }
                }
            }
        }
    }

    async fn send_attempt(
        &self,
        request: &ApiRequest,
        token: Option<String>,
        attempt: Attempt,
    ) -> Result<Outcome, ApiError> {
        let outbound = self.authorize(request, token.as_deref())?;
        debug!(
            method = %request.method,
            path = %request.path,
            ?attempt,
            authorized = token.is_some(),
            "API request"
        );

        let response = self.transport.send(outbound).await?;

        if response.status.is_success() {
            return Ok(Outcome::Done(response));
        }

        if response.status == StatusCode::UNAUTHORIZED && attempt == Attempt::First {
            return Ok(Outcome::Unauthorized {
                sent_token: token,
                response,
            });
        }

        debug!(status = response.status.as_u16(), path = %request.path, "API request failed");
        Err(ApiError::from_status(response.status, &response.body))
    }

    /// Request stage: absolute URL plus bearer header when a token is known.
    fn authorize(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<OutboundRequest, ApiError> {
        let url = self.config.resolve(&request.path)?;
        let mut headers = request.headers.clone();
        if !headers.contains_key(ACCEPT) {
            let accept = match request.response_kind {
                ResponseKind::Json => "application/json",
                ResponseKind::Binary => "*/*",
            };
            headers.insert(ACCEPT, HeaderValue::from_static(accept));
        }
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::InvalidToken)?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        Ok(OutboundRequest {
            method: request.method.clone(),
            url,
            headers,
            body: request.body.clone(),
        })
    }

    /// Response stage for a first-attempt 401. Returns the token to retry with.
    ///
    /// Refreshes are serialized. A caller that waited on another refresh and
    /// finds the stored token already replaced reuses it instead of spending
    /// the refresh token a second time.
    async fn recover_unauthorized(
        &self,
        sent_token: Option<&str>,
        original: ApiResponse,
    ) -> Result<String, ApiError> {
        let _lock = self.refresh_lock.lock().await;

        if let Some(current) = self.store.get(StoreKey::AccessToken)? {
            if sent_token != Some(current.as_str()) {
                debug!("Access token replaced while waiting, retrying without refresh");
                return Ok(current);
            }
        }

        let Some(refresh) = self.store.get(StoreKey::RefreshToken)? else {
            debug!("No refresh token stored, returning 401 to caller");
            return Err(ApiError::from_status(original.status, &original.body));
        };

        let result = {
            let _refreshing = RefreshingGuard::enter(&self.refreshing);
            self.refresh_access_token(&refresh).await
        };

        match result {
            Ok(access) => {
                self.store.set(StoreKey::AccessToken, &access)?;
                info!("Access token refreshed");
                Ok(access)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, clearing session");
                let cause = match self.end_session() {
                    Ok(()) => e,
                    Err(clear_err) => ApiError::Store(clear_err),
                };
                Err(ApiError::SessionExpired(Box::new(cause)))
            }
        }
    }

    /// Dedicated refresh call, sent straight to the transport.
    async fn refresh_access_token(&self, refresh: &str) -> Result<String, ApiError> {
        let url = self.config.resolve(REFRESH_PATH)?;
        let body = serde_json::to_value(RefreshRequest { refresh })
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

        let response = self
            .transport
            .send(OutboundRequest {
                method: Method::POST,
                url,
                headers: Default::default(),
                body: RequestBody::Json(body),
            })
            .await?;

        if !response.status.is_success() {
            return Err(ApiError::from_status(response.status, &response.body));
        }

        let parsed: RefreshResponse = response.json()?;
        if parsed.access.is_empty() {
            return Err(ApiError::InvalidResponse(
                "Refresh response contained an empty access token".to_string(),
            ));
        }
        Ok(parsed.access)
    }

    /// Drop all credentials and the cached profile, then fire the redirect.
    ///
    /// The redirect fires even when the store could not be cleared; the
    /// clear failure is returned so the caller sees stale credentials remain.
    fn end_session(&self) -> Result<(), StoreError> {
        let cleared = self.store.clear();
        if let Err(e) = &cleared {
            warn!(error = %e, "Failed to clear session store");
        }
        self.listener.session_expired(LOGIN_PATH);
        cleared
    }

    // ========================================================================
    // Verbs
    // ========================================================================

    pub async fn get(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.request(ApiRequest::get(path)).await
    }

    pub async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<ApiResponse, ApiError> {
        self.request(ApiRequest::post(path).json(body)?).await
    }

    pub async fn put<B: Serialize>(&self, path: &str, body: &B) -> Result<ApiResponse, ApiError> {
        self.request(ApiRequest::put(path).json(body)?).await
    }

    pub async fn patch<B: Serialize>(&self, path: &str, body: &B) -> Result<ApiResponse, ApiError> {
        self.request(ApiRequest::patch(path).json(body)?).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.request(ApiRequest::delete(path)).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.get(path).await?.json()
    }

    pub async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.post(path, body).await?.json()
    }

    /// Send a multipart form (file uploads). Only POST/PUT/PATCH make sense here.
    pub async fn upload(
        &self,
        method: Method,
        path: &str,
        parts: Vec<FormPart>,
    ) -> Result<ApiResponse, ApiError> {
        self.request(ApiRequest::new(method, path).multipart(parts)).await
    }

    /// Fetch a binary resource.
    pub async fn download(&self, path: &str) -> Result<Vec<u8>, ApiError> {
        Ok(self.request(ApiRequest::get(path).binary()).await?.into_bytes())
    }
}
