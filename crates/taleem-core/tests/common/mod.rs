//! Scripted transport and listener doubles shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde_json::Value;
use taleem_core::api::{
    ApiResponse, OutboundRequest, SessionListener, Transport, TransportError,
};
use taleem_core::auth::{MemoryStore, SessionStore, StoreKey};
use taleem_core::{ApiClient, ApiConfig};

pub const BASE_URL: &str = "http://127.0.0.1:8000/api/";

type Handler = dyn Fn(&OutboundRequest) -> Result<ApiResponse, TransportError> + Send + Sync;

/// Records every request and answers with a caller-supplied handler.
pub struct ScriptedTransport {
    handler: Box<Handler>,
    requests: Mutex<Vec<OutboundRequest>>,
}

impl ScriptedTransport {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&OutboundRequest) -> Result<ApiResponse, TransportError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests sent to `path` (path relative to the base URL)
    pub fn count(&self, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| relative_path(r) == path)
            .count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: OutboundRequest) -> Result<ApiResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        // Let concurrently issued requests interleave
        tokio::task::yield_now().await;
        (self.handler)(&request)
    }
}

#[derive(Default)]
pub struct CountingListener {
    count: AtomicUsize,
    last_path: Mutex<Option<String>>,
}

impl CountingListener {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn last_path(&self) -> Option<String> {
        self.last_path.lock().unwrap().clone()
    }
}

impl SessionListener for CountingListener {
    fn session_expired(&self, login_path: &str) {
        self.count.fetch_add(1, Ordering::SeqCst);
        *self.last_path.lock().unwrap() = Some(login_path.to_string());
    }
}

pub fn json_response(status: u16, body: Value) -> Result<ApiResponse, TransportError> {
    Ok(ApiResponse::new(
        StatusCode::from_u16(status).unwrap(),
        serde_json::to_vec(&body).unwrap(),
    ))
}

pub fn bearer(request: &OutboundRequest) -> Option<String> {
    request
        .headers
        .get(AUTHORIZATION)
        .map(|v| v.to_str().unwrap().to_string())
}

/// Path below `/api/`, e.g. `library/books/`
pub fn relative_path(request: &OutboundRequest) -> String {
    request
        .url
        .path()
        .trim_start_matches("/api/")
        .to_string()
}

pub fn store_with(access: Option<&str>, refresh: Option<&str>) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    if let Some(access) = access {
        store.set(StoreKey::AccessToken, access).unwrap();
    }
    if let Some(refresh) = refresh {
        store.set(StoreKey::RefreshToken, refresh).unwrap();
    }
    if access.is_some() {
        let user = r#"{"id": 1, "name": "Sara", "email": "sara@example.com", "role": "student"}"#;
        store.set(StoreKey::UserData, user).unwrap();
    }
    store
}

pub fn client(
    transport: Arc<ScriptedTransport>,
    store: Arc<MemoryStore>,
    listener: Arc<CountingListener>,
) -> ApiClient {
    let config = ApiConfig::new(BASE_URL).unwrap();
    ApiClient::with_transport(config, transport, store).with_listener(listener)
}
