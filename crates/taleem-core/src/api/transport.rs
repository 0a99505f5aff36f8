//! Base HTTP call the client pipeline wraps.
//!
//! `Transport` is the seam between the auth logic and the HTTP library: the
//! client only ever hands it fully-prepared `OutboundRequest`s, so the
//! refresh/retry behavior can be exercised without a network.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, Url};
use tracing::debug;

use super::request::{ApiResponse, FormPart, PartValue, RequestBody};
use super::TransportError;

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// A request with its absolute URL and final headers.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

/// Sends one request and reports whatever status came back.
///
/// Implementations return `Ok` for every response, including 4xx/5xx;
/// `Err` means no response was received.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<ApiResponse, TransportError>;
}

/// Transport backed by `reqwest`.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client, sharing its connection pool.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn build_form(parts: Vec<FormPart>) -> Result<Form, TransportError> {
        let mut form = Form::new();
        for part in parts {
            form = match part.value {
                PartValue::Text(text) => form.text(part.name, text),
                PartValue::File {
                    file_name,
                    mime,
                    bytes,
                } => {
                    let mut file_part = Part::bytes(bytes).file_name(file_name);
                    if let Some(mime) = mime {
                        file_part = file_part.mime_str(&mime)?;
                    }
                    form.part(part.name, file_part)
                }
            };
        }
        Ok(form)
    }
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim_start().starts_with("multipart/form-data"))
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: OutboundRequest) -> Result<ApiResponse, TransportError> {
        let OutboundRequest {
            method,
            url,
            mut headers,
            body,
        } = request;

        debug!(%method, %url, "Sending request");

        let builder = self.client.request(method, url);
        let builder = match body {
            RequestBody::Empty => builder.headers(headers),
            RequestBody::Json(value) => builder.headers(headers).json(&value),
            RequestBody::Multipart(parts) => {
                // reqwest appends its own content type carrying the real boundary
                if is_multipart(&headers) {
                    headers.remove(CONTENT_TYPE);
                }
                builder.headers(headers).multipart(Self::build_form(parts)?)
            }
        };

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        debug!(status = status.as_u16(), bytes = body.len(), "Received response");

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}
