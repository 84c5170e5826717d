//! The base transport: one HTTP call in, one response (or structured error) out.
//!
//! Nothing here retries. Whether a failure deserves another attempt is decided
//! by the refresh coordinator.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::models::{bearer_header, ApiResponse, RequestDescriptor};

/// How a dispatched request is authorized.
#[derive(Clone, Copy, Debug)]
pub enum AuthMode<'a> {
    /// Credential exchange endpoints: no Authorization header at all.
    Anonymous,
    /// Regular calls: the default header, then the caller's headers, then the
    /// stored access token (when present) on top of both.
    Session(Option<&'a str>),
}

pub struct HttpCore {
    http: reqwest::Client,
    base_url: String,
    default_authorization: RwLock<Option<HeaderValue>>,
}

impl HttpCore {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder();
        if config.timeout_in_ms > 0 {
            builder = builder.timeout(Duration::from_millis(config.timeout_in_ms));
        }
        let http = builder.build().map_err(ApiError::transport)?;

        Ok(HttpCore {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            default_authorization: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve a path against the base URL. Absolute URLs pass through.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// The Authorization header attached to every session request by default.
    pub fn default_authorization(&self) -> Option<String> {
        self.default_authorization
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    pub fn set_default_bearer(&self, access: &str) -> Result<(), ApiError> {
        let value = bearer_header(access)?;
        *self
            .default_authorization
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(value);
        Ok(())
    }

    pub fn clear_default_authorization(&self) {
        *self
            .default_authorization
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn outgoing_headers(
        &self,
        request: &RequestDescriptor,
        auth: AuthMode<'_>,
    ) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let AuthMode::Session(_) = auth {
            let default = self
                .default_authorization
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            if let Some(value) = default {
                headers.insert(AUTHORIZATION, value);
            }
        }

        headers.extend(request.headers.clone());

        match auth {
            AuthMode::Anonymous => {
                headers.remove(AUTHORIZATION);
            }
            AuthMode::Session(Some(access)) if !access.is_empty() => {
                headers.insert(AUTHORIZATION, bearer_header(access)?);
            }
            AuthMode::Session(_) => {}
        }
        Ok(headers)
    }

    /// Send one request. Non-2xx answers come back as `ApiError::Http` with the
    /// status and body; no answer at all as `ApiError::Transport`.
    pub async fn dispatch(
        &self,
        request: &RequestDescriptor,
        auth: AuthMode<'_>,
    ) -> Result<ApiResponse, ApiError> {
        let request_id = Uuid::new_v4();
        let url = self.url(&request.url);
        let headers = self.outgoing_headers(request, auth)?;

        debug!(
            request_id = %request_id,
            method = %request.method,
            url = %url,
            "Dispatching request"
        );

        let mut builder = self
            .http
            .request(request.method.clone(), &url)
            .headers(headers);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(request_id = %request_id, url = %url, "Request failed without a response: {}", e);
            ApiError::transport(e)
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(ApiError::transport)?.to_vec();

        debug!(
            request_id = %request_id,
            status = status.as_u16(),
            "Received response"
        );

        if status.is_success() {
            Ok(ApiResponse {
                status,
                headers,
                body,
            })
        } else {
            Err(ApiError::Http {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            })
        }
    }
}
