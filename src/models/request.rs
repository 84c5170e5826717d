use http::header::{HeaderName, AUTHORIZATION};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;

/// Everything needed to (re)send one HTTP call.
#[derive(Clone, Debug)]
pub struct RequestDescriptor {
    pub method: Method,
    /// Either a path relative to the configured base URL or an absolute URL.
    pub url: String,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        RequestDescriptor {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::validation("body", e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Replace whatever Authorization header is present with `Bearer <access>`.
    pub fn set_bearer(&mut self, access: &str) -> Result<(), ApiError> {
        self.headers.insert(AUTHORIZATION, bearer_header(access)?);
        Ok(())
    }
}

pub fn bearer_header(access: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(&format!("Bearer {}", access))
        .map_err(|_| ApiError::validation("access token", "not a valid header value"))
}

/// A request together with its retry bookkeeping.
///
/// A request is retried at most once: `retried` flips when it is parked behind
/// (or triggers) a refresh and never flips back.
#[derive(Clone, Debug)]
pub struct AttemptedRequest {
    pub original: RequestDescriptor,
    pub retried: bool,
    /// Access token the last attempt went out with, if any.
    pub sent_with: Option<String>,
}

impl AttemptedRequest {
    pub fn new(original: RequestDescriptor) -> Self {
        AttemptedRequest {
            original,
            retried: false,
            sent_with: None,
        }
    }

    pub fn sent_with(self, access: Option<String>) -> Self {
        AttemptedRequest {
            sent_with: access,
            ..self
        }
    }

    /// The second and final attempt, authorized with `access`.
    pub fn into_retry(self, access: &str) -> Result<Self, ApiError> {
        let mut original = self.original;
        original.set_bearer(access)?;
        Ok(AttemptedRequest {
            original,
            retried: true,
            sent_with: self.sent_with,
        })
    }
}

/// A successful (2xx) response with its body fully read.
#[derive(Clone, Debug)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body).map_err(|e| ApiError::Decode {
            message: e.to_string(),
        })
    }
}
