//! Authenticated HTTP client for the fleet API.
//!
//! Every request goes out through [`transport::HttpCore`] with the stored access
//! token attached; every 401 goes through [`coordinator::RefreshCoordinator`],
//! which refreshes the token once and replays the request at most once.

pub mod auth;
pub mod coordinator;
pub mod transport;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use self::coordinator::RefreshCoordinator;
use self::transport::{AuthMode, HttpCore};
use crate::config::{ApiConfig, ConfigV1};
use crate::error::ApiError;
use crate::models::{ApiResponse, AttemptedRequest, RequestDescriptor};
use crate::store::{create_store, TokenStore};

/// Cheap to clone; clones share the transport, the token store and the
/// refresh state.
#[derive(Clone)]
pub struct ApiClient {
    core: Arc<HttpCore>,
    coordinator: Arc<RefreshCoordinator>,
    store: Arc<dyn TokenStore>,
    login_path: String,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, store: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        let core = Arc::new(HttpCore::new(config)?);
        let coordinator = Arc::new(RefreshCoordinator::new(core.clone(), store.clone()));

        // Pick up a session persisted by an earlier run.
        let access = store.access();
        if !access.is_empty() {
            core.set_default_bearer(&access)?;
        }

        Ok(ApiClient {
            core,
            coordinator,
            store,
            login_path: config.login_path.clone(),
        })
    }

    pub fn from_config(config: &ConfigV1) -> Result<Self, ApiError> {
        Self::new(&config.api, create_store(&config.token_store))
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub fn base_url(&self) -> &str {
        self.core.base_url()
    }

    /// The Authorization value sent by default, e.g. `Bearer a1`.
    pub fn default_authorization(&self) -> Option<String> {
        self.core.default_authorization()
    }

    /// Send a request with the session's bearer token, transparently refreshing
    /// the token and replaying the request once on a 401.
    pub async fn request(&self, request: RequestDescriptor) -> Result<ApiResponse, ApiError> {
        let mut attempt = AttemptedRequest::new(request);
        loop {
            let access = self.store.access();
            let bearer = (!access.is_empty()).then_some(access);
            attempt = attempt.sent_with(bearer.clone());

            let outcome = self
                .core
                .dispatch(&attempt.original, AuthMode::Session(bearer.as_deref()))
                .await;
            match outcome {
                Ok(response) => return Ok(response),
                // Only hands back a request when it has not been retried yet.
                Err(error) => attempt = self.coordinator.on_failure(attempt, error).await?,
            }
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(RequestDescriptor::get(path)).await?.json()
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(RequestDescriptor::post(path).json(body)?)
            .await?
            .json()
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.request(RequestDescriptor::delete(path))
            .await
            .map(|_| ())
    }
}
