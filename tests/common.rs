#![allow(dead_code)]

use std::sync::Arc;

use fleetops::config::ApiConfig;
use fleetops::models::TokenUpdate;
use fleetops::store::{MemoryTokenStore, TokenStore};
use fleetops::ApiClient;
use mockito::{Matcher, Mock, ServerGuard};

pub const REFRESH_PATH: &str = "/api/token/refresh/";

/// A client against `server` whose store holds the given tokens (empty = absent).
pub fn client_with_tokens(server: &ServerGuard, access: &str, refresh: &str) -> ApiClient {
    let store: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::new());
    let update = TokenUpdate {
        access: (!access.is_empty()).then(|| access.to_string()),
        refresh: (!refresh.is_empty()).then(|| refresh.to_string()),
    };
    store.set(update).expect("memory store never fails");
    ApiClient::new(&ApiConfig::with_base_url(server.url()), store).expect("client should build")
}

pub async fn mock_refresh(server: &mut ServerGuard, refresh: &str, access: &str, hits: usize) -> Mock {
    server
        .mock("POST", REFRESH_PATH)
        .match_body(Matcher::Json(serde_json::json!({ "refresh": refresh })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(serde_json::json!({ "access": access }).to_string())
        .expect(hits)
        .create_async()
        .await
}

/// `path` answers 401 to `Bearer <access>`.
pub async fn mock_expired(server: &mut ServerGuard, method: &str, path: &str, access: &str, hits: usize) -> Mock {
    server
        .mock(method, path)
        .match_header("authorization", format!("Bearer {}", access).as_str())
        .with_status(401)
        .with_header("content-type", "application/json")
        .with_body(r#"{"detail": "Given token not valid for any token type"}"#)
        .expect(hits)
        .create_async()
        .await
}

/// `path` answers 200 with `body` to `Bearer <access>`.
pub async fn mock_ok(server: &mut ServerGuard, method: &str, path: &str, access: &str, body: &str, hits: usize) -> Mock {
    server
        .mock(method, path)
        .match_header("authorization", format!("Bearer {}", access).as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .expect(hits)
        .create_async()
        .await
}
