//! Single-flight access token refresh.
//!
//! When a request comes back 401 the coordinator decides what happens next:
//! the first such request while idle starts the one refresh call, every other
//! 401 arriving while that call is in flight parks behind it, and when it
//! settles all of them are released (with the new token) or rejected (with the
//! refresh error) in the order they parked.
//!
//! The state lives behind a synchronous mutex that is never held across an
//! `.await`, so each transition is atomic with respect to the others.

use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::transport::{AuthMode, HttpCore};
use crate::error::{ApiError, RefreshError};
use crate::models::{
    bearer_header, AttemptedRequest, RefreshRequest, RefreshResponse, RequestDescriptor,
    TokenUpdate,
};
use crate::store::TokenStore;

pub const REFRESH_PATH: &str = "/api/token/refresh/";

/// Released waiters receive their request re-authorized with the new token.
type Settlement = Result<AttemptedRequest, ApiError>;

/// A 401'd request waiting on the refresh in flight.
pub(crate) struct PendingRequest {
    request: AttemptedRequest,
    settle: oneshot::Sender<Settlement>,
}

pub(crate) enum RefreshState {
    Idle,
    Refreshing {
        /// Refresh token the call in flight was made with.
        refresh: String,
        waiters: Vec<PendingRequest>,
    },
}

enum Role {
    Leader { attempt: AttemptedRequest, refresh: String },
    Waiter(oneshot::Receiver<Settlement>),
}

pub struct RefreshCoordinator {
    core: Arc<HttpCore>,
    store: Arc<dyn TokenStore>,
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub fn new(core: Arc<HttpCore>, store: Arc<dyn TokenStore>) -> Self {
        RefreshCoordinator {
            core,
            store,
            state: Mutex::new(RefreshState::Idle),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(*self.lock_state(), RefreshState::Refreshing { .. })
    }

    /// Decide the fate of a failed attempt.
    ///
    /// `Ok` carries the request to send again (already marked as retried);
    /// `Err` is the error the caller should see.
    pub async fn on_failure(
        self: &Arc<Self>,
        attempt: AttemptedRequest,
        error: ApiError,
    ) -> Result<AttemptedRequest, ApiError> {
        if !error.is_unauthorized() {
            return Err(error);
        }

        if attempt.retried {
            warn!(
                method = %attempt.original.method,
                url = %attempt.original.url,
                "Request rejected again after a token refresh; ending session"
            );
            self.end_session();
            return Err(error);
        }

        let role = {
            let mut state = self.lock_state();

            // A refresh already completed since this request went out.
            let current = self.store.access();
            if !current.is_empty() && attempt.sent_with.as_deref() != Some(current.as_str()) {
                debug!(url = %attempt.original.url, "Token rotated meanwhile; retrying with it");
                return attempt.into_retry(&current);
            }

            match &mut *state {
                RefreshState::Refreshing { waiters, .. } => {
                    let (settle, released) = oneshot::channel();
                    waiters.push(PendingRequest {
                        request: attempt,
                        settle,
                    });
                    debug!(queued = waiters.len(), "Refresh in flight; parking request");
                    Role::Waiter(released)
                }
                RefreshState::Idle => {
                    let refresh = self.store.refresh();
                    *state = RefreshState::Refreshing {
                        refresh: refresh.clone(),
                        waiters: Vec::new(),
                    };
                    Role::Leader { attempt, refresh }
                }
            }
        };

        match role {
            Role::Waiter(released) => released.await.unwrap_or_else(|_| {
                Err(RefreshError::Transport {
                    message: "refresh abandoned before settling".to_string(),
                }
                .into())
            }),
            Role::Leader { attempt, refresh } => {
                // Run on its own task so the refresh settles, and the waiters
                // are released, even if this caller stops polling.
                let coordinator = Arc::clone(self);
                let task = tokio::spawn(async move {
                    let outcome = coordinator.request_new_access(&refresh).await;
                    coordinator.settle(outcome)
                });
                match task.await {
                    Ok(Ok(access)) => attempt.into_retry(&access),
                    Ok(Err(e)) => Err(e),
                    Err(join_error) => {
                        let error = RefreshError::Transport {
                            message: join_error.to_string(),
                        };
                        // The task died before settling; nobody else will.
                        if self.is_refreshing() {
                            let _ = self.settle(Err(error.clone()));
                        }
                        Err(error.into())
                    }
                }
            }
        }
    }

    /// Exchange the stored refresh token for a new access token.
    async fn request_new_access(&self, refresh: &str) -> Result<TokenUpdate, RefreshError> {
        if refresh.is_empty() {
            return Err(RefreshError::MissingRefreshToken);
        }

        let request = RequestDescriptor::post(REFRESH_PATH)
            .json(&RefreshRequest { refresh })
            .map_err(|e| RefreshError::Transport {
                message: e.to_string(),
            })?;

        let response = self
            .core
            .dispatch(&request, AuthMode::Anonymous)
            .await
            .map_err(|e| match e {
                ApiError::Http { status, body } => RefreshError::Endpoint { status, body },
                other => RefreshError::Transport {
                    message: other.to_string(),
                },
            })?;

        let body: RefreshResponse = response.json().unwrap_or_default();
        let access = body
            .access
            .filter(|a| !a.is_empty())
            .ok_or(RefreshError::MissingAccess)?;
        bearer_header(&access).map_err(|_| RefreshError::InvalidAccess)?;

        Ok(TokenUpdate {
            access: Some(access),
            refresh: body.refresh.filter(|r| !r.is_empty()),
        })
    }

    /// Record the refresh outcome, go back to idle and release every waiter.
    fn settle(&self, outcome: Result<TokenUpdate, RefreshError>) -> Result<String, ApiError> {
        let (outcome, waiters) = self.finish(outcome);
        release(waiters, outcome)
    }

    /// The locked half of [`settle`](Self::settle): persist the outcome, update
    /// the default header and hand back the parked requests in arrival order.
    fn finish(
        &self,
        outcome: Result<TokenUpdate, RefreshError>,
    ) -> (Result<String, RefreshError>, Vec<PendingRequest>) {
        let mut state = self.lock_state();
        let (refreshed_with, waiters) = match mem::replace(&mut *state, RefreshState::Idle) {
            RefreshState::Refreshing { refresh, waiters } => (Some(refresh), waiters),
            RefreshState::Idle => (None, Vec::new()),
        };

        let outcome = outcome.and_then(|update| {
            // Logout, login or a repeated 401 replaced the session meanwhile;
            // the new token belongs to a session that no longer exists.
            if refreshed_with.is_some_and(|used| used != self.store.refresh()) {
                let current = self.store.access();
                return if current.is_empty() {
                    Err(RefreshError::SessionEnded)
                } else {
                    Ok(current)
                };
            }
            let access = update.access.clone().unwrap_or_default();
            self.store.set(update).map_err(|e| RefreshError::Persist {
                message: e.to_string(),
            })?;
            Ok(access)
        });

        match &outcome {
            Ok(access) => {
                if let Err(e) = self.core.set_default_bearer(access) {
                    warn!("Could not update default Authorization header: {}", e);
                }
            }
            Err(_) => self.end_session(),
        }
        (outcome, waiters)
    }

    /// Drop both tokens and the default header; the consumer must log in again.
    fn end_session(&self) {
        if let Err(e) = self.store.clear() {
            warn!("Failed to clear token store: {}", e);
        }
        self.core.clear_default_authorization();
    }
}

/// Hand every parked request its settlement, first parked first.
fn release(
    waiters: Vec<PendingRequest>,
    outcome: Result<String, RefreshError>,
) -> Result<String, ApiError> {
    match outcome {
        Ok(access) => {
            info!(
                released = waiters.len(),
                "Access token refreshed; resuming parked requests"
            );
            for pending in waiters {
                let next = pending.request.into_retry(&access);
                if pending.settle.send(next).is_err() {
                    debug!("Parked caller went away before the refresh settled");
                }
            }
            Ok(access)
        }
        Err(e) => {
            warn!(
                rejected = waiters.len(),
                "Token refresh failed: {}; session cleared", e
            );
            let error = ApiError::Refresh(e);
            for pending in waiters {
                let _ = pending.settle.send(Err(error.clone()));
            }
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use crate::models::TokenPair;
    use crate::store::MemoryTokenStore;
    use http::header::AUTHORIZATION;
    use http::StatusCode;
    use mockito::{Matcher, Server};
    use std::io::Write;

    fn unauthorized() -> ApiError {
        ApiError::Http {
            status: StatusCode::UNAUTHORIZED,
            body: r#"{"detail": "token expired"}"#.to_string(),
        }
    }

    fn coordinator(base_url: &str, access: &str, refresh: &str) -> Arc<RefreshCoordinator> {
        let core = Arc::new(HttpCore::new(&ApiConfig::with_base_url(base_url)).unwrap());
        let store: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::new());
        store
            .set(
                TokenPair {
                    access: access.to_string(),
                    refresh: refresh.to_string(),
                }
                .into(),
            )
            .unwrap();
        Arc::new(RefreshCoordinator::new(core, store))
    }

    fn attempt(sent_with: &str) -> AttemptedRequest {
        AttemptedRequest::new(RequestDescriptor::get("/api/drivers/"))
            .sent_with(Some(sent_with.to_string()))
    }

    fn queued(c: &RefreshCoordinator) -> usize {
        match &*c.lock_state() {
            RefreshState::Refreshing { waiters, .. } => waiters.len(),
            RefreshState::Idle => 0,
        }
    }

    async fn wait_until_queued(c: &RefreshCoordinator, n: usize) {
        while queued(c) < n {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn non_auth_failures_pass_through_untouched() {
        let c = coordinator("http://127.0.0.1:9", "a1", "r1");
        let err = c
            .on_failure(
                attempt("a1"),
                ApiError::Http {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    body: String::new(),
                },
            )
            .await
            .expect_err("500 is not retried");
        assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(c.store.access(), "a1");
        assert!(!c.is_refreshing());
    }

    #[tokio::test]
    async fn second_unauthorized_ends_session() {
        let c = coordinator("http://127.0.0.1:9", "a1", "r1");
        c.core.set_default_bearer("a1").unwrap();
        let retried = attempt("a1").into_retry("a1").unwrap();

        let err = c.on_failure(retried, unauthorized()).await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(c.store.access(), "");
        assert_eq!(c.store.refresh(), "");
        assert_eq!(c.core.default_authorization(), None);
    }

    #[tokio::test]
    async fn leader_refreshes_and_gets_reauthorized_request() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", REFRESH_PATH)
            .match_body(Matcher::Json(serde_json::json!({"refresh": "r1"})))
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access": "a2"}"#)
            .expect(1)
            .create_async()
            .await;

        let c = coordinator(&server.url(), "a1", "r1");
        let next = c.on_failure(attempt("a1"), unauthorized()).await.unwrap();

        m.assert_async().await;
        assert!(next.retried);
        assert_eq!(next.original.headers.get(AUTHORIZATION).unwrap(), "Bearer a2");
        assert_eq!(c.store.access(), "a2");
        assert_eq!(c.store.refresh(), "r1");
        assert_eq!(c.core.default_authorization().as_deref(), Some("Bearer a2"));
        assert!(!c.is_refreshing());
    }

    #[tokio::test]
    async fn rotated_refresh_token_is_persisted() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", REFRESH_PATH)
            .with_status(200)
            .with_body(r#"{"access": "a2", "refresh": "r2"}"#)
            .create_async()
            .await;

        let c = coordinator(&server.url(), "a1", "r1");
        c.on_failure(attempt("a1"), unauthorized()).await.unwrap();
        assert_eq!(c.store.refresh(), "r2");
    }

    #[tokio::test]
    async fn response_without_access_is_a_refresh_failure() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", REFRESH_PATH)
            .with_status(200)
            .with_body(r#"{"detail": "ok"}"#)
            .create_async()
            .await;

        let c = coordinator(&server.url(), "a1", "r1");
        let err = c.on_failure(attempt("a1"), unauthorized()).await.unwrap_err();
        assert!(matches!(err, ApiError::Refresh(RefreshError::MissingAccess)));
        assert_eq!(c.store.access(), "");
        assert_eq!(c.store.refresh(), "");
    }

    #[tokio::test]
    async fn already_rotated_token_skips_refresh() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", REFRESH_PATH)
            .expect(0)
            .create_async()
            .await;

        let c = coordinator(&server.url(), "a2", "r1");
        let next = c.on_failure(attempt("a1"), unauthorized()).await.unwrap();

        m.assert_async().await;
        assert!(next.retried);
        assert_eq!(next.original.headers.get(AUTHORIZATION).unwrap(), "Bearer a2");
    }

    #[tokio::test]
    async fn waiters_parked_during_refresh_share_its_outcome() {
        let c = coordinator("http://127.0.0.1:9", "a1", "r1");
        // Pretend a refresh is in flight.
        *c.lock_state() = RefreshState::Refreshing {
            refresh: "r1".to_string(),
            waiters: Vec::new(),
        };

        let mut parked = Vec::new();
        for _ in 0..3 {
            let c = Arc::clone(&c);
            parked.push(tokio::spawn(async move {
                c.on_failure(attempt("a1"), unauthorized()).await
            }));
        }
        wait_until_queued(&c, 3).await;

        let access = c.settle(Ok(TokenUpdate::access("a2"))).unwrap();
        assert_eq!(access, "a2");
        for handle in parked {
            let next = handle.await.unwrap().unwrap();
            assert!(next.retried);
            assert_eq!(next.original.headers.get(AUTHORIZATION).unwrap(), "Bearer a2");
        }
        assert!(!c.is_refreshing());
    }

    #[tokio::test]
    async fn waiters_are_rejected_when_refresh_fails() {
        let c = coordinator("http://127.0.0.1:9", "a1", "r1");
        let (settle, released) = oneshot::channel();
        *c.lock_state() = RefreshState::Refreshing {
            refresh: "r1".to_string(),
            waiters: vec![PendingRequest {
                request: attempt("a1"),
                settle,
            }],
        };

        let err = c.settle(Err(RefreshError::MissingAccess)).unwrap_err();
        assert!(matches!(err, ApiError::Refresh(RefreshError::MissingAccess)));

        let waiter = released.await.expect("waiter must be settled, not dropped");
        assert!(matches!(
            waiter,
            Err(ApiError::Refresh(RefreshError::MissingAccess))
        ));
        assert_eq!(c.store.access(), "");
    }

    #[tokio::test]
    async fn waiters_are_released_in_arrival_order() {
        let c = coordinator("http://127.0.0.1:9", "a1", "r1");
        *c.lock_state() = RefreshState::Refreshing {
            refresh: "r1".to_string(),
            waiters: Vec::new(),
        };

        let paths = ["/api/drivers/", "/api/routes/", "/api/orders/"];
        let mut parked = Vec::new();
        for (i, path) in paths.iter().enumerate() {
            let parker = Arc::clone(&c);
            let request = AttemptedRequest::new(RequestDescriptor::get(*path))
                .sent_with(Some("a1".to_string()));
            parked.push(tokio::spawn(async move {
                parker.on_failure(request, unauthorized()).await
            }));
            wait_until_queued(&c, i + 1).await;
        }

        let (outcome, waiters) = c.finish(Ok(TokenUpdate::access("a2")));
        let drained: Vec<_> = waiters
            .iter()
            .map(|pending| pending.request.original.url.clone())
            .collect();
        assert_eq!(drained, paths);

        release(waiters, outcome).unwrap();
        for (handle, path) in parked.into_iter().zip(paths) {
            let next = handle.await.unwrap().unwrap();
            assert_eq!(next.original.url, path);
            assert_eq!(next.original.headers.get(AUTHORIZATION).unwrap(), "Bearer a2");
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn refresh_settles_waiters_when_its_leader_is_abandoned() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", REFRESH_PATH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_chunked_body(|w| {
                std::thread::sleep(std::time::Duration::from_millis(300));
                w.write_all(br#"{"access": "a2"}"#)
            })
            .create_async()
            .await;

        let c = coordinator(&server.url(), "a1", "r1");
        let leader = {
            let c = Arc::clone(&c);
            tokio::spawn(async move { c.on_failure(attempt("a1"), unauthorized()).await })
        };
        while !c.is_refreshing() {
            tokio::task::yield_now().await;
        }
        let waiter = {
            let c = Arc::clone(&c);
            tokio::spawn(async move { c.on_failure(attempt("a1"), unauthorized()).await })
        };
        wait_until_queued(&c, 1).await;

        leader.abort();
        assert!(leader.await.unwrap_err().is_cancelled());

        let next = waiter.await.unwrap().expect("refresh still settles");
        assert_eq!(next.original.headers.get(AUTHORIZATION).unwrap(), "Bearer a2");
        assert_eq!(c.store.access(), "a2");
        assert!(!c.is_refreshing());
    }

    #[tokio::test]
    async fn refresh_finishing_after_session_end_is_discarded() {
        let c = coordinator("http://127.0.0.1:9", "a1", "r1");
        c.core.set_default_bearer("a1").unwrap();
        let (settle, released) = oneshot::channel();
        *c.lock_state() = RefreshState::Refreshing {
            refresh: "r1".to_string(),
            waiters: vec![PendingRequest {
                request: attempt("a1"),
                settle,
            }],
        };

        // Another request was rejected twice while the refresh was in flight.
        c.end_session();
        let err = c.settle(Ok(TokenUpdate::access("a2"))).unwrap_err();

        assert!(matches!(err, ApiError::Refresh(RefreshError::SessionEnded)));
        assert!(matches!(
            released.await.unwrap(),
            Err(ApiError::Refresh(RefreshError::SessionEnded))
        ));
        assert_eq!(c.store.access(), "");
        assert_eq!(c.store.refresh(), "");
        assert_eq!(c.core.default_authorization(), None);
    }

    #[tokio::test]
    async fn refresh_finishing_after_new_login_keeps_new_session() {
        let c = coordinator("http://127.0.0.1:9", "a1", "r1");
        *c.lock_state() = RefreshState::Refreshing {
            refresh: "r1".to_string(),
            waiters: Vec::new(),
        };

        c.store
            .set(
                TokenPair {
                    access: "a9".to_string(),
                    refresh: "r9".to_string(),
                }
                .into(),
            )
            .unwrap();
        let access = c.settle(Ok(TokenUpdate::access("a2"))).unwrap();

        assert_eq!(access, "a9");
        assert_eq!(c.store.access(), "a9");
        assert_eq!(c.store.refresh(), "r9");
    }
}
