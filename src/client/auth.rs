//! Credential exchange and session bookkeeping.
//!
//! Login and registration talk to their endpoints anonymously and are never
//! subject to the refresh protocol: their errors reach the caller verbatim.

use tracing::{info, warn};

use super::transport::AuthMode;
use super::ApiClient;
use crate::error::ApiError;
use crate::models::{bearer_header, Credentials, RequestDescriptor, TokenPair};

pub const REGISTER_PATH: &str = "/api/auth/register/";

impl ApiClient {
    /// Exchange credentials for a token pair, store it and make it the default
    /// Authorization for every later request.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair, ApiError> {
        let request = RequestDescriptor::post(self.login_path.as_str())
            .json(&Credentials { username, password })?;
        let response = self.core.dispatch(&request, AuthMode::Anonymous).await?;
        let pair: TokenPair = response.json()?;

        // Only a session that was persisted becomes the default.
        bearer_header(&pair.access)?;
        self.store.set(pair.clone().into())?;
        self.core.set_default_bearer(&pair.access)?;

        info!("Logged in as '{}'", username);
        Ok(pair)
    }

    /// Create an account, then log in with the same credentials.
    pub async fn register(&self, username: &str, password: &str) -> Result<TokenPair, ApiError> {
        let request =
            RequestDescriptor::post(REGISTER_PATH).json(&Credentials { username, password })?;
        self.core.dispatch(&request, AuthMode::Anonymous).await?;
        info!("Registered account '{}'", username);

        self.login(username, password).await
    }

    /// Forget the session locally. The server is not contacted.
    pub fn logout(&self) {
        if let Err(e) = self.store.clear() {
            warn!("Failed to clear token store on logout: {}", e);
        }
        self.core.clear_default_authorization();
        info!("Logged out");
    }

    /// False once the tokens are gone (logout, refresh failure, repeated 401):
    /// the signal that the user has to log in again.
    pub fn is_authenticated(&self) -> bool {
        !self.store.access().is_empty()
    }
}
