use serde::{Deserialize, Serialize};

/// The session credentials handed out by the login endpoint.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// A partial write to the token store. `None` fields are left untouched.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
}

impl TokenUpdate {
    pub fn access(access: impl Into<String>) -> Self {
        TokenUpdate {
            access: Some(access.into()),
            refresh: None,
        }
    }
}

impl From<TokenPair> for TokenUpdate {
    fn from(pair: TokenPair) -> Self {
        TokenUpdate {
            access: Some(pair.access),
            refresh: Some(pair.refresh),
        }
    }
}

/// Body posted to the login and registration endpoints.
#[derive(Serialize, Clone)]
pub struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

/// Some deployments rotate the refresh token alongside the access token.
#[derive(Deserialize, Debug, Default)]
pub(crate) struct RefreshResponse {
    #[serde(default)]
    pub access: Option<String>,
    #[serde(default)]
    pub refresh: Option<String>,
}
