use std::sync::Arc;

use tracing::info;

use super::{file_store::FileTokenStore, memory_store::MemoryTokenStore};
use crate::config::TokenStoreConfig;
use crate::error::StoreError;
use crate::models::TokenUpdate;

/// Keys the two tokens are persisted under.
pub const ACCESS_KEY: &str = "access_token";
pub const REFRESH_KEY: &str = "refresh_token";

/// The TokenStore trait abstracts where the session tokens are kept.
///
/// Getters return an empty string when a token is absent. Tokens are opaque;
/// nothing here validates or decodes them.
pub trait TokenStore: Send + Sync {
    fn access(&self) -> String;
    fn refresh(&self) -> String;
    /// Write the provided fields, leaving absent ones untouched.
    fn set(&self, update: TokenUpdate) -> Result<(), StoreError>;
    /// Remove both tokens.
    fn clear(&self) -> Result<(), StoreError>;
}

/// Creates a concrete store implementation based on the TokenStoreConfig.
pub fn create_store(config: &TokenStoreConfig) -> Arc<dyn TokenStore> {
    match config {
        TokenStoreConfig::Memory => {
            info!("Using in-memory token store.");
            Arc::new(MemoryTokenStore::new())
        }
        TokenStoreConfig::File { path } => {
            let path = path.clone().unwrap_or_else(FileTokenStore::default_path);
            info!("Using file token store at {}", path.display());
            Arc::new(FileTokenStore::new(path))
        }
    }
}
