use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where the session tokens live. We differentiate them via a "type" tag in the YAML.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
#[serde(tag = "type")]
pub enum TokenStoreConfig {
    /// JSON file that survives restarts. Without a path, the user config dir is used.
    #[serde(rename = "file")]
    File {
        #[serde(default)]
        path: Option<PathBuf>,
    },
    /// Process-local storage, gone when the process exits.
    #[serde(rename = "memory")]
    Memory,
}

impl Default for TokenStoreConfig {
    fn default() -> Self {
        TokenStoreConfig::File { path: None }
    }
}
