//! Configuration for policy parsing and decision caching
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//!
//! ```toml
//! [parse]
//! accepted_versions = ["2012-10-17", "2008-10-17"]
//! require_version = false
//!
//! [cache]
//! capacity = 1000
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Rules applied when parsing policy documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Policy language versions accepted in the `Version` field
    pub accepted_versions: Vec<String>,

    /// Reject documents that omit `Version`
    pub require_version: bool,
}

impl ParseOptions {
    pub fn accepts_version(&self, version: &str) -> bool {
        self.accepted_versions.iter().any(|v| v == version)
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            accepted_versions: vec!["2012-10-17".to_string(), "2008-10-17".to_string()],
            require_version: false,
        }
    }
}

/// Decision cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum cached decisions; 0 disables caching
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig { capacity: 1000 }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IamConfig {
    pub parse: ParseOptions,
    pub cache: CacheConfig,
}

impl IamConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}
