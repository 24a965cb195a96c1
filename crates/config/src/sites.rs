//! Site source configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

/// Where per-domain sites live and how they are served
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SitesConfig {
    /// Directory holding one subdirectory per domain
    #[serde(default = "default_source")]
    pub source: PathBuf,

    /// `Cache-Control` header attached to static responses
    #[validate(length(min = 1, message = "cache-control must not be empty"))]
    #[serde(default = "default_cache_control")]
    pub cache_control: String,
}

impl Default for SitesConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            cache_control: default_cache_control(),
        }
    }
}

pub(crate) fn default_source() -> PathBuf {
    PathBuf::from("./www")
}

pub(crate) fn default_cache_control() -> String {
    "public, max-age=300".to_string()
}
