//! Configuration for the frontdoor virtual-host server
//!
//! Configuration is written in KDL:
//!
//! ```kdl
//! server {
//!     listen "0.0.0.0:80"
//!     tls-listen "0.0.0.0:443"
//!     tls-cert "/etc/frontdoor/tls/cert.pem"
//!     tls-key "/etc/frontdoor/tls/key.pem"
//! }
//!
//! sites {
//!     source "/var/www"
//! }
//!
//! acme {
//!     maintainer-email "admin@example.com"
//!     policy-dir "/var/lib/frontdoor/greenlock.d"
//!     staging #false
//! }
//! ```
//!
//! Every block and field is optional; omitted values fall back to the
//! defaults documented on each struct.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::Validate;

use frontdoor_common::{FrontDoorError, FrontDoorResult};

pub mod acme;
pub mod kdl;
pub mod server;
pub mod sites;
pub mod validation;

pub use acme::AcmeConfig;
pub use server::ServerConfig;
pub use sites::SitesConfig;

/// Embedded configuration used when no file is given
pub const DEFAULT_CONFIG_KDL: &str = r#"
server {
    listen "0.0.0.0:80"
}

sites {
    source "./www"
}

acme {
    maintainer-email "admin@example.com"
    policy-dir "./greenlock.d"
    staging #false
}
"#;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrontDoorConfig {
    /// Listener configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Where per-domain sites are discovered
    #[serde(default)]
    pub sites: SitesConfig,

    /// Certificate policy generation and approval
    #[serde(default)]
    pub acme: AcmeConfig,
}

/// Values supplied from the command line or environment.
///
/// Each `Some` replaces the corresponding file value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub maintainer_email: Option<String>,
    pub sites_source: Option<PathBuf>,
    pub policy_dir: Option<PathBuf>,
    pub staging: Option<bool>,
}

impl FrontDoorConfig {
    /// Load configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::from_kdl(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Load the default embedded configuration.
    pub fn default_embedded() -> Result<Self> {
        Self::from_kdl(DEFAULT_CONFIG_KDL).or_else(|e| {
            tracing::warn!(
                "Failed to parse embedded KDL config, using programmatic default: {}",
                e
            );
            Ok(Self::default())
        })
    }

    /// Parse configuration from KDL format
    pub fn from_kdl(content: &str) -> Result<Self> {
        let doc: ::kdl::KdlDocument = content
            .parse()
            .map_err(|e: ::kdl::KdlError| anyhow::anyhow!("{}", kdl::render_parse_error(content, &e)))?;

        kdl::parse_kdl_document(&doc)
    }

    /// Apply command-line / environment overrides
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(email) = overrides.maintainer_email {
            self.acme.maintainer_email = email;
        }
        if let Some(source) = overrides.sites_source {
            self.sites.source = source;
        }
        if let Some(dir) = overrides.policy_dir {
            self.acme.policy_dir = dir;
        }
        if let Some(staging) = overrides.staging {
            self.acme.staging = staging;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> FrontDoorResult<()> {
        Validate::validate(&self.server).map_err(|e| config_error("server", e))?;
        Validate::validate(&self.sites).map_err(|e| config_error("sites", e))?;
        Validate::validate(&self.acme).map_err(|e| config_error("acme", e))?;
        Ok(())
    }
}

fn config_error(block: &str, errors: validator::ValidationErrors) -> FrontDoorError {
    FrontDoorError::Config {
        message: format!("Invalid '{}' block: {}", block, errors),
        source: Some(Box::new(errors)),
    }
}
