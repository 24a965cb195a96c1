//! Error types for frontdoor
//!
//! One variant per failure class the server distinguishes. The classes
//! differ in blast radius: some abort startup, others are reported to the
//! caller and the process keeps serving.

use thiserror::Error;

/// Main error type for frontdoor operations
#[derive(Error, Debug)]
pub enum FrontDoorError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The site source could not be read at all
    #[error("Site discovery failed for {path}: {message}")]
    Discovery {
        path: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A single site could not be loaded
    #[error("Site '{site}' could not be loaded: {reason}")]
    SiteLoad { site: String, reason: String },

    /// The persisted certificate policy exists but cannot be parsed
    #[error("Certificate policy document {path} is corrupt: {message}")]
    PolicyCorrupt { path: String, message: String },

    /// The certificate policy could not be written
    #[error("Failed to persist certificate policy to {path}: {message}")]
    Persistence {
        path: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A certificate request named a domain this server does not serve
    #[error("Domain not approved: {domain}")]
    DomainNotApproved { domain: String },
}

impl FrontDoorError {
    /// Whether this error must stop the process during startup.
    ///
    /// Per-site load failures and approval rejections are recovered
    /// locally; everything else aborts.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            FrontDoorError::SiteLoad { .. } | FrontDoorError::DomainNotApproved { .. }
        )
    }

    /// Short machine-readable class name, used as a log field
    pub fn kind(&self) -> &'static str {
        match self {
            FrontDoorError::Config { .. } => "config",
            FrontDoorError::Discovery { .. } => "discovery",
            FrontDoorError::SiteLoad { .. } => "site_load",
            FrontDoorError::PolicyCorrupt { .. } => "policy_corrupt",
            FrontDoorError::Persistence { .. } => "persistence",
            FrontDoorError::DomainNotApproved { .. } => "domain_not_approved",
        }
    }
}

/// Result type alias for frontdoor operations
pub type FrontDoorResult<T> = Result<T, FrontDoorError>;
