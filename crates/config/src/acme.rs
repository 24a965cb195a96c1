//! Certificate automation settings.
//!
//! These values feed the `defaults` block of the certificate policy document
//! and the contact metadata attached to approved issuance requests.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::Validate;

/// Let's Encrypt production directory
pub const LETS_ENCRYPT_PRODUCTION: &str = "https://acme-v02.api.letsencrypt.org/directory";

/// Let's Encrypt staging directory
pub const LETS_ENCRYPT_STAGING: &str = "https://acme-staging-v02.api.letsencrypt.org/directory";

/// File name of the policy document inside the policy directory
pub const POLICY_FILE_NAME: &str = "config.json";

/// Certificate automation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct AcmeConfig {
    /// Contact address for the ACME account and approved requests
    #[validate(email(message = "maintainer-email must be a valid email address"))]
    #[serde(default = "default_maintainer_email")]
    pub maintainer_email: String,

    /// Directory holding the policy document and certificate store
    #[serde(default = "default_policy_dir")]
    pub policy_dir: PathBuf,

    /// Use the staging CA instead of production
    #[serde(default)]
    pub staging: bool,

    /// How long before expiry renewal starts, e.g. `-45d`
    #[validate(custom(function = "crate::validation::validate_renew_offset"))]
    #[serde(default = "default_renew_offset")]
    pub renew_offset: String,

    /// Random spread applied to renewal times, e.g. `3d`
    #[validate(custom(function = "crate::validation::validate_renew_stagger"))]
    #[serde(default = "default_renew_stagger")]
    pub renew_stagger: String,

    #[validate(length(min = 1))]
    #[serde(default = "default_account_key_type")]
    pub account_key_type: String,

    #[validate(length(min = 1))]
    #[serde(default = "default_server_key_type")]
    pub server_key_type: String,

    /// Storage backend named in the policy defaults
    #[validate(length(min = 1))]
    #[serde(default = "default_store_module")]
    pub store_module: String,

    /// HTTP-01 challenge backend named in the policy defaults
    #[validate(length(min = 1))]
    #[serde(default = "default_challenge_module")]
    pub challenge_module: String,
}

impl Default for AcmeConfig {
    fn default() -> Self {
        Self {
            maintainer_email: default_maintainer_email(),
            policy_dir: default_policy_dir(),
            staging: false,
            renew_offset: default_renew_offset(),
            renew_stagger: default_renew_stagger(),
            account_key_type: default_account_key_type(),
            server_key_type: default_server_key_type(),
            store_module: default_store_module(),
            challenge_module: default_challenge_module(),
        }
    }
}

impl AcmeConfig {
    /// ACME directory URL selected by the staging flag
    pub fn directory_url(&self) -> &'static str {
        if self.staging {
            LETS_ENCRYPT_STAGING
        } else {
            LETS_ENCRYPT_PRODUCTION
        }
    }

    /// Full path of the persisted policy document
    pub fn policy_path(&self) -> PathBuf {
        self.policy_dir.join(POLICY_FILE_NAME)
    }

    /// The policy directory
    pub fn policy_dir(&self) -> &Path {
        &self.policy_dir
    }
}

pub(crate) fn default_maintainer_email() -> String {
    "admin@example.com".to_string()
}

pub(crate) fn default_policy_dir() -> PathBuf {
    PathBuf::from("./greenlock.d")
}

pub(crate) fn default_renew_offset() -> String {
    "-45d".to_string()
}

pub(crate) fn default_renew_stagger() -> String {
    "3d".to_string()
}

pub(crate) fn default_account_key_type() -> String {
    "EC-P256".to_string()
}

pub(crate) fn default_server_key_type() -> String {
    "RSA-2048".to_string()
}

pub(crate) fn default_store_module() -> String {
    "greenlock-store-fs".to_string()
}

pub(crate) fn default_challenge_module() -> String {
    "acme-http-01-standalone".to_string()
}
