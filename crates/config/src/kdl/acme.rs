//! ACME block KDL parsing.

use anyhow::Result;
use std::path::PathBuf;
use tracing::trace;

use crate::acme::*;

use super::helpers::{get_bool_entry, get_string_entry};
use super::warn_unknown_children;

const KNOWN_FIELDS: &[&str] = &[
    "maintainer-email",
    "policy-dir",
    "staging",
    "renew-offset",
    "renew-stagger",
    "account-key-type",
    "server-key-type",
    "store-module",
    "challenge-module",
];

/// Parse acme configuration block
pub fn parse_acme_config(node: &kdl::KdlNode) -> Result<AcmeConfig> {
    trace!("Parsing acme configuration block");
    warn_unknown_children(node, KNOWN_FIELDS);

    let config = AcmeConfig {
        maintainer_email: get_string_entry(node, "maintainer-email")
            .unwrap_or_else(default_maintainer_email),
        policy_dir: get_string_entry(node, "policy-dir")
            .map(PathBuf::from)
            .unwrap_or_else(default_policy_dir),
        staging: get_bool_entry(node, "staging").unwrap_or(false),
        renew_offset: get_string_entry(node, "renew-offset").unwrap_or_else(default_renew_offset),
        renew_stagger: get_string_entry(node, "renew-stagger")
            .unwrap_or_else(default_renew_stagger),
        account_key_type: get_string_entry(node, "account-key-type")
            .unwrap_or_else(default_account_key_type),
        server_key_type: get_string_entry(node, "server-key-type")
            .unwrap_or_else(default_server_key_type),
        store_module: get_string_entry(node, "store-module").unwrap_or_else(default_store_module),
        challenge_module: get_string_entry(node, "challenge-module")
            .unwrap_or_else(default_challenge_module),
    };

    trace!(
        maintainer_email = %config.maintainer_email,
        policy_dir = %config.policy_dir.display(),
        staging = config.staging,
        "Parsed acme configuration"
    );

    Ok(config)
}
