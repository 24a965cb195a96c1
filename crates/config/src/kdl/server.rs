//! Server block KDL parsing.

use anyhow::Result;
use std::path::PathBuf;
use tracing::trace;

use crate::server::*;

use super::helpers::{get_bool_entry, get_string_entry};
use super::warn_unknown_children;

const KNOWN_FIELDS: &[&str] = &[
    "listen",
    "tls-listen",
    "tls-cert",
    "tls-key",
    "daemon",
    "pid-file",
];

/// Parse server configuration block
pub fn parse_server_config(node: &kdl::KdlNode) -> Result<ServerConfig> {
    trace!("Parsing server configuration block");
    warn_unknown_children(node, KNOWN_FIELDS);

    let config = ServerConfig {
        listen: get_string_entry(node, "listen").unwrap_or_else(default_listen),
        tls_listen: get_string_entry(node, "tls-listen"),
        tls_cert: get_string_entry(node, "tls-cert").map(PathBuf::from),
        tls_key: get_string_entry(node, "tls-key").map(PathBuf::from),
        daemon: get_bool_entry(node, "daemon").unwrap_or(false),
        pid_file: get_string_entry(node, "pid-file").map(PathBuf::from),
    };

    trace!(
        listen = %config.listen,
        tls_listen = ?config.tls_listen,
        daemon = config.daemon,
        "Parsed server configuration"
    );

    Ok(config)
}
