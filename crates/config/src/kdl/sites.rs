//! Sites block KDL parsing.

use anyhow::Result;
use std::path::PathBuf;
use tracing::trace;

use crate::sites::*;

use super::helpers::get_string_entry;
use super::warn_unknown_children;

const KNOWN_FIELDS: &[&str] = &["source", "cache-control"];

/// Parse sites configuration block
pub fn parse_sites_config(node: &kdl::KdlNode) -> Result<SitesConfig> {
    trace!("Parsing sites configuration block");
    warn_unknown_children(node, KNOWN_FIELDS);

    let config = SitesConfig {
        source: get_string_entry(node, "source")
            .map(PathBuf::from)
            .unwrap_or_else(default_source),
        cache_control: get_string_entry(node, "cache-control")
            .unwrap_or_else(default_cache_control),
    };

    trace!(source = %config.source.display(), "Parsed sites configuration");
    Ok(config)
}
