//! KDL configuration parsing.
//!
//! Top-level nodes: `server`, `sites`, `acme`. Each maps onto one
//! configuration struct; absent blocks keep their defaults.

mod acme;
mod helpers;
mod server;
mod sites;

use anyhow::Result;
use miette::Diagnostic;
use tracing::warn;

use crate::FrontDoorConfig;

pub use helpers::offset_to_line_col;

/// Build a [`FrontDoorConfig`] from a parsed KDL document
pub fn parse_kdl_document(doc: &kdl::KdlDocument) -> Result<FrontDoorConfig> {
    let mut config = FrontDoorConfig::default();

    for node in doc.nodes() {
        match node.name().value() {
            "server" => config.server = server::parse_server_config(node)?,
            "sites" => config.sites = sites::parse_sites_config(node)?,
            "acme" => config.acme = acme::parse_acme_config(node)?,
            other => {
                return Err(anyhow::anyhow!(
                    "Unknown top-level configuration block '{}'. Valid blocks: server, sites, acme",
                    other
                ));
            }
        }
    }

    Ok(config)
}

/// Log child nodes that the block parser does not understand
pub(crate) fn warn_unknown_children(node: &kdl::KdlNode, known: &[&str]) {
    for name in helpers::child_names(node) {
        if !known.contains(&name.as_str()) {
            warn!(
                block = %node.name().value(),
                field = %name,
                "Ignoring unknown configuration field"
            );
        }
    }
}

/// Render a KDL parse error with line numbers and a source excerpt
pub fn render_parse_error(content: &str, e: &kdl::KdlError) -> String {
    let mut error_msg = String::from("KDL configuration parse error:\n\n");
    let lines: Vec<&str> = content.lines().collect();
    let mut found_details = false;

    if let Some(related) = e.related() {
        for diagnostic in related {
            error_msg.push_str(&format!("  {}\n", diagnostic));
            found_details = true;

            if let Some(labels) = diagnostic.labels() {
                for label in labels {
                    let (line, col) = offset_to_line_col(content, label.offset());
                    error_msg.push_str(&format!("\n  --> at line {}, column {}\n", line, col));

                    if let Some(line_content) = lines.get(line.saturating_sub(1)) {
                        error_msg.push_str(&format!("{:>4} | {}\n", line, line_content));
                        error_msg.push_str(&format!("     | {}^", " ".repeat(col.saturating_sub(1))));
                        if let Some(label_msg) = label.label() {
                            error_msg.push_str(&format!(" {}", label_msg));
                        }
                        error_msg.push('\n');
                    }
                }
            }

            if let Some(help) = diagnostic.help() {
                error_msg.push_str(&format!("\n  Help: {}\n", help));
            }
        }
    }

    if !found_details {
        error_msg.push_str(&format!("  {}\n", e));
    }

    error_msg
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crate::FrontDoorConfig;

    #[test]
    fn test_parse_full_document() {
        let config = FrontDoorConfig::from_kdl(
            r#"
            server {
                listen "127.0.0.1:8080"
                tls-listen "127.0.0.1:8443"
                tls-cert "/etc/frontdoor/cert.pem"
                tls-key "/etc/frontdoor/key.pem"
            }
            sites {
                source "/srv/www"
                cache-control "no-cache"
            }
            acme {
                maintainer-email "ops@example.org"
                policy-dir "/var/lib/frontdoor"
                staging #true
                renew-offset "-30d"
                renew-stagger "1d"
                account-key-type "EC-P384"
                server-key-type "EC-P256"
            }
            "#,
        )
        .unwrap();

        assert_eq!(config.server.listen, "127.0.0.1:8080");
        let (addr, cert, key) = config.server.tls_listener().unwrap();
        assert_eq!(addr, "127.0.0.1:8443");
        assert_eq!(cert, &PathBuf::from("/etc/frontdoor/cert.pem"));
        assert_eq!(key, &PathBuf::from("/etc/frontdoor/key.pem"));

        assert_eq!(config.sites.source, PathBuf::from("/srv/www"));
        assert_eq!(config.sites.cache_control, "no-cache");

        assert_eq!(config.acme.maintainer_email, "ops@example.org");
        assert_eq!(config.acme.policy_dir, PathBuf::from("/var/lib/frontdoor"));
        assert!(config.acme.staging);
        assert_eq!(config.acme.renew_offset, "-30d");
        assert_eq!(config.acme.renew_stagger, "1d");
        assert_eq!(config.acme.account_key_type, "EC-P384");
        assert_eq!(config.acme.server_key_type, "EC-P256");
        assert_eq!(config.acme.store_module, "greenlock-store-fs");
        assert_eq!(config.acme.challenge_module, "acme-http-01-standalone");

        config.validate().unwrap();
    }

    #[test]
    fn test_unknown_block_is_rejected() {
        let err = FrontDoorConfig::from_kdl("upstreams {\n}\n").unwrap_err();
        assert!(err.to_string().contains("Unknown top-level configuration block"));
    }

    #[test]
    fn test_syntax_error_is_rendered() {
        let err = FrontDoorConfig::from_kdl("acme {\n    staging \"unterminated\n").unwrap_err();
        assert!(err.to_string().contains("KDL configuration parse error"));
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = FrontDoorConfig::from_kdl("").unwrap();
        assert_eq!(config, FrontDoorConfig::default());
    }
}
