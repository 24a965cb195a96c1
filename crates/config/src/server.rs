//! Listener configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

/// Listener configuration (port binding)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "crate::validation::validate_tls_pair"))]
pub struct ServerConfig {
    /// Plain HTTP socket address
    #[validate(custom(function = "crate::validation::validate_socket_addr"))]
    #[serde(default = "default_listen")]
    pub listen: String,

    /// HTTPS socket address, if TLS is terminated here
    #[serde(default)]
    pub tls_listen: Option<String>,

    /// Certificate chain (PEM) for the HTTPS listener
    #[serde(default)]
    pub tls_cert: Option<PathBuf>,

    /// Private key (PEM) for the HTTPS listener
    #[serde(default)]
    pub tls_key: Option<PathBuf>,

    /// Run in the background
    #[serde(default)]
    pub daemon: bool,

    /// PID file written in daemon mode
    #[serde(default)]
    pub pid_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            tls_listen: None,
            tls_cert: None,
            tls_key: None,
            daemon: false,
            pid_file: None,
        }
    }
}

impl ServerConfig {
    /// Certificate and key paths when an HTTPS listener is configured
    pub fn tls_listener(&self) -> Option<(&str, &PathBuf, &PathBuf)> {
        match (&self.tls_listen, &self.tls_cert, &self.tls_key) {
            (Some(addr), Some(cert), Some(key)) => Some((addr.as_str(), cert, key)),
            _ => None,
        }
    }
}

pub(crate) fn default_listen() -> String {
    "0.0.0.0:80".to_string()
}
