//! Field and struct validators used by the `validator` derives.

use std::borrow::Cow;
use std::net::SocketAddr;

use validator::ValidationError;

use crate::server::ServerConfig;

fn error_with_message(code: &'static str, message: String) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Owned(message));
    err
}

/// Validate a socket address string
pub fn validate_socket_addr(addr: &str) -> Result<(), ValidationError> {
    addr.parse::<SocketAddr>().map(|_| ()).map_err(|_| {
        error_with_message(
            "invalid_socket_address",
            format!(
                "Invalid socket address '{}'. Expected format: IP:PORT (e.g., '0.0.0.0:80')",
                addr
            ),
        )
    })
}

/// The HTTPS listener needs an address, a certificate and a key, or none of them
pub fn validate_tls_pair(server: &ServerConfig) -> Result<(), ValidationError> {
    let present = [
        server.tls_listen.is_some(),
        server.tls_cert.is_some(),
        server.tls_key.is_some(),
    ];
    if present.iter().any(|p| *p) && !present.iter().all(|p| *p) {
        return Err(error_with_message(
            "incomplete_tls",
            "tls-listen, tls-cert and tls-key must be set together".to_string(),
        ));
    }

    if let Some(ref addr) = server.tls_listen {
        validate_socket_addr(addr)?;
    }

    Ok(())
}

/// Renewal offset: optionally negative amount with a unit, e.g. `-45d`
pub fn validate_renew_offset(value: &str) -> Result<(), ValidationError> {
    let unsigned = value.strip_prefix('-').unwrap_or(value);
    if is_duration(unsigned) {
        Ok(())
    } else {
        Err(error_with_message(
            "invalid_renew_offset",
            format!("Invalid renew-offset '{}'. Expected e.g. '-45d'", value),
        ))
    }
}

/// Renewal stagger: non-negative amount with a unit, e.g. `3d`
pub fn validate_renew_stagger(value: &str) -> Result<(), ValidationError> {
    if is_duration(value) {
        Ok(())
    } else {
        Err(error_with_message(
            "invalid_renew_stagger",
            format!("Invalid renew-stagger '{}'. Expected e.g. '3d'", value),
        ))
    }
}

/// `<digits><d|h|m|s>`
fn is_duration(value: &str) -> bool {
    let Some(unit) = value.chars().last() else {
        return false;
    };
    let amount = &value[..value.len() - unit.len_utf8()];
    matches!(unit, 'd' | 'h' | 'm' | 's')
        && !amount.is_empty()
        && amount.chars().all(|c| c.is_ascii_digit())
}
