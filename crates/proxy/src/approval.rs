//! Domain approval gate
//!
//! The certificate automation asks before every issuance or renewal. Two
//! call shapes reach the gate:
//!
//! - **Renewal**: an existing certificate is supplied. Its recorded altnames
//!   were vetted when it was first issued, so they are approved as-is.
//! - **Fresh issuance**: no certificate yet. The requested domain must be a
//!   name the registry serves, otherwise the request is rejected.
//!
//! This is the only thing standing between an attacker-controlled `Host`
//! header and a certificate for an arbitrary name.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use frontdoor_common::{Domain, FrontDoorError};

use crate::registry::DomainRegistry;

/// Options the certificate automation will issue with
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuanceOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub agree_tos: bool,
}

/// One approval callback invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Name the automation wants a certificate for
    pub domain: String,
    #[serde(default)]
    pub options: IssuanceOptions,
}

impl ApprovalRequest {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            options: IssuanceOptions::default(),
        }
    }
}

/// Certificate the automation already holds for the request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistingCertificate {
    #[serde(default)]
    pub subject: String,
    pub altnames: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Approval payload handed back to the certificate automation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub options: IssuanceOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certs: Option<ExistingCertificate>,
}

impl ApprovalDecision {
    /// Names the certificate will cover
    pub fn domains(&self) -> &[String] {
        &self.options.domains
    }

    /// Whether this approval renews an existing certificate
    pub fn is_renewal(&self) -> bool {
        self.certs.is_some()
    }
}

/// Why a request was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApprovalError {
    #[error("domain {0} is not served by this front door")]
    DomainNotApproved(String),
}

impl From<ApprovalError> for FrontDoorError {
    fn from(err: ApprovalError) -> Self {
        match err {
            ApprovalError::DomainNotApproved(domain) => FrontDoorError::DomainNotApproved { domain },
        }
    }
}

/// Decide whether a certificate request may proceed.
///
/// Stateless: the outcome depends only on the arguments.
pub fn approve(
    request: &ApprovalRequest,
    existing: Option<&ExistingCertificate>,
    registry: &DomainRegistry,
    contact: &str,
) -> Result<ApprovalDecision, ApprovalError> {
    if let Some(cert) = existing {
        debug!(
            domain = %request.domain,
            subject = %cert.subject,
            altnames = ?cert.altnames,
            "Approving renewal of existing certificate"
        );
        let mut options = request.options.clone();
        options.domains = cert.altnames.clone();
        return Ok(ApprovalDecision {
            options,
            certs: Some(cert.clone()),
        });
    }

    let served = Domain::parse(&request.domain)
        .ok()
        .filter(|domain| registry.contains(domain.as_str()));

    let Some(domain) = served else {
        warn!(domain = %request.domain, "Rejected certificate request for unserved domain");
        return Err(ApprovalError::DomainNotApproved(request.domain.clone()));
    };

    info!(domain = %domain, "Approved certificate issuance");
    let options = IssuanceOptions {
        domains: vec![domain.into_string()],
        email: Some(contact.to_string()),
        agree_tos: true,
        ..request.options.clone()
    };
    Ok(ApprovalDecision {
        options,
        certs: None,
    })
}

/// The approval callback as seen by the certificate automation
pub trait DomainApprover: Send + Sync {
    fn approve(
        &self,
        request: &ApprovalRequest,
        existing: Option<&ExistingCertificate>,
    ) -> Result<ApprovalDecision, ApprovalError>;
}

/// Approval gate backed by the startup registry snapshot
#[derive(Debug, Clone)]
pub struct DomainApprovalGate {
    registry: Arc<DomainRegistry>,
    contact: String,
}

impl DomainApprovalGate {
    pub fn new(registry: Arc<DomainRegistry>, contact: impl Into<String>) -> Self {
        Self {
            registry,
            contact: contact.into(),
        }
    }

    /// Contact address attached to fresh issuance requests
    pub fn contact(&self) -> &str {
        &self.contact
    }
}

impl DomainApprover for DomainApprovalGate {
    fn approve(
        &self,
        request: &ApprovalRequest,
        existing: Option<&ExistingCertificate>,
    ) -> Result<ApprovalDecision, ApprovalError> {
        approve(request, existing, &self.registry, &self.contact)
    }
}
