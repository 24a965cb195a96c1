//! Policy document model and the pure merge logic.

use std::collections::BTreeMap;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;

use frontdoor_common::Domain;
use frontdoor_config::AcmeConfig;

use crate::registry::DomainRegistry;

use super::error::PolicyError;

/// Challenge type key used in the defaults block
pub const HTTP_01: &str = "http-01";

/// Certificate store backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub module: String,
    #[serde(rename = "basePath")]
    pub base_path: String,
}

/// Challenge backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeConfig {
    pub module: String,
}

/// Issuance settings shared by every site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDefaults {
    pub store: StoreConfig,
    pub challenges: BTreeMap<String, ChallengeConfig>,
    pub renew_offset: String,
    pub renew_stagger: String,
    pub account_key_type: String,
    pub server_key_type: String,
    pub subscriber_email: String,
}

impl PolicyDefaults {
    /// Defaults derived from the ACME configuration
    pub fn from_acme(acme: &AcmeConfig) -> Self {
        let mut challenges = BTreeMap::new();
        challenges.insert(
            HTTP_01.to_string(),
            ChallengeConfig {
                module: acme.challenge_module.clone(),
            },
        );

        Self {
            store: StoreConfig {
                module: acme.store_module.clone(),
                base_path: acme.policy_dir.display().to_string(),
            },
            challenges,
            renew_offset: acme.renew_offset.clone(),
            renew_stagger: acme.renew_stagger.clone(),
            account_key_type: acme.account_key_type.clone(),
            server_key_type: acme.server_key_type.clone(),
            subscriber_email: acme.maintainer_email.clone(),
        }
    }
}

/// When the certificate automation intends to renew, in Unix milliseconds.
///
/// Zero means "not scheduled" and is treated the same as absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenewAt(u64);

impl RenewAt {
    pub fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    pub fn is_set(&self) -> bool {
        self.0 > 0
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.0)
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
    }
}

/// One certificate: a root domain and the names it covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteCertEntry {
    pub subject: Domain,
    /// Names as recorded. The certificate automation may list names this
    /// server never generates, such as wildcards, so they are not validated.
    #[serde(default)]
    pub altnames: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renew_at: Option<RenewAt>,
}

/// The persisted policy document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificatePolicyDocument {
    pub defaults: PolicyDefaults,
    #[serde(default)]
    pub sites: Vec<SiteCertEntry>,
}

impl CertificatePolicyDocument {
    /// Deterministic two-space-indented JSON.
    ///
    /// Field order follows the struct definitions, so equal documents
    /// always produce identical bytes.
    pub fn to_canonical_json(&self) -> Result<String, PolicyError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a document; any deviation from the schema is an error
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Entry for `subject`, if present
    pub fn site(&self, subject: &str) -> Option<&SiteCertEntry> {
        self.sites.iter().find(|site| site.subject.as_str() == subject)
    }

    pub fn subjects(&self) -> impl Iterator<Item = &Domain> {
        self.sites.iter().map(|site| &site.subject)
    }
}

/// Alternate names for a root domain.
///
/// The `www.` form is only added for names with fewer than two dots, so
/// `example.com` gets `www.example.com` but `blog.example.com` does not.
pub fn altnames_for(root: &Domain) -> Vec<Domain> {
    let mut altnames = vec![root.clone()];
    if root.interior_dots() < 2 {
        altnames.push(root.www());
    }
    altnames
}

/// Build the target document for the registry, keeping renewal times from
/// `existing` for subjects that are still served.
pub fn build_policy(
    registry: &DomainRegistry,
    defaults: &PolicyDefaults,
    existing: Option<&CertificatePolicyDocument>,
) -> CertificatePolicyDocument {
    // First entry wins if a subject appears twice
    let mut renewals: HashMap<&str, RenewAt> = HashMap::new();
    for site in existing.map(|doc| doc.sites.as_slice()).unwrap_or_default() {
        if let Some(renew_at) = site.renew_at.filter(RenewAt::is_set) {
            renewals.entry(site.subject.as_str()).or_insert(renew_at);
        }
    }

    let sites = registry
        .root_domains()
        .into_iter()
        .map(|subject| {
            let renew_at = renewals.get(subject.as_str()).copied();
            trace!(subject = %subject, renew_at = ?renew_at, "Built certificate entry");
            SiteCertEntry {
                altnames: altnames_for(&subject)
                    .into_iter()
                    .map(Domain::into_string)
                    .collect(),
                subject,
                renew_at,
            }
        })
        .collect();

    CertificatePolicyDocument {
        defaults: defaults.clone(),
        sites,
    }
}

/// Merge the registry into `existing` and report whether anything changed.
///
/// `changed` compares canonical serializations, so a document that only
/// differs in formatting on disk counts as unchanged.
pub fn reconcile(
    registry: &DomainRegistry,
    defaults: &PolicyDefaults,
    existing: Option<&CertificatePolicyDocument>,
) -> Result<(CertificatePolicyDocument, bool), PolicyError> {
    let document = build_policy(registry, defaults, existing);

    let changed = match existing {
        Some(previous) => previous.to_canonical_json()? != document.to_canonical_json()?,
        None => true,
    };

    Ok((document, changed))
}
