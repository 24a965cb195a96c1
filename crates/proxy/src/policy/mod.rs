//! Certificate policy document
//!
//! The policy document is the file the external certificate automation reads
//! to learn which certificates to keep: one entry per served root domain,
//! with its alternate names and the renewal timestamp the automation
//! recorded last time it renewed.
//!
//! # Reconciliation
//!
//! On every start the document is rebuilt from the domain registry and merged
//! with the copy on disk:
//!
//! 1. Root domains come from the registry, `www.` forms folded in
//! 2. Each root gets `[root, www.root]` as altnames, or just `[root]` for
//!    deeper subdomains
//! 3. A `renewAt` already on disk for the same subject is carried over
//! 4. The document is written only if its canonical JSON changed
//!
//! A document on disk that fails to parse aborts reconciliation instead of
//! being overwritten, so recorded renewal state is never silently lost.
//!
//! # Example
//!
//! ```json
//! {
//!   "defaults": {
//!     "store": { "module": "greenlock-store-fs", "basePath": "/var/lib/frontdoor" },
//!     "challenges": { "http-01": { "module": "acme-http-01-standalone" } },
//!     "renewOffset": "-45d",
//!     "renewStagger": "3d",
//!     "accountKeyType": "EC-P256",
//!     "serverKeyType": "RSA-2048",
//!     "subscriberEmail": "admin@example.com"
//!   },
//!   "sites": [
//!     { "subject": "example.com", "altnames": ["example.com", "www.example.com"], "renewAt": 1735689600000 }
//!   ]
//! }
//! ```

mod document;
mod error;
mod store;

pub use document::{
    altnames_for, build_policy, reconcile, CertificatePolicyDocument, ChallengeConfig,
    PolicyDefaults, RenewAt, SiteCertEntry, StoreConfig, HTTP_01,
};
pub use error::PolicyError;
pub use store::{PolicyStore, ReconcileOutcome};
