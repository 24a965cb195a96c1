//! Frontdoor Proxy Library
//!
//! A multi-tenant front door built on Pingora. At startup it discovers the
//! sites it serves, keeps the certificate policy document in step with them,
//! and then answers HTTP requests by host name.
//!
//! - **Registry**: the immutable set of served host names and their handlers
//! - **Policy**: reconciliation of the certificate policy document on disk
//! - **Approval**: the allowlist check behind every certificate request
//! - **Routing**: `www.` redirects and exact-host dispatch
//!
//! # Example
//!
//! ```ignore
//! use frontdoor_config::FrontDoorConfig;
//! use frontdoor_proxy::{ApprovalRequest, DomainApprover, FrontDoor};
//!
//! let front_door = FrontDoor::bootstrap(FrontDoorConfig::default())?;
//! let decision = front_door
//!     .approval_gate()
//!     .approve(&ApprovalRequest::new("example.com"), None)?;
//! ```

// ============================================================================
// Module Declarations
// ============================================================================

pub mod app;
pub mod approval;
pub mod http_helpers;
pub mod policy;
pub mod registry;
pub mod routing;
pub mod service;
pub mod sites;
pub mod static_site;

// ============================================================================
// Public API Re-exports
// ============================================================================

// Startup
pub use app::{site_source, FrontDoor};

// Domain registry
pub use registry::{DomainRegistry, RegistryBuilder, Site, SiteHandler, SiteRegistration};
pub use sites::{DirectorySiteSource, DiscoveryError, SiteLoadError, SiteScan, SiteSource};
pub use static_site::StaticSite;

// Certificate policy
pub use policy::{
    CertificatePolicyDocument, PolicyDefaults, PolicyError, PolicyStore, ReconcileOutcome,
    RenewAt, SiteCertEntry,
};

// Approval
pub use approval::{
    approve, ApprovalDecision, ApprovalError, ApprovalRequest, DomainApprovalGate,
    DomainApprover, ExistingCertificate, IssuanceOptions,
};

// Routing
pub use routing::{HostRouter, RoutingOutcome};

// Pingora service
pub use service::{respond, FrontDoorService, RequestContext};
