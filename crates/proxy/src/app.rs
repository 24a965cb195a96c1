//! Startup sequence
//!
//! Discovery, reconciliation and wiring run once, in order, before the
//! server accepts connections. The registry snapshot built here is shared
//! read-only by everything that runs afterwards.

use std::sync::Arc;

use tracing::{error, info, warn};

use frontdoor_common::{FrontDoorError, FrontDoorResult};
use frontdoor_config::FrontDoorConfig;

use crate::approval::DomainApprovalGate;
use crate::policy::{PolicyDefaults, PolicyStore, ReconcileOutcome};
use crate::registry::DomainRegistry;
use crate::routing::HostRouter;
use crate::service::FrontDoorService;
use crate::sites::{DirectorySiteSource, SiteSource};

/// A bootstrapped front door
#[derive(Debug)]
pub struct FrontDoor {
    config: FrontDoorConfig,
    registry: Arc<DomainRegistry>,
    router: HostRouter,
    approval_gate: DomainApprovalGate,
    policy_outcome: ReconcileOutcome,
}

impl FrontDoor {
    /// Bootstrap from the site directory named in the configuration
    pub fn bootstrap(config: FrontDoorConfig) -> FrontDoorResult<Self> {
        let source = site_source(&config);
        Self::bootstrap_with_source(config, &source)
    }

    /// Bootstrap with an explicit site source.
    ///
    /// Fails on an invalid configuration, an unreadable site source, a
    /// corrupt policy document or a failed policy write.
    pub fn bootstrap_with_source(
        config: FrontDoorConfig,
        source: &dyn SiteSource,
    ) -> FrontDoorResult<Self> {
        config.validate()?;

        info!(
            directory = config.acme.directory_url(),
            staging = config.acme.staging,
            "Certificate authority selected"
        );

        let registry = Arc::new(DomainRegistry::discover(source).map_err(|e| {
            error!(error = %e, "Site discovery failed");
            FrontDoorError::from(e)
        })?);
        if registry.is_empty() {
            warn!("No sites discovered, every request will be answered with 404");
        }

        let store = PolicyStore::new(&config.acme.policy_dir);
        let defaults = PolicyDefaults::from_acme(&config.acme);
        let policy_outcome = store.reconcile(&registry, &defaults).map_err(|e| {
            error!(path = %store.path().display(), error = %e, "Certificate policy reconciliation failed");
            FrontDoorError::from(e)
        })?;

        let router = HostRouter::new(Arc::clone(&registry));
        let approval_gate =
            DomainApprovalGate::new(Arc::clone(&registry), config.acme.maintainer_email.clone());

        Ok(Self {
            config,
            registry,
            router,
            approval_gate,
            policy_outcome,
        })
    }

    pub fn config(&self) -> &FrontDoorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<DomainRegistry> {
        &self.registry
    }

    pub fn router(&self) -> &HostRouter {
        &self.router
    }

    pub fn approval_gate(&self) -> &DomainApprovalGate {
        &self.approval_gate
    }

    /// What reconciliation did to the policy document at startup
    pub fn policy_outcome(&self) -> &ReconcileOutcome {
        &self.policy_outcome
    }

    /// Pingora service answering requests for the registered sites
    pub fn service(&self) -> FrontDoorService {
        FrontDoorService::new(self.router.clone())
    }
}

/// Directory site source described by the configuration
pub fn site_source(config: &FrontDoorConfig) -> DirectorySiteSource {
    DirectorySiteSource::new(&config.sites.source)
        .with_cache_control(config.sites.cache_control.clone())
}
