//! Domain registry
//!
//! The registry is the authoritative list of host names this process serves
//! and the handler behind each one. It is built once at startup, then shared
//! read-only with the policy reconciler, the approval gate and the router.
//!
//! Registering a domain always registers its `www.` form too, both
//! pointing at the same handler. Names are registered exactly as given;
//! only the policy reconciler reduces them to roots.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use tracing::{debug, info, warn};

use frontdoor_common::Domain;

use crate::sites::{DiscoveryError, SiteSource};

/// Something that can answer HTTP requests for a site.
///
/// Handlers are opaque to the rest of the server: the router only hands
/// requests to them.
#[async_trait]
pub trait SiteHandler: Send + Sync {
    /// Produce a response for the request
    async fn handle(&self, request: &Request<Bytes>) -> Response<Bytes>;

    /// Short description used in diagnostics
    fn describe(&self) -> String {
        "site handler".to_string()
    }
}

/// A `(domain, handler)` pair supplied by a [`SiteSource`]
#[derive(Clone)]
pub struct SiteRegistration {
    pub domain: Domain,
    pub handler: Arc<dyn SiteHandler>,
}

impl SiteRegistration {
    pub fn new(domain: Domain, handler: Arc<dyn SiteHandler>) -> Self {
        Self { domain, handler }
    }
}

impl fmt::Debug for SiteRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteRegistration")
            .field("domain", &self.domain)
            .field("handler", &self.handler.describe())
            .finish()
    }
}

/// A registered site: the domain it was discovered as, every name it answers to, and its handler
#[derive(Clone)]
pub struct Site {
    pub domain: Domain,
    pub domains: Vec<Domain>,
    pub handler: Arc<dyn SiteHandler>,
}

impl fmt::Debug for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Site")
            .field("domain", &self.domain)
            .field("domains", &self.domains)
            .field("handler", &self.handler.describe())
            .finish()
    }
}

/// Immutable snapshot of every served host name
#[derive(Clone, Default)]
pub struct DomainRegistry {
    sites: Vec<Site>,
    hosts: BTreeMap<Domain, Arc<dyn SiteHandler>>,
}

impl DomainRegistry {
    /// Start building a registry by hand
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Build the registry from a site source.
    ///
    /// Sites the source could not load are logged and skipped; only a
    /// source that cannot be read at all is an error.
    pub fn discover(source: &dyn SiteSource) -> Result<Self, DiscoveryError> {
        let scan = source.scan()?;

        for skipped in &scan.skipped {
            warn!(error = %skipped, "Skipping site");
        }

        let mut builder = Self::builder();
        for registration in scan.loaded {
            info!(
                domain = %registration.domain,
                handler = %registration.handler.describe(),
                "Loaded site"
            );
            builder.register(registration.domain, registration.handler);
        }

        let registry = builder.build();
        info!(
            sites = registry.site_count(),
            hosts = registry.len(),
            skipped = scan.skipped.len(),
            "Site discovery complete"
        );
        Ok(registry)
    }

    /// Whether `host` is a registered name (exact match)
    pub fn contains(&self, host: &str) -> bool {
        self.hosts.contains_key(host)
    }

    /// Handler registered for `host` (exact match)
    pub fn handler_for(&self, host: &str) -> Option<Arc<dyn SiteHandler>> {
        self.hosts.get(host).cloned()
    }

    /// All registered names, bare and `www.` forms, in sorted order
    pub fn domains(&self) -> impl Iterator<Item = &Domain> {
        self.hosts.keys()
    }

    /// Unique root domains in sorted order
    pub fn root_domains(&self) -> Vec<Domain> {
        self.hosts
            .keys()
            .map(Domain::root)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Registered sites in registration order
    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn site_count(&self) -> usize {
        self.sites.len()
    }

    /// Number of registered host names
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

impl fmt::Debug for DomainRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainRegistry")
            .field("hosts", &self.hosts.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Collects registrations, then freezes them into a [`DomainRegistry`]
#[derive(Default)]
pub struct RegistryBuilder {
    sites: Vec<Site>,
    hosts: BTreeMap<Domain, Arc<dyn SiteHandler>>,
}

impl RegistryBuilder {
    /// Register a site under `domain` and its `www.` form.
    ///
    /// The domain is taken as discovered, so `www.a.com` registers
    /// `www.a.com` and `www.www.a.com`. If either name is already taken the
    /// first registration wins.
    pub fn register(&mut self, domain: Domain, handler: Arc<dyn SiteHandler>) -> &mut Self {
        let names = [domain.clone(), domain.www()];

        if let Some(taken) = names.iter().find(|name| self.hosts.contains_key(*name)) {
            warn!(
                domain = %domain,
                conflict = %taken,
                "Domain already registered, keeping the first site"
            );
            return self;
        }

        for name in &names {
            debug!(host = %name, site = %domain, "Registering host");
            self.hosts.insert(name.clone(), Arc::clone(&handler));
        }

        self.sites.push(Site {
            domain,
            domains: names.to_vec(),
            handler,
        });
        self
    }

    /// Freeze the registrations
    pub fn build(self) -> DomainRegistry {
        DomainRegistry {
            sites: self.sites,
            hosts: self.hosts,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::sites::SiteScan;
    use http::StatusCode;

    /// Handler that answers every request with a fixed body
    pub(crate) struct FixedHandler(pub &'static str);

    #[async_trait]
    impl SiteHandler for FixedHandler {
        async fn handle(&self, _request: &Request<Bytes>) -> Response<Bytes> {
            let mut response = Response::new(Bytes::from_static(self.0.as_bytes()));
            *response.status_mut() = StatusCode::OK;
            response
        }

        fn describe(&self) -> String {
            format!("fixed({})", self.0)
        }
    }

    pub(crate) fn domain(name: &str) -> Domain {
        Domain::parse(name).unwrap()
    }

    pub(crate) fn registry_of(names: &[&'static str]) -> DomainRegistry {
        let mut builder = DomainRegistry::builder();
        for name in names {
            builder.register(domain(name), Arc::new(FixedHandler(*name)));
        }
        builder.build()
    }

    struct StaticSource(Vec<&'static str>);

    impl SiteSource for StaticSource {
        fn scan(&self) -> Result<SiteScan, DiscoveryError> {
            Ok(SiteScan {
                loaded: self
                    .0
                    .iter()
                    .map(|name| SiteRegistration::new(domain(name), Arc::new(FixedHandler(*name))))
                    .collect(),
                skipped: Vec::new(),
            })
        }
    }

    #[test]
    fn test_register_adds_root_and_www() {
        let registry = registry_of(&["example.com"]);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.site_count(), 1);
        assert!(registry.contains("example.com"));
        assert!(registry.contains("www.example.com"));
        assert!(!registry.contains("other.com"));

        let root = registry.handler_for("example.com").unwrap();
        let www = registry.handler_for("www.example.com").unwrap();
        assert!(Arc::ptr_eq(&root, &www));
    }

    #[test]
    fn test_www_registration_is_kept_as_discovered() {
        let registry = registry_of(&["www.com"]);

        let names: Vec<&str> = registry.domains().map(Domain::as_str).collect();
        assert_eq!(names, vec!["www.com", "www.www.com"]);
        assert!(!registry.contains("com"));
        assert_eq!(registry.sites()[0].domain.as_str(), "www.com");
    }

    #[test]
    fn test_duplicate_registration_keeps_first() {
        let registry = registry_of(&["a.com", "www.a.com"]);

        assert_eq!(registry.site_count(), 1);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.handler_for("a.com").unwrap().describe(), "fixed(a.com)");
    }

    #[test]
    fn test_root_domains_are_sorted_and_unique() {
        let registry = registry_of(&["b.com", "a.com", "blog.c.org"]);

        let roots: Vec<String> = registry
            .root_domains()
            .into_iter()
            .map(Domain::into_string)
            .collect();
        assert_eq!(roots, vec!["a.com", "b.com", "blog.c.org"]);
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let registry = registry_of(&["example.com"]);
        assert!(!registry.contains("Example.com"));
    }

    #[test]
    fn test_discover_from_source() {
        let registry = DomainRegistry::discover(&StaticSource(vec!["x.com", "y.org"])).unwrap();

        assert_eq!(registry.site_count(), 2);
        assert_eq!(registry.len(), 4);
        assert!(registry.contains("www.y.org"));
    }

    #[tokio::test]
    async fn test_handler_dispatch() {
        let registry = registry_of(&["example.com"]);
        let handler = registry.handler_for("www.example.com").unwrap();

        let request = Request::get("/").body(Bytes::new()).unwrap();
        let response = handler.handle(&request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body(), &Bytes::from_static(b"example.com"));
    }
}
