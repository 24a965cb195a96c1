//! Host routing
//!
//! `www.` hosts are permanently redirected to their root form over HTTPS.
//! Every other host is looked up by exact name in the registry.

use std::fmt;
use std::sync::Arc;

use http::StatusCode;
use tracing::trace;

use frontdoor_common::WWW_PREFIX;

use crate::registry::{DomainRegistry, SiteHandler};

/// What to do with a request
#[derive(Clone)]
pub enum RoutingOutcome {
    /// Send the client elsewhere
    Redirect { status: StatusCode, location: String },
    /// Hand the request to a site
    Dispatch(Arc<dyn SiteHandler>),
    /// No site answers to this host
    NotFound,
}

impl RoutingOutcome {
    /// Short label for access logs
    pub fn label(&self) -> &'static str {
        match self {
            RoutingOutcome::Redirect { .. } => "redirect",
            RoutingOutcome::Dispatch(_) => "dispatch",
            RoutingOutcome::NotFound => "not_found",
        }
    }
}

impl fmt::Debug for RoutingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingOutcome::Redirect { status, location } => f
                .debug_struct("Redirect")
                .field("status", status)
                .field("location", location)
                .finish(),
            RoutingOutcome::Dispatch(handler) => {
                f.debug_tuple("Dispatch").field(&handler.describe()).finish()
            }
            RoutingOutcome::NotFound => f.write_str("NotFound"),
        }
    }
}

/// Maps `(host, path)` to a [`RoutingOutcome`]
#[derive(Debug, Clone)]
pub struct HostRouter {
    registry: Arc<DomainRegistry>,
}

impl HostRouter {
    pub fn new(registry: Arc<DomainRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &DomainRegistry {
        &self.registry
    }

    /// Route a request.
    ///
    /// `host` is the `Host` header exactly as received; `path` is the path
    /// and query. Matching is case-sensitive.
    pub fn route(&self, host: &str, path: &str) -> RoutingOutcome {
        if let Some(root) = host.strip_prefix(WWW_PREFIX) {
            if root.is_empty() || root.starts_with(':') {
                trace!(host = %host, "Bare www host");
                return RoutingOutcome::NotFound;
            }
            let path = if path.is_empty() { "/" } else { path };
            return RoutingOutcome::Redirect {
                status: StatusCode::MOVED_PERMANENTLY,
                location: format!("https://{}{}", root, path),
            };
        }

        let name = strip_port(host);
        if name.is_empty() {
            return RoutingOutcome::NotFound;
        }

        match self.registry.handler_for(name) {
            Some(handler) => RoutingOutcome::Dispatch(handler),
            None => {
                trace!(host = %host, "No site registered for host");
                RoutingOutcome::NotFound
            }
        }
    }
}

/// Drop a trailing `:port`
fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::registry_of;

    fn router() -> HostRouter {
        HostRouter::new(Arc::new(registry_of(&["a.com", "blog.b.org"])))
    }

    fn location(outcome: RoutingOutcome) -> (StatusCode, String) {
        match outcome {
            RoutingOutcome::Redirect { status, location } => (status, location),
            other => panic!("expected redirect, got {:?}", other),
        }
    }

    #[test]
    fn test_www_redirects_to_root() {
        let (status, loc) = location(router().route("www.a.com", "/p"));
        assert_eq!(status, StatusCode::MOVED_PERMANENTLY);
        assert_eq!(loc, "https://a.com/p");
    }

    #[test]
    fn test_redirect_keeps_query_and_port() {
        assert_eq!(
            location(router().route("www.a.com:8080", "/p?q=1")).1,
            "https://a.com:8080/p?q=1"
        );
        assert_eq!(location(router().route("www.a.com", "")).1, "https://a.com/");
    }

    #[test]
    fn test_redirect_strips_one_prefix_only() {
        assert_eq!(
            location(router().route("www.www.a.com", "/")).1,
            "https://www.a.com/"
        );
    }

    #[test]
    fn test_redirect_does_not_need_registration() {
        assert_eq!(
            location(router().route("www.unknown.net", "/x")).1,
            "https://unknown.net/x"
        );
    }

    #[test]
    fn test_dispatch_exact_host() {
        let router = router();
        let expected = router.registry().handler_for("a.com").unwrap();

        match router.route("a.com", "/p") {
            RoutingOutcome::Dispatch(handler) => assert!(Arc::ptr_eq(&handler, &expected)),
            other => panic!("expected dispatch, got {:?}", other),
        }
        assert_eq!(router.route("a.com:8443", "/").label(), "dispatch");
        assert_eq!(router.route("blog.b.org", "/").label(), "dispatch");
    }

    #[test]
    fn test_not_found() {
        let router = router();
        assert_eq!(router.route("c.com", "/").label(), "not_found");
        assert_eq!(router.route("A.com", "/").label(), "not_found");
        assert_eq!(router.route("sub.a.com", "/").label(), "not_found");
        assert_eq!(router.route("", "/").label(), "not_found");
        assert_eq!(router.route("www.", "/").label(), "not_found");
        assert_eq!(router.route("www.:80", "/").label(), "not_found");
    }

    #[test]
    fn test_strip_port() {
        assert_eq!(strip_port("a.com:80"), "a.com");
        assert_eq!(strip_port("a.com"), "a.com");
        assert_eq!(strip_port("a.com:"), "a.com:");
        assert_eq!(strip_port("[::1]:8080"), "[::1]");
    }
}
