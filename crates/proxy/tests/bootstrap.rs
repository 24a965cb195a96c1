//! Startup Integration Tests
//!
//! Drives the full startup sequence against a temporary site tree and
//! policy directory: discovery, policy reconciliation, approval and routing.

use std::fs;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use http::{Request, StatusCode};
use tempfile::TempDir;

use frontdoor_common::FrontDoorError;
use frontdoor_config::FrontDoorConfig;
use frontdoor_proxy::{
    ApprovalRequest, CertificatePolicyDocument, DomainApprover, ExistingCertificate, FrontDoor,
    RoutingOutcome, SiteHandler,
};

/// A site tree and policy directory inside one temp dir
struct Fixture {
    _temp_dir: TempDir,
    sites: PathBuf,
    policy_dir: PathBuf,
}

impl Fixture {
    fn new(sites: &[&str]) -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let fixture = Self {
            sites: temp_dir.path().join("www"),
            policy_dir: temp_dir.path().join("greenlock.d"),
            _temp_dir: temp_dir,
        };
        fs::create_dir_all(&fixture.sites).unwrap();
        for site in sites {
            fixture.add_site(site);
        }
        fixture
    }

    fn add_site(&self, name: &str) {
        let public = self.sites.join(name).join("public");
        fs::create_dir_all(&public).unwrap();
        fs::write(public.join("index.html"), format!("<h1>{}</h1>", name)).unwrap();
    }

    fn remove_site(&self, name: &str) {
        fs::remove_dir_all(self.sites.join(name)).unwrap();
    }

    fn config(&self) -> FrontDoorConfig {
        let mut config = FrontDoorConfig::default();
        config.sites.source = self.sites.clone();
        config.acme.policy_dir = self.policy_dir.clone();
        config.acme.maintainer_email = "ops@example.org".to_string();
        config
    }

    fn policy_path(&self) -> PathBuf {
        self.policy_dir.join("config.json")
    }

    fn bootstrap(&self) -> Result<FrontDoor, FrontDoorError> {
        FrontDoor::bootstrap(self.config())
    }
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

// ============================================================================
// Policy Reconciliation
// ============================================================================

mod reconciliation {
    use super::*;

    #[test]
    fn test_first_start_creates_policy() {
        let fixture = Fixture::new(&["a.com", "blog.b.org"]);
        let front_door = fixture.bootstrap().unwrap();

        let outcome = front_door.policy_outcome();
        assert!(outcome.created);
        assert!(outcome.changed);

        let document = CertificatePolicyDocument::from_json(&read(&fixture.policy_path())).unwrap();
        let subjects: Vec<&str> = document.subjects().map(|s| s.as_str()).collect();
        assert_eq!(subjects, vec!["a.com", "blog.b.org"]);
        assert_eq!(document.site("a.com").unwrap().altnames.len(), 2);
        assert_eq!(document.site("blog.b.org").unwrap().altnames.len(), 1);
        assert_eq!(document.defaults.subscriber_email, "ops@example.org");
        assert_eq!(
            document.defaults.store.base_path,
            fixture.policy_dir.display().to_string()
        );
    }

    #[test]
    fn test_restart_is_idempotent() {
        let fixture = Fixture::new(&["a.com", "c.net"]);
        fixture.bootstrap().unwrap();
        let first = read(&fixture.policy_path());

        let front_door = fixture.bootstrap().unwrap();
        assert!(!front_door.policy_outcome().changed);
        assert!(!front_door.policy_outcome().created);
        assert_eq!(read(&fixture.policy_path()), first);
    }

    #[test]
    fn test_renewal_state_survives_restart() {
        let fixture = Fixture::new(&["a.com", "old.com"]);
        fixture.bootstrap().unwrap();

        // The certificate automation records a renewal time
        let renewed = read(&fixture.policy_path()).replacen(
            "\"subject\": \"a.com\",",
            "\"subject\": \"a.com\",\n      \"renewAt\": 1735689600000,",
            1,
        );
        fs::write(fixture.policy_path(), renewed).unwrap();

        fixture.remove_site("old.com");
        fixture.add_site("new.com");

        let front_door = fixture.bootstrap().unwrap();
        let outcome = front_door.policy_outcome();
        assert!(outcome.changed);
        assert_eq!(outcome.dropped.len(), 1);
        assert_eq!(outcome.dropped[0].as_str(), "old.com");

        let document = CertificatePolicyDocument::from_json(&read(&fixture.policy_path())).unwrap();
        assert_eq!(
            document.site("a.com").unwrap().renew_at.map(|r| r.as_millis()),
            Some(1_735_689_600_000)
        );
        assert!(document.site("new.com").is_some());
        assert!(document.site("old.com").is_none());
    }

    #[test]
    fn test_corrupt_policy_aborts_startup() {
        let fixture = Fixture::new(&["a.com"]);
        fs::create_dir_all(&fixture.policy_dir).unwrap();
        fs::write(fixture.policy_path(), "{\"defaults\": ").unwrap();

        let err = fixture.bootstrap().unwrap_err();
        assert!(matches!(err, FrontDoorError::PolicyCorrupt { .. }));
        assert!(err.is_fatal());
        assert_eq!(read(&fixture.policy_path()), "{\"defaults\": ");
    }
}

// ============================================================================
// Startup Failures
// ============================================================================

mod startup {
    use super::*;

    #[test]
    fn test_unreadable_site_source_is_fatal() {
        let fixture = Fixture::new(&[]);
        let mut config = fixture.config();
        config.sites.source = fixture.sites.join("missing");

        let err = FrontDoor::bootstrap(config).unwrap_err();
        assert!(matches!(err, FrontDoorError::Discovery { .. }));
        assert!(!fixture.policy_path().exists());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let fixture = Fixture::new(&["a.com"]);
        let mut config = fixture.config();
        config.acme.maintainer_email = "not-an-email".to_string();

        let err = FrontDoor::bootstrap(config).unwrap_err();
        assert!(matches!(err, FrontDoorError::Config { .. }));
    }

    #[test]
    fn test_broken_sites_are_skipped() {
        let fixture = Fixture::new(&["a.com"]);
        fs::create_dir_all(fixture.sites.join("nopublic.com")).unwrap();

        let front_door = fixture.bootstrap().unwrap();
        assert_eq!(front_door.registry().site_count(), 1);
        assert!(!front_door.registry().contains("nopublic.com"));
    }
}

// ============================================================================
// Approval and Routing
// ============================================================================

mod serving {
    use super::*;

    #[test]
    fn test_approval_uses_discovered_sites() {
        let fixture = Fixture::new(&["y.com"]);
        let front_door = fixture.bootstrap().unwrap();
        let gate = front_door.approval_gate();

        let decision = gate.approve(&ApprovalRequest::new("www.y.com"), None).unwrap();
        assert_eq!(decision.domains(), ["www.y.com"]);
        assert_eq!(decision.options.email.as_deref(), Some("ops@example.org"));

        assert!(gate.approve(&ApprovalRequest::new("z.com"), None).is_err());

        let cert = ExistingCertificate {
            subject: "x.com".to_string(),
            altnames: vec!["x.com".to_string(), "www.x.com".to_string()],
            issued_at: None,
            expires_at: None,
        };
        let decision = gate.approve(&ApprovalRequest::new("x.com"), Some(&cert)).unwrap();
        assert_eq!(decision.domains(), ["x.com", "www.x.com"]);
    }

    #[tokio::test]
    async fn test_routing_reaches_static_site() {
        let fixture = Fixture::new(&["a.com"]);
        let front_door = fixture.bootstrap().unwrap();
        let router = front_door.router();

        match router.route("www.a.com", "/p") {
            RoutingOutcome::Redirect { status, location } => {
                assert_eq!(status, StatusCode::MOVED_PERMANENTLY);
                assert_eq!(location, "https://a.com/p");
            }
            other => panic!("expected redirect, got {:?}", other),
        }

        let RoutingOutcome::Dispatch(handler) = router.route("a.com", "/") else {
            panic!("expected dispatch");
        };
        let request = Request::get("/").body(Bytes::new()).unwrap();
        let response = handler.handle(&request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body(), &Bytes::from_static(b"<h1>a.com</h1>"));

        assert!(matches!(router.route("b.com", "/"), RoutingOutcome::NotFound));
    }
}
