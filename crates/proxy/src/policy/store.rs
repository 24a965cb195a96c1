//! On-disk policy document
//!
//! # Directory Structure
//!
//! ```text
//! greenlock.d/
//! ├── config.json        # Certificate policy document
//! └── config.json.lock   # Held while a reconciliation runs
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, trace, warn};

use frontdoor_common::Domain;
use frontdoor_config::acme::POLICY_FILE_NAME;

use crate::registry::DomainRegistry;

use super::document::{self, CertificatePolicyDocument, PolicyDefaults};
use super::error::PolicyError;

/// Result of one reconciliation against the store
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    /// The document now on disk
    pub document: CertificatePolicyDocument,
    /// Whether the file was (re)written
    pub changed: bool,
    /// Whether no document existed before
    pub created: bool,
    /// Subjects present before but no longer served
    pub dropped: Vec<Domain>,
}

/// Reads and atomically rewrites the policy document
#[derive(Debug, Clone)]
pub struct PolicyStore {
    dir: PathBuf,
    path: PathBuf,
    lock_path: PathBuf,
}

impl PolicyStore {
    /// Store for `<dir>/config.json`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let path = dir.join(POLICY_FILE_NAME);
        let lock_path = dir.join(format!("{}.lock", POLICY_FILE_NAME));
        Self {
            dir,
            path,
            lock_path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load the current document.
    ///
    /// A missing file is `Ok(None)`. A file that exists but does not parse
    /// is [`PolicyError::Corrupt`].
    pub fn load(&self) -> Result<Option<CertificatePolicyDocument>, PolicyError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                trace!(path = %self.path.display(), "No certificate policy document yet");
                return Ok(None);
            }
            Err(e) => return Err(self.persistence(e)),
        };

        let document = CertificatePolicyDocument::from_json(&content).map_err(|source| {
            PolicyError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })?;

        debug!(
            path = %self.path.display(),
            sites = document.sites.len(),
            "Loaded certificate policy document"
        );
        Ok(Some(document))
    }

    /// Merge the registry into the stored document and write it if it changed.
    ///
    /// The store lock is held from the read through the write. A corrupt
    /// document is left untouched and the error is returned.
    pub fn reconcile(
        &self,
        registry: &DomainRegistry,
        defaults: &PolicyDefaults,
    ) -> Result<ReconcileOutcome, PolicyError> {
        self.ensure_dir()?;
        let _lock = self.lock()?;

        let existing = self.load()?;
        let (document, changed) = document::reconcile(registry, defaults, existing.as_ref())?;

        let dropped: Vec<Domain> = existing
            .as_ref()
            .map(|previous| {
                previous
                    .subjects()
                    .filter(|subject| document.site(subject.as_str()).is_none())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if changed {
            self.write(&document)?;
        }

        let created = existing.is_none();
        for subject in &dropped {
            info!(subject = %subject, "Dropped certificate entry for site no longer served");
        }
        if created {
            info!(
                path = %self.path.display(),
                sites = document.sites.len(),
                "Created certificate policy document"
            );
        } else if changed {
            info!(
                path = %self.path.display(),
                sites = document.sites.len(),
                dropped = dropped.len(),
                "Updated certificate policy document"
            );
        } else {
            info!(
                path = %self.path.display(),
                sites = document.sites.len(),
                "Certificate policy document unchanged"
            );
        }

        Ok(ReconcileOutcome {
            document,
            changed,
            created,
            dropped,
        })
    }

    /// Write via a temporary file in the same directory, then rename.
    ///
    /// The replacement keeps the permissions of the file it replaces.
    fn write(&self, document: &CertificatePolicyDocument) -> Result<(), PolicyError> {
        let json = document.to_canonical_json()?;

        let mut temp = NamedTempFile::new_in(&self.dir).map_err(|e| self.persistence(e))?;
        match fs::metadata(&self.path) {
            Ok(previous) => temp
                .as_file()
                .set_permissions(previous.permissions())
                .map_err(|e| self.persistence(e))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(self.persistence(e)),
        }
        temp.write_all(json.as_bytes())
            .map_err(|e| self.persistence(e))?;
        temp.as_file().sync_all().map_err(|e| self.persistence(e))?;
        temp.persist(&self.path)
            .map_err(|e| self.persistence(e.error))?;

        // Make the rename itself durable
        #[cfg(unix)]
        File::open(&self.dir)
            .and_then(|dir| dir.sync_all())
            .map_err(|e| self.persistence(e))?;

        debug!(path = %self.path.display(), bytes = json.len(), "Wrote certificate policy document");
        Ok(())
    }

    fn ensure_dir(&self) -> Result<(), PolicyError> {
        if self.dir.is_dir() {
            return Ok(());
        }

        fs::create_dir_all(&self.dir).map_err(|e| self.persistence(e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.dir, fs::Permissions::from_mode(0o700))
                .map_err(|e| self.persistence(e))?;
        }

        info!(path = %self.dir.display(), "Created certificate policy directory");
        Ok(())
    }

    #[cfg(unix)]
    fn lock(&self) -> Result<nix::fcntl::Flock<File>, PolicyError> {
        use nix::fcntl::{Flock, FlockArg};

        let file = self.open_lock_file()?;
        Flock::lock(file, FlockArg::LockExclusive)
            .map_err(|(_, errno)| self.persistence(io::Error::from(errno)))
    }

    #[cfg(not(unix))]
    fn lock(&self) -> Result<File, PolicyError> {
        warn!("Advisory locking is unavailable on this platform");
        self.open_lock_file()
    }

    fn open_lock_file(&self) -> Result<File, PolicyError> {
        OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .map_err(|e| {
                warn!(path = %self.lock_path.display(), error = %e, "Cannot open policy lock file");
                self.persistence(e)
            })
    }

    fn persistence(&self, source: io::Error) -> PolicyError {
        PolicyError::Persistence {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::RenewAt;
    use crate::registry::tests::registry_of;
    use frontdoor_config::AcmeConfig;
    use tempfile::TempDir;

    fn defaults(dir: &Path) -> PolicyDefaults {
        PolicyDefaults::from_acme(&AcmeConfig {
            policy_dir: dir.to_path_buf(),
            maintainer_email: "ops@example.org".to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_creates_document_and_directory() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("greenlock.d");
        let store = PolicyStore::new(&dir);

        let outcome = store
            .reconcile(&registry_of(&["a.com", "sub.b.com"]), &defaults(&dir))
            .unwrap();

        assert!(outcome.created);
        assert!(outcome.changed);
        assert!(outcome.dropped.is_empty());
        assert_eq!(store.path(), dir.join("config.json"));

        let on_disk = fs::read_to_string(store.path()).unwrap();
        assert_eq!(on_disk, outcome.document.to_canonical_json().unwrap());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&dir).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }

    #[test]
    fn test_second_run_does_not_write() {
        let temp_dir = TempDir::new().unwrap();
        let store = PolicyStore::new(temp_dir.path());
        let registry = registry_of(&["a.com"]);
        let defaults = defaults(temp_dir.path());

        store.reconcile(&registry, &defaults).unwrap();
        let before = fs::read(store.path()).unwrap();

        let outcome = store.reconcile(&registry, &defaults).unwrap();
        assert!(!outcome.changed);
        assert!(!outcome.created);
        assert_eq!(fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn test_reformatted_document_is_not_rewritten() {
        let temp_dir = TempDir::new().unwrap();
        let store = PolicyStore::new(temp_dir.path());
        let registry = registry_of(&["a.com"]);
        let defaults = defaults(temp_dir.path());

        let outcome = store.reconcile(&registry, &defaults).unwrap();
        let compact = serde_json::to_string(&outcome.document).unwrap();
        fs::write(store.path(), &compact).unwrap();

        let outcome = store.reconcile(&registry, &defaults).unwrap();
        assert!(!outcome.changed);
        assert_eq!(fs::read_to_string(store.path()).unwrap(), compact);
    }

    #[test]
    fn test_renewal_survives_and_dropped_sites_are_reported() {
        let temp_dir = TempDir::new().unwrap();
        let store = PolicyStore::new(temp_dir.path());
        let defaults = defaults(temp_dir.path());

        let mut outcome = store
            .reconcile(&registry_of(&["a.com", "old.com"]), &defaults)
            .unwrap();
        outcome.document.sites[0].renew_at = Some(RenewAt::from_millis(1_735_689_600_000));
        fs::write(
            store.path(),
            outcome.document.to_canonical_json().unwrap(),
        )
        .unwrap();

        let outcome = store
            .reconcile(&registry_of(&["a.com", "new.com"]), &defaults)
            .unwrap();

        assert!(outcome.changed);
        assert_eq!(outcome.dropped, vec![Domain::parse("old.com").unwrap()]);
        assert_eq!(
            outcome.document.site("a.com").unwrap().renew_at,
            Some(RenewAt::from_millis(1_735_689_600_000))
        );
        assert!(outcome.document.site("new.com").unwrap().renew_at.is_none());

        let reloaded = store.load().unwrap().unwrap();
        assert_eq!(reloaded, outcome.document);
    }

    #[test]
    fn test_corrupt_document_is_left_alone() {
        let temp_dir = TempDir::new().unwrap();
        let store = PolicyStore::new(temp_dir.path());
        fs::write(store.path(), "{ not json").unwrap();

        let err = store
            .reconcile(&registry_of(&["a.com"]), &defaults(temp_dir.path()))
            .unwrap_err();

        assert!(matches!(err, PolicyError::Corrupt { .. }));
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "{ not json");
    }

    #[cfg(unix)]
    #[test]
    fn test_rewrite_keeps_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let store = PolicyStore::new(temp_dir.path());
        let defaults = defaults(temp_dir.path());

        store.reconcile(&registry_of(&["a.com"]), &defaults).unwrap();
        fs::set_permissions(store.path(), fs::Permissions::from_mode(0o640)).unwrap();

        let outcome = store
            .reconcile(&registry_of(&["a.com", "b.com"]), &defaults)
            .unwrap();
        assert!(outcome.changed);

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
        assert!(store.load().unwrap().unwrap().site("b.com").is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_reconcile_waits_for_store_lock() {
        use nix::fcntl::{Flock, FlockArg};
        use std::sync::mpsc;
        use std::time::Duration;

        let temp_dir = TempDir::new().unwrap();
        let store = PolicyStore::new(temp_dir.path());
        let defaults = defaults(temp_dir.path());

        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&store.lock_path)
            .unwrap();
        let held = Flock::lock(lock_file, FlockArg::LockExclusive).unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        let worker = {
            let store = store.clone();
            std::thread::spawn(move || {
                let outcome = store.reconcile(&registry_of(&["a.com"]), &defaults);
                done_tx.send(()).unwrap();
                outcome
            })
        };

        assert!(done_rx.recv_timeout(Duration::from_millis(300)).is_err());
        assert!(!store.path().exists());

        drop(held);
        done_rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert!(worker.join().unwrap().unwrap().created);
        assert!(store.path().exists());
    }

    #[test]
    fn test_load_missing_document() {
        let temp_dir = TempDir::new().unwrap();
        let store = PolicyStore::new(temp_dir.path().join("absent"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_unwritable_directory_is_persistence_error() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("file");
        fs::write(&blocker, "not a directory").unwrap();

        let store = PolicyStore::new(blocker.join("greenlock.d"));
        let err = store
            .reconcile(&registry_of(&["a.com"]), &defaults(temp_dir.path()))
            .unwrap_err();
        assert!(matches!(err, PolicyError::Persistence { .. }));
    }
}
