//! Site sources
//!
//! A [`SiteSource`] supplies the `(domain, handler)` pairs the registry is
//! built from. [`DirectorySiteSource`] is the standard source: one
//! subdirectory per domain, each with a `public/` document root.
//!
//! # Directory Structure
//!
//! ```text
//! www/
//! ├── example.com/
//! │   └── public/
//! │       └── index.html
//! └── blog.example.org/
//!     └── public/
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, trace};

use frontdoor_common::{Domain, FrontDoorError};

use crate::registry::SiteRegistration;
use crate::static_site::StaticSite;

/// Name of the document root inside each site directory
pub const DOCUMENT_ROOT: &str = "public";

/// The site source as a whole could not be read
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("cannot read site source {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One site could not be loaded; the rest of the scan continues
#[derive(Debug, Error)]
pub enum SiteLoadError {
    #[error("site directory name {name:?} is not a valid domain: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("site {site} has no document root at {path}")]
    MissingDocumentRoot { site: String, path: PathBuf },

    #[error("cannot inspect site entry {path}: {source}")]
    Inaccessible {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SiteLoadError {
    /// The site (or directory name) this error is about
    pub fn site(&self) -> String {
        match self {
            SiteLoadError::InvalidName { name, .. } => name.clone(),
            SiteLoadError::MissingDocumentRoot { site, .. } => site.clone(),
            SiteLoadError::Inaccessible { path, .. } => path.display().to_string(),
        }
    }
}

impl From<DiscoveryError> for FrontDoorError {
    fn from(err: DiscoveryError) -> Self {
        match err {
            DiscoveryError::Unreadable { path, source } => FrontDoorError::Discovery {
                path: path.display().to_string(),
                message: source.to_string(),
                source: Some(Box::new(source)),
            },
        }
    }
}

impl From<SiteLoadError> for FrontDoorError {
    fn from(err: SiteLoadError) -> Self {
        FrontDoorError::SiteLoad {
            site: err.site(),
            reason: err.to_string(),
        }
    }
}

/// Result of scanning a site source
#[derive(Debug, Default)]
pub struct SiteScan {
    /// Sites ready to register, sorted by domain
    pub loaded: Vec<SiteRegistration>,
    /// Entries that were skipped
    pub skipped: Vec<SiteLoadError>,
}

/// Supplies the sites a registry is built from
pub trait SiteSource {
    fn scan(&self) -> Result<SiteScan, DiscoveryError>;
}

/// A fixed list of registrations, for embedding frontdoor as a library
impl SiteSource for Vec<SiteRegistration> {
    fn scan(&self) -> Result<SiteScan, DiscoveryError> {
        Ok(SiteScan {
            loaded: self.clone(),
            skipped: Vec::new(),
        })
    }
}

/// Discovers sites from a directory tree
#[derive(Debug, Clone)]
pub struct DirectorySiteSource {
    root: PathBuf,
    cache_control: String,
}

impl DirectorySiteSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache_control: "public, max-age=300".to_string(),
        }
    }

    /// `Cache-Control` value for the static handlers this source creates
    pub fn with_cache_control(mut self, cache_control: impl Into<String>) -> Self {
        self.cache_control = cache_control.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Inspect one directory entry
    fn load_site(&self, path: &Path, name: &str) -> Result<SiteRegistration, SiteLoadError> {
        let domain = Domain::parse(name).map_err(|e| SiteLoadError::InvalidName {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

        let document_root = path.join(DOCUMENT_ROOT);
        if !document_root.is_dir() {
            return Err(SiteLoadError::MissingDocumentRoot {
                site: domain.into_string(),
                path: document_root,
            });
        }

        let handler = StaticSite::new(document_root).with_cache_control(self.cache_control.clone());
        Ok(SiteRegistration::new(domain, Arc::new(handler)))
    }
}

impl SiteSource for DirectorySiteSource {
    fn scan(&self) -> Result<SiteScan, DiscoveryError> {
        debug!(path = %self.root.display(), "Scanning site source");

        let unreadable = |source| DiscoveryError::Unreadable {
            path: self.root.clone(),
            source,
        };

        let mut scan = SiteScan::default();
        for entry in fs::read_dir(&self.root).map_err(unreadable)? {
            let entry = entry.map_err(unreadable)?;
            let path = entry.path();

            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(source) => {
                    scan.skipped.push(SiteLoadError::Inaccessible { path, source });
                    continue;
                }
            };
            if !file_type.is_dir() {
                trace!(path = %path.display(), "Ignoring non-directory entry");
                continue;
            }

            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                scan.skipped.push(SiteLoadError::InvalidName {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    reason: "not valid UTF-8".to_string(),
                });
                continue;
            };

            match self.load_site(&path, &name) {
                Ok(registration) => scan.loaded.push(registration),
                Err(e) => scan.skipped.push(e),
            }
        }

        // read_dir order is platform dependent
        scan.loaded.sort_by(|a, b| a.domain.cmp(&b.domain));
        scan.skipped.sort_by_key(SiteLoadError::site);

        debug!(
            loaded = scan.loaded.len(),
            skipped = scan.skipped.len(),
            "Site source scan finished"
        );
        Ok(scan)
    }
}
