//! Static site handler
//!
//! Serves files from a site's document root:
//! - GET and HEAD only
//! - Directory requests fall back to `index.html`
//! - ETag / If-None-Match revalidation
//! - Traversal outside the document root is rejected

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{self, HeaderValue};
use http::{Method, Request, Response, StatusCode};
use mime_guess::from_path;
use tokio::fs;
use tracing::{debug, error, trace};

use crate::registry::SiteHandler;

/// Index file served for directory requests
const INDEX_FILE: &str = "index.html";

/// Static file handler for one site
#[derive(Debug, Clone)]
pub struct StaticSite {
    /// Document root
    root: PathBuf,
    /// `Cache-Control` value for successful responses
    cache_control: String,
}

impl StaticSite {
    /// Create a handler serving `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache_control: "public, max-age=300".to_string(),
        }
    }

    pub fn with_cache_control(mut self, cache_control: impl Into<String>) -> Self {
        self.cache_control = cache_control.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a request path onto the document root.
    ///
    /// Returns `None` for paths that would escape the root.
    fn resolve_path(&self, path: &str) -> Option<PathBuf> {
        let decoded = urlencoding::decode(path).ok()?;
        let relative = Path::new(decoded.trim_start_matches('/'));

        let mut full_path = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(c) => full_path.push(c),
                Component::CurDir => {}
                // "..", a drive prefix or an embedded root
                _ => return None,
            }
        }

        full_path.starts_with(&self.root).then_some(full_path)
    }

    async fn serve_file<B>(&self, req: &Request<B>, file_path: &Path) -> Response<Bytes> {
        let metadata = match fs::metadata(file_path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return status_response(StatusCode::NOT_FOUND),
            Err(e) => {
                error!(path = %file_path.display(), error = %e, "Failed to read file metadata");
                return status_response(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };

        let etag = generate_etag(metadata.len(), metadata.modified().ok());
        if if_none_match(req, &etag) {
            trace!(path = %file_path.display(), "ETag matched, returning 304");
            let mut response = empty_response(StatusCode::NOT_MODIFIED);
            self.insert_cache_headers(&mut response, &etag);
            return response;
        }

        let body = if req.method() == Method::HEAD {
            Bytes::new()
        } else {
            match fs::read(file_path).await {
                Ok(content) => Bytes::from(content),
                Err(e) => {
                    error!(path = %file_path.display(), error = %e, "Failed to read file");
                    return status_response(StatusCode::INTERNAL_SERVER_ERROR);
                }
            }
        };

        let mut response = Response::new(body);
        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&content_type(file_path)) {
            headers.insert(header::CONTENT_TYPE, value);
        }
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(metadata.len()));
        self.insert_cache_headers(&mut response, &etag);

        debug!(path = %file_path.display(), size = metadata.len(), "Served static file");
        response
    }

    fn insert_cache_headers(&self, response: &mut Response<Bytes>, etag: &str) {
        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(etag) {
            headers.insert(header::ETAG, value);
        }
        if let Ok(value) = HeaderValue::from_str(&self.cache_control) {
            headers.insert(header::CACHE_CONTROL, value);
        }
    }
}

#[async_trait]
impl SiteHandler for StaticSite {
    async fn handle(&self, req: &Request<Bytes>) -> Response<Bytes> {
        if req.method() != Method::GET && req.method() != Method::HEAD {
            let mut response = empty_response(StatusCode::METHOD_NOT_ALLOWED);
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("GET, HEAD"));
            return response;
        }

        let Some(file_path) = self.resolve_path(req.uri().path()) else {
            debug!(path = %req.uri().path(), "Rejected path outside document root");
            return status_response(StatusCode::BAD_REQUEST);
        };

        match fs::metadata(&file_path).await {
            Ok(m) if m.is_dir() => {
                let index_path = file_path.join(INDEX_FILE);
                if fs::metadata(&index_path).await.is_ok() {
                    self.serve_file(req, &index_path).await
                } else {
                    status_response(StatusCode::FORBIDDEN)
                }
            }
            _ => self.serve_file(req, &file_path).await,
        }
    }

    fn describe(&self) -> String {
        format!("static({})", self.root.display())
    }
}

fn content_type(path: &Path) -> String {
    from_path(path).first_or_octet_stream().to_string()
}

/// ETag from size and modification time, without reading content
fn generate_etag(size: u64, modified: Option<std::time::SystemTime>) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    size.hash(&mut hasher);
    modified
        .and_then(|m| m.duration_since(std::time::UNIX_EPOCH).ok())
        .unwrap_or_default()
        .as_nanos()
        .hash(&mut hasher);
    format!("\"{:x}\"", hasher.finish())
}

fn if_none_match<B>(req: &Request<B>, etag: &str) -> bool {
    req.headers()
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').any(|candidate| {
            let candidate = candidate.trim();
            candidate == "*" || candidate.trim_start_matches("W/") == etag
        }))
        .unwrap_or(false)
}

fn empty_response(status: StatusCode) -> Response<Bytes> {
    let mut response = Response::new(Bytes::new());
    *response.status_mut() = status;
    response
}

/// Plain-text response whose body is the status line
fn status_response(status: StatusCode) -> Response<Bytes> {
    let body = format!(
        "{} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    );
    let mut response = Response::new(Bytes::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
