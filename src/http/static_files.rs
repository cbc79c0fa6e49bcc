//! Static file mounts.
//!
//! Three read-only trees are served from the upload root:
//!
//! | URL prefix      | Directory                      |
//! |-----------------|--------------------------------|
//! | `/uploads`      | `<root>`                       |
//! | `/certificates` | `<root>/certificates`          |
//! | `/receipts`     | `<root>/receipts`              |
//!
//! A miss falls through to the route table, so mounts never hide
//! collaborators with the same prefix.

use std::path::{Path, PathBuf};

use axum::{
    body::Body,
    http::{header, request::Parts, HeaderValue, Method, Request, StatusCode},
    response::Response,
};
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::routing::PathPrefixMatcher;

/// Default `(prefix, subdirectory)` pairs below the upload root.
pub const DEFAULT_STATIC_MOUNTS: [(&str, &str); 3] = [
    ("/uploads", ""),
    ("/certificates", "certificates"),
    ("/receipts", "receipts"),
];

/// One URL prefix bound to a directory.
#[derive(Debug, Clone)]
pub struct StaticMount {
    matcher: PathPrefixMatcher,
    dir: PathBuf,
    service: ServeDir,
}

impl StaticMount {
    pub fn new(prefix: &str, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            matcher: PathPrefixMatcher::new(prefix),
            service: ServeDir::new(&dir),
            dir,
        }
    }

    pub fn prefix(&self) -> &str {
        self.matcher.prefix()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Ordered static mounts.
#[derive(Debug, Clone, Default)]
pub struct StaticMounts {
    mounts: Vec<StaticMount>,
}

impl StaticMounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// The default mounts below `root`.
    pub fn from_root(root: &Path) -> Self {
        DEFAULT_STATIC_MOUNTS
            .iter()
            .fold(Self::new(), |mounts, (prefix, sub)| {
                let dir = if sub.is_empty() { root.to_path_buf() } else { root.join(sub) };
                mounts.with_mount(StaticMount::new(prefix, dir))
            })
    }

    pub fn with_mount(mut self, mount: StaticMount) -> Self {
        self.mounts.push(mount);
        self
    }

    pub fn mounts(&self) -> &[StaticMount] {
        &self.mounts
    }

    /// Try to answer the request described by `request` from disk.
    ///
    /// Returns `None` for anything but GET/HEAD, or when no mount has the file.
    /// A lookup that fails on disk counts as a miss.
    pub async fn serve(&self, request: &Parts) -> Option<Response> {
        let method = &request.method;
        if *method != Method::GET && *method != Method::HEAD {
            return None;
        }

        let path = request.uri.path();
        for mount in &self.mounts {
            let Some(remainder) = mount.matcher.remainder(path) else {
                continue;
            };

            let uri = match request.uri.query() {
                Some(query) => format!("{remainder}?{query}"),
                None => remainder.to_string(),
            };
            let mut inner = match Request::builder().method(method.clone()).uri(uri).body(Body::empty()) {
                Ok(inner) => inner,
                Err(e) => {
                    tracing::debug!(path = %path, error = %e, "Unusable static path");
                    continue;
                }
            };
            *inner.headers_mut() = request.headers.clone();

            let response = match mount.service.clone().oneshot(inner).await {
                Ok(response) => response,
                Err(never) => match never {},
            };
            let status = response.status();
            if status.is_server_error() {
                // ENAMETOOLONG and friends: treat the path as absent.
                tracing::debug!(mount = mount.prefix(), path = %path, status = %status, "Static lookup failed, falling through");
                continue;
            }
            if status == StatusCode::NOT_FOUND {
                continue;
            }

            let mut response = response.map(Body::new);
            if response.status().is_redirection() {
                prefix_location(&mut response, mount.prefix());
            }
            tracing::trace!(mount = mount.prefix(), path = %path, status = %response.status(), "Served static file");
            return Some(response);
        }
        None
    }
}

/// Directory redirects are issued relative to the mount; put the prefix back.
fn prefix_location(response: &mut Response, prefix: &str) {
    let Some(location) = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| v.starts_with('/'))
    else {
        return;
    };
    if let Ok(value) = HeaderValue::from_str(&format!("{prefix}{location}")) {
        response.headers_mut().insert(header::LOCATION, value);
    }
}
