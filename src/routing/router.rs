//! Route table: ordered (prefix → collaborator) bindings.
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) prefix scan in registration order, first match wins
//! - Explicit no-match rather than silent default

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::routing::collaborator::Collaborator;
use crate::routing::matcher::PathPrefixMatcher;
use crate::routing::upstream::{HttpClient, UpstreamCollaborator, UpstreamUrlError};

/// Extension inserted into dispatched requests naming the owning mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountedPrefix {
    pub name: String,
    pub prefix: String,
}

/// One registered prefix.
#[derive(Clone)]
pub struct Mount {
    name: String,
    matcher: PathPrefixMatcher,
    collaborator: Arc<dyn Collaborator>,
}

impl Mount {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefix(&self) -> &str {
        self.matcher.prefix()
    }

    pub fn collaborator(&self) -> &Arc<dyn Collaborator> {
        &self.collaborator
    }

    pub fn mounted_prefix(&self) -> MountedPrefix {
        MountedPrefix {
            name: self.name.clone(),
            prefix: self.prefix().to_string(),
        }
    }
}

impl std::fmt::Debug for Mount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mount")
            .field("name", &self.name)
            .field("prefix", &self.matcher.prefix())
            .finish_non_exhaustive()
    }
}

/// Ordered mapping from path prefix to collaborator.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    mounts: Vec<Mount>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collaborator under `prefix`. Registration order is lookup order.
    pub fn mount<C>(self, name: impl Into<String>, prefix: impl Into<String>, collaborator: C) -> Self
    where
        C: Collaborator,
    {
        self.mount_shared(name, prefix, Arc::new(collaborator))
    }

    /// Register an already shared collaborator.
    pub fn mount_shared(
        mut self,
        name: impl Into<String>,
        prefix: impl Into<String>,
        collaborator: Arc<dyn Collaborator>,
    ) -> Self {
        self.mounts.push(Mount {
            name: name.into(),
            matcher: PathPrefixMatcher::new(prefix),
            collaborator,
        });
        self
    }

    /// Bind every configured route to its upstream service.
    pub fn from_config(config: &GatewayConfig, client: HttpClient) -> Result<Self, UpstreamUrlError> {
        let mut table = Self::new();
        for route in &config.routes {
            let base_url = route
                .upstream
                .as_deref()
                .unwrap_or(&config.upstream.default_url);
            let collaborator = UpstreamCollaborator::new(route.name.as_str(), base_url, client.clone())?;
            tracing::debug!(
                route = %route.name,
                prefix = %route.prefix,
                upstream = %collaborator.authority(),
                "Mounted collaborator"
            );
            table = table.mount(route.name.as_str(), route.prefix.as_str(), collaborator);
        }
        Ok(table)
    }

    /// First mount, in registration order, owning `path`.
    pub fn match_path(&self, path: &str) -> Option<&Mount> {
        self.mounts.iter().find(|m| m.matcher.matches(path))
    }

    pub fn mounts(&self) -> &[Mount] {
        &self.mounts
    }

    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }
}
