//! Path prefix matching.
//!
//! # Responsibilities
//! - Match a request path against a mount prefix
//! - Split off the remainder below the prefix
//!
//! # Design Decisions
//! - Matching is case-sensitive
//! - Matching respects segment boundaries: `/api/users` owns `/api/users`
//!   and `/api/users/...` but not `/api/usersearch`
//! - A trailing slash on the prefix is ignored (`/api/` behaves as `/api`)
//! - No regex to guarantee O(n) matching

/// Matches the request path against a mount prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let trimmed = prefix.trim_end_matches('/');
        Self {
            prefix: trimmed.to_string(),
        }
    }

    /// The normalized prefix (no trailing slash; empty for the root).
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns true if `path` lies at or below the prefix.
    pub fn matches(&self, path: &str) -> bool {
        self.remainder(path).is_some()
    }

    /// The part of `path` below the prefix, always starting with `/`.
    pub fn remainder<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix(self.prefix.as_str())?;
        if rest.is_empty() {
            Some("/")
        } else if rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }
}
