//! Mount lookup.
//!
//! # Responsibilities
//! - Store the configured mounts
//! - Resolve a request path to its mount and path suffix
//! - Build the origin URL for a resolved request
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Longest prefix wins
//! - Explicit no-match rather than silent default
//! - A built origin URL must stay under the mount's origin sub-path

use url::Url;

use crate::config::MountConfig;
use crate::routing::matcher::PathPrefixMatcher;

/// Failure to build the origin URL for a resolved request.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("invalid origin URL: {0}")]
    Parse(#[from] url::ParseError),

    #[error("`{0}` resolves outside the mount")]
    OutsideMount(String),
}

/// A compiled mount.
#[derive(Debug, Clone)]
pub struct Mount {
    pub name: String,
    matcher: PathPrefixMatcher,
    upstream_prefix: String,
}

impl Mount {
    pub fn from_config(config: &MountConfig) -> Self {
        Self {
            name: config.name.clone(),
            matcher: PathPrefixMatcher::new(config.prefix.clone()),
            upstream_prefix: config.upstream_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        self.matcher.prefix()
    }

    /// Origin URL for `suffix` and `query` under this mount.
    ///
    /// `suffix` is empty or starts with `/`; it is appended verbatim, so a bare
    /// `/api` is forwarded as `{origin}/api` with no trailing slash.
    pub fn upstream_url(&self, origin: &Url, suffix: &str, query: Option<&str>) -> Result<Url, RouteError> {
        let base = origin.as_str().trim_end_matches('/');
        let mut target = format!("{base}{}{suffix}", self.upstream_prefix);
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            target.push('?');
            target.push_str(query);
        }
        let url = Url::parse(&target)?;

        let scope = format!("{}{}", origin.path().trim_end_matches('/'), self.upstream_prefix);
        let path = url.path();
        let inside = scope.is_empty()
            || path == scope
            || path
                .strip_prefix(scope.as_str())
                .is_some_and(|rest| rest.starts_with('/'));
        if !inside {
            return Err(RouteError::OutsideMount(path.to_string()));
        }
        Ok(url)
    }
}

/// A mount matched against a request path.
#[derive(Debug, Clone, Copy)]
pub struct Resolved<'a> {
    pub mount: &'a Mount,
    pub suffix: &'a str,
}

/// All mounts, sorted so the longest prefix is tried first.
#[derive(Debug, Clone)]
pub struct MountTable {
    mounts: Vec<Mount>,
}

impl MountTable {
    pub fn from_config(mounts: &[MountConfig]) -> Self {
        let mut mounts: Vec<Mount> = mounts.iter().map(Mount::from_config).collect();
        mounts.sort_by(|a, b| b.prefix().len().cmp(&a.prefix().len()));
        Self { mounts }
    }

    pub fn resolve<'a>(&'a self, path: &'a str) -> Option<Resolved<'a>> {
        self.mounts.iter().find_map(|mount| {
            mount
                .matcher
                .suffix(path)
                .map(|suffix| Resolved { mount, suffix })
        })
    }

    pub fn mounts(&self) -> &[Mount] {
        &self.mounts
    }
}
