//! Path matching logic.
//!
//! # Responsibilities
//! - Recognize `{api_prefix}/{service}/{rest...}` request paths
//! - Build the upstream path `{upstream_prefix}/{rest...}`
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - No regex; a prefix check plus one split
//! - The query string is carried over untouched

/// A request path split into its service segment and the remainder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePath<'a> {
    /// The raw service segment, before suffix resolution.
    pub segment: &'a str,
    /// Everything after the service segment, without the leading slash.
    pub rest: &'a str,
}

/// Matches paths under the gateway API prefix.
#[derive(Debug, Clone)]
pub struct ApiPathMatcher {
    prefix: String,
}

impl ApiPathMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `None` when the path is outside the prefix or has no service segment.
    pub fn matches<'a>(&self, path: &'a str) -> Option<ServicePath<'a>> {
        let tail = path.strip_prefix(self.prefix.as_str())?;
        let tail = tail.strip_prefix('/')?;

        let (segment, rest) = match tail.split_once('/') {
            Some((segment, rest)) => (segment, rest),
            None => (tail, ""),
        };
        if segment.is_empty() {
            return None;
        }
        Some(ServicePath { segment, rest })
    }
}

/// `{upstream_prefix}/{rest}` plus the original query, if any.
pub fn rewrite_path(upstream_prefix: &str, rest: &str, query: Option<&str>) -> String {
    let mut path = format!("{}/{}", upstream_prefix.trim_end_matches('/'), rest);
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        path.push('?');
        path.push_str(query);
    }
    path
}
