//! Host, context-path and URL-pattern matching.
//!
//! # Responsibilities
//! - Match host names and aliases (exact match, case-insensitive)
//! - Match context paths by segment prefix (case-sensitive)
//! - Parse and match servlet-style URL patterns, splitting servlet path / path info
//!
//! # Design Decisions
//! - Host matching is case-insensitive (per HTTP spec)
//! - Path matching is case-sensitive
//! - No regex to guarantee O(n) matching

use std::fmt;

/// Trait for matching a routing key (host name or path) against a condition.
pub trait Matcher: Send + Sync + fmt::Debug {
    fn matches(&self, candidate: &str) -> bool;
}

/// Matches a host name or one of its aliases.
#[derive(Debug, Clone)]
pub struct HostMatcher {
    names: Vec<String>,
}

impl HostMatcher {
    /// Names are normalized to lowercase for case-insensitive matching.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| n.as_ref().to_lowercase())
                .collect(),
        }
    }
}

impl Matcher for HostMatcher {
    fn matches(&self, candidate: &str) -> bool {
        let candidate = candidate.to_lowercase();
        self.names.iter().any(|n| *n == candidate)
    }
}

/// Matches paths under a context path. The root context (`""`) matches everything.
#[derive(Debug, Clone)]
pub struct ContextPathMatcher {
    path: String,
}

impl ContextPathMatcher {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Matcher for ContextPathMatcher {
    fn matches(&self, candidate: &str) -> bool {
        if self.path.is_empty() {
            return true;
        }
        match candidate.strip_prefix(self.path.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'),
            None => false,
        }
    }
}

/// Servlet-style URL pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlPattern {
    /// `/exact/path`
    Exact(String),
    /// `/prefix/*` (stored without the `/*`); `/*` is `Prefix("")`
    Prefix(String),
    /// `*.ext` (stored without the `*.`)
    Extension(String),
    /// `/`
    Default,
}

impl UrlPattern {
    pub fn parse(pattern: &str) -> Option<Self> {
        if pattern == "/" {
            Some(UrlPattern::Default)
        } else if let Some(ext) = pattern.strip_prefix("*.") {
            (!ext.is_empty() && !ext.contains('/')).then(|| UrlPattern::Extension(ext.to_string()))
        } else if let Some(prefix) = pattern.strip_suffix("/*") {
            (prefix.is_empty() || prefix.starts_with('/'))
                .then(|| UrlPattern::Prefix(prefix.to_string()))
        } else if pattern.starts_with('/') && !pattern.contains('*') {
            Some(UrlPattern::Exact(pattern.to_string()))
        } else {
            None
        }
    }

    /// Match a context-relative path.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            UrlPattern::Exact(exact) => path == exact,
            UrlPattern::Prefix(prefix) => {
                prefix.is_empty()
                    || path == prefix
                    || path
                        .strip_prefix(prefix.as_str())
                        .map(|rest| rest.starts_with('/'))
                        .unwrap_or(false)
            }
            UrlPattern::Extension(ext) => {
                let last = path.rsplit('/').next().unwrap_or("");
                last.rsplit_once('.').map(|(_, e)| e == ext).unwrap_or(false)
            }
            UrlPattern::Default => true,
        }
    }

    /// Split a matching path into (servlet path, path info).
    pub fn split(&self, path: &str) -> (String, Option<String>) {
        match self {
            UrlPattern::Prefix(prefix) => {
                let rest = &path[prefix.len().min(path.len())..];
                let info = (!rest.is_empty()).then(|| rest.to_string());
                (prefix.clone(), info)
            }
            _ => (path.to_string(), None),
        }
    }

    /// Precedence when several patterns match: exact, longest prefix, extension, default.
    pub fn rank(&self) -> (u8, usize) {
        match self {
            UrlPattern::Exact(_) => (3, 0),
            UrlPattern::Prefix(prefix) => (2, prefix.len()),
            UrlPattern::Extension(_) => (1, 0),
            UrlPattern::Default => (0, 0),
        }
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlPattern::Exact(p) => write!(f, "{}", p),
            UrlPattern::Prefix(p) => write!(f, "{}/*", p),
            UrlPattern::Extension(e) => write!(f, "*.{}", e),
            UrlPattern::Default => write!(f, "/"),
        }
    }
}
