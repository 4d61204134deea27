//! Path prefix matching.
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - A prefix only matches on a segment boundary: `/api` matches `/api` and
//!   `/api/x` but not `/apix`
//! - The remaining suffix is returned raw, with its percent-encoding intact
//! - A suffix containing a `.` or `..` segment never matches

/// Matches the request path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher. Trailing slashes are ignored.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn matches(&self, path: &str) -> bool {
        self.suffix(path).is_some()
    }

    /// The part of `path` after the prefix: empty, or starting with `/`.
    pub fn suffix<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix(self.prefix.as_str())?;
        if !rest.is_empty() && !rest.starts_with('/') {
            return None;
        }
        if has_dot_segment(rest) {
            return None;
        }
        Some(rest)
    }
}

/// True if any segment is `.` or `..`, raw or percent-encoded.
///
/// Backslashes count as separators: URL parsing treats them as `/` for http(s).
pub fn has_dot_segment(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| {
        let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
        decoded == "." || decoded == ".."
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_matcher() {
        let matcher = PathPrefixMatcher::new("/api");

        assert_eq!(matcher.suffix("/api/v1/courses"), Some("/v1/courses"));
        assert_eq!(matcher.suffix("/api"), Some(""));
        assert_eq!(matcher.suffix("/api/"), Some("/"));
        assert_eq!(matcher.suffix("/apix"), None);
        assert_eq!(matcher.suffix("/API/v1"), None);
        assert!(!matcher.matches("/images"));
    }

    #[test]
    fn suffix_keeps_encoding() {
        let matcher = PathPrefixMatcher::new("/api/");
        assert_eq!(matcher.prefix(), "/api");
        assert_eq!(
            matcher.suffix("/api/files/my%20notes.pdf"),
            Some("/files/my%20notes.pdf")
        );
    }

    #[test]
    fn dot_segments_never_match() {
        let matcher = PathPrefixMatcher::new("/api");
        for path in [
            "/api/..",
            "/api/../internal/admin",
            "/api/courses/../../internal",
            "/api/./courses",
            "/api/%2e%2e/internal",
            "/api/%2E./internal",
            "/api/.%2e/internal",
            "/api/..\\internal",
        ] {
            assert_eq!(matcher.suffix(path), None, "{path}");
        }
        // Dots inside a segment are ordinary characters.
        assert_eq!(matcher.suffix("/api/files/a..b.txt"), Some("/files/a..b.txt"));
        assert_eq!(matcher.suffix("/api/.well-known"), Some("/.well-known"));
    }
}
