//! Conditional request headers
//!
//! `If-Match` names the version a writer expects to replace (required
//! match). `If-None-Match` names a version the caller already holds
//! (forbidden match): on reads and merges it short-circuits to
//! "not modified", on full replaces it fails the precondition.

use hyper::header::{HeaderMap, IF_MATCH, IF_NONE_MATCH};

use super::fingerprint::header_matches;

/// Conditional headers of one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preconditions {
    pub if_match: Option<String>,
    pub if_none_match: Option<String>,
}

impl Preconditions {
    /// Read conditional headers; blank values count as absent
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let read = |name| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Self {
            if_match: read(IF_MATCH),
            if_none_match: read(IF_NONE_MATCH),
        }
    }

    pub fn if_match(tag: impl Into<String>) -> Self {
        Self {
            if_match: Some(tag.into()),
            if_none_match: None,
        }
    }

    pub fn if_none_match(tag: impl Into<String>) -> Self {
        Self {
            if_match: None,
            if_none_match: Some(tag.into()),
        }
    }

    /// Whether neither header was sent
    pub fn is_empty(&self) -> bool {
        self.if_match.is_none() && self.if_none_match.is_none()
    }

    /// `Some(false)` when an `If-Match` was sent and does not match
    pub fn required_match(&self, current: &str) -> Option<bool> {
        self.if_match.as_deref().map(|h| header_matches(h, current))
    }

    /// Whether an `If-None-Match` was sent and matches `current`
    pub fn forbidden_match(&self, current: &str) -> bool {
        self.if_none_match
            .as_deref()
            .is_some_and(|h| header_matches(h, current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    #[test]
    fn test_from_headers_ignores_blank_values() {
        let mut headers = HeaderMap::new();
        headers.insert(IF_MATCH, HeaderValue::from_static("\"abc\""));
        headers.insert(IF_NONE_MATCH, HeaderValue::from_static("  "));

        let pre = Preconditions::from_headers(&headers);
        assert_eq!(pre.if_match.as_deref(), Some("\"abc\""));
        assert_eq!(pre.if_none_match, None);
        assert!(!pre.is_empty());
        assert!(Preconditions::from_headers(&HeaderMap::new()).is_empty());
    }

    #[test]
    fn test_match_checks() {
        let pre = Preconditions::if_match("\"abc\"");
        assert_eq!(pre.required_match("abc"), Some(true));
        assert_eq!(pre.required_match("abd"), Some(false));
        assert!(!pre.forbidden_match("abc"));

        let pre = Preconditions::if_none_match("W/\"abc\"");
        assert_eq!(pre.required_match("abc"), None);
        assert!(pre.forbidden_match("abc"));
        assert!(!pre.forbidden_match("xyz"));
    }
}
