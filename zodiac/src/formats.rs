//! Process-wide catalog of string format patterns.
//!
//! Patterns are compiled once at first use and never mutated afterwards.
//! Checks reference them by accessor rather than through any mutable global.

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$")
        .expect("email pattern compiles")
});

static URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*://[^\s]+$").expect("url pattern compiles")
});

static UUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("uuid pattern compiles")
});

static DATETIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:\d{2})$")
        .expect("datetime pattern compiles")
});

pub(crate) fn email() -> &'static Regex {
    &EMAIL
}

pub(crate) fn url() -> &'static Regex {
    &URL
}

pub(crate) fn uuid() -> &'static Regex {
    &UUID
}

pub(crate) fn datetime() -> &'static Regex {
    &DATETIME
}

/// Look up a format pattern by name. Exposed for external tooling that
/// walks schema trees and wants the same patterns the engine enforces.
pub fn lookup(name: &str) -> Option<&'static Regex> {
    match name {
        "email" => Some(email()),
        "url" => Some(url()),
        "uuid" => Some(uuid()),
        "datetime" => Some(datetime()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_pattern() {
        assert!(email().is_match("billie@example.com"));
        assert!(email().is_match("first.last+tag@sub.domain.org"));
        assert!(!email().is_match("not-an-email"));
        assert!(!email().is_match("missing@tld"));
    }

    #[test]
    fn test_url_pattern() {
        assert!(url().is_match("https://example.com/path?q=1"));
        assert!(url().is_match("ftp://files.example.com"));
        assert!(!url().is_match("example.com"));
        assert!(!url().is_match("http://with space"));
    }

    #[test]
    fn test_uuid_pattern() {
        assert!(uuid().is_match("123e4567-e89b-12d3-a456-426614174000"));
        assert!(!uuid().is_match("123e4567e89b12d3a456426614174000"));
    }

    #[test]
    fn test_datetime_pattern() {
        assert!(datetime().is_match("2024-01-02T03:04:05Z"));
        assert!(datetime().is_match("2024-01-02T03:04:05.123+02:00"));
        assert!(!datetime().is_match("2024-01-02"));
    }

    #[test]
    fn test_lookup() {
        assert!(lookup("email").is_some());
        assert!(lookup("uuid").is_some());
        assert!(lookup("unknown-format").is_none());
    }
}
