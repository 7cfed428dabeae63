//! Sender domain extraction.

use std::sync::LazyLock;

use regex::Regex;

static ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\w.\-]+@([\w.\-]+)").expect("address pattern is valid")
});

/// Extract the lowercased domain from a free-form `From` value.
///
/// Handles `Name <user@example.com>` and bare `user@example.com`.
/// Returns an empty string when no `local@domain` pattern is present,
/// which callers treat as "no history lookup".
pub fn extract_domain(from: &str) -> String {
    ADDRESS
        .captures(from)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_lowercase())
        .unwrap_or_default()
}
