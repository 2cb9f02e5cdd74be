//! Server-name validation (Testable Property 1, §8).

use std::sync::OnceLock;

use regex::Regex;

fn pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("valid regex"))
}

/// Returns true iff `name` matches `^[A-Za-z0-9_-]{1,64}$`.
pub fn is_valid_server_name(name: &str) -> bool {
    pattern().is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_alphanumeric_underscore_hyphen() {
        assert!(is_valid_server_name("alpha"));
        assert!(is_valid_server_name("survival_1"));
        assert!(is_valid_server_name("my-server-2"));
        assert!(is_valid_server_name(&"a".repeat(64)));
    }

    #[test]
    fn rejects_invalid_names_deterministically() {
        assert!(!is_valid_server_name(""));
        assert!(!is_valid_server_name(&"a".repeat(65)));
        assert!(!is_valid_server_name("has space"));
        assert!(!is_valid_server_name("has/slash"));
        assert!(!is_valid_server_name("..traversal"));
        assert!(!is_valid_server_name("emoji🎮"));
        // Deterministic: repeated calls agree.
        for _ in 0..5 {
            assert!(!is_valid_server_name("bad name"));
        }
    }
}
