//! Visitor pseudonymization
//!
//! The visitor key is a one-way SHA-256 digest of `ip|user_agent`, so data
//! points can be grouped per client without the collector ever seeing the
//! client's address.

use sha2::{Digest, Sha256};

/// Maximum number of characters of the user agent stored in a data point
pub const USER_AGENT_MAX_CHARS: usize = 128;

/// Lowercase hex SHA-256 of `ip + "|" + user_agent`
pub fn visitor_key(ip: &str, user_agent: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ip.as_bytes());
    hasher.update(b"|");
    hasher.update(user_agent.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// First [`USER_AGENT_MAX_CHARS`] characters of the user agent.
///
/// Counts Unicode scalar values so a multi-byte character is never split.
pub fn truncate_user_agent(user_agent: &str) -> &str {
    match user_agent.char_indices().nth(USER_AGENT_MAX_CHARS) {
        Some((idx, _)) => &user_agent[..idx],
        None => user_agent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visitor_key_known_vector() {
        // sha256("1.2.3.4|TestAgent/1.0")
        let key = visitor_key("1.2.3.4", "TestAgent/1.0");
        assert_eq!(
            key,
            "22616e5c2777ac91233cae0d8214ae088f54ab87d19c0d84724aeefff162d582"
        );
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_visitor_key_empty_inputs() {
        assert_eq!(visitor_key("", ""), format!("{:x}", Sha256::digest(b"|")));
    }

    #[test]
    fn test_visitor_key_deterministic() {
        let a = visitor_key("203.0.113.7", "Calendar/1.0");
        let b = visitor_key("203.0.113.7", "Calendar/1.0");
        assert_eq!(a, b);
    }

    #[test]
    fn test_visitor_key_single_char_change() {
        let base = visitor_key("1.2.3.4", "TestAgent/1.0");
        assert_ne!(base, visitor_key("1.2.3.5", "TestAgent/1.0"));
        assert_ne!(base, visitor_key("1.2.3.4", "TestAgent/1.1"));
        assert_ne!(base, visitor_key("1.2.3.4", "testAgent/1.0"));
    }

    #[test]
    fn test_visitor_key_separator_matters() {
        assert_ne!(visitor_key("1.2.3.4x", ""), visitor_key("1.2.3.4", "x"));
    }

    #[test]
    fn test_truncate_user_agent_long() {
        let ua = format!("Mozilla/5.0 {}", "x".repeat(200));
        let truncated = truncate_user_agent(&ua);
        assert_eq!(truncated.chars().count(), USER_AGENT_MAX_CHARS);
        assert!(ua.starts_with(truncated));
    }

    #[test]
    fn test_truncate_user_agent_short_and_exact() {
        assert_eq!(truncate_user_agent("TestAgent/1.0"), "TestAgent/1.0");
        let exact = "y".repeat(USER_AGENT_MAX_CHARS);
        assert_eq!(truncate_user_agent(&exact), exact);
        assert_eq!(truncate_user_agent(""), "");
    }

    #[test]
    fn test_truncate_user_agent_multibyte() {
        let ua = "é".repeat(200);
        let truncated = truncate_user_agent(&ua);
        assert_eq!(truncated.chars().count(), USER_AGENT_MAX_CHARS);
        assert_eq!(truncated.len(), USER_AGENT_MAX_CHARS * 2);
    }
}
