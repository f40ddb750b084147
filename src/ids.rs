//! Identifier generation for messages, documents, tasks, and sessions.

use uuid::Uuid;

/// Generate a prefixed unique identifier, e.g. `msg-3f2a…`.
pub(crate) fn new_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_carry_prefix_and_differ() {
        let a = new_id("msg");
        let b = new_id("msg");
        assert!(a.starts_with("msg-"));
        assert!(b.starts_with("msg-"));
        assert_ne!(a, b);
    }
}
