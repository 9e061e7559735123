//! Identifier generation for conversations, sessions and messages.

use uuid::Uuid;

fn prefixed(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

pub fn conversation_id() -> String {
    prefixed("conv")
}

/// Correlation token handed to the agent; never reused as a conversation id.
pub fn session_id() -> String {
    prefixed("session")
}

pub fn message_id() -> String {
    prefixed("msg")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_prefixed_by_kind() {
        assert!(conversation_id().starts_with("conv-"));
        assert!(session_id().starts_with("session-"));
        assert!(message_id().starts_with("msg-"));
    }

    #[test]
    fn ids_do_not_collide() {
        let ids: HashSet<String> = (0..1000).map(|_| message_id()).collect();
        assert_eq!(ids.len(), 1000);
    }
}
