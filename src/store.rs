use chrono::Utc;
use tracing::warn;

use crate::models::{derive_title, Conversation, Message};

/// In-memory conversation collection plus the active-conversation pointer.
///
/// The store is the single writer of conversation content. The active
/// pointer is only an id; it is always `None` or the id of a conversation
/// currently held by the store.
#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: Vec<Conversation>,
    active_id: Option<String>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn active(&self) -> Option<&Conversation> {
        self.active_id.as_deref().and_then(|id| self.get(id))
    }

    /// Creates an empty conversation and makes it active.
    pub fn create_conversation(&mut self, seed_title: Option<&str>) -> &Conversation {
        let conversation = Conversation::new(seed_title);
        self.active_id = Some(conversation.id.clone());
        self.conversations.push(conversation);
        &self.conversations[self.conversations.len() - 1]
    }

    /// Appends `message` to the conversation. Returns `false` when the id is
    /// unknown, which means the caller holds a stale reference.
    pub fn append_message(&mut self, conversation_id: &str, message: Message) -> bool {
        let Some(conversation) = self.get_mut(conversation_id) else {
            warn!("append to unknown conversation {conversation_id} ignored");
            return false;
        };
        if conversation.messages.is_empty() && message.is_user() {
            conversation.title = derive_title(&message.content);
        }
        conversation.messages.push(message);
        conversation.updated_at = Utc::now();
        true
    }

    /// Drops every error-flagged message from the conversation. Returns the
    /// number removed, or `None` for an unknown id.
    pub fn remove_error_messages(&mut self, conversation_id: &str) -> Option<usize> {
        let conversation = self.get_mut(conversation_id)?;
        let before = conversation.messages.len();
        conversation.messages.retain(|m| !m.error);
        Some(before - conversation.messages.len())
    }

    /// Replaces the whole collection; the first entry (if any) becomes active.
    pub fn replace_all(&mut self, conversations: Vec<Conversation>) {
        self.active_id = conversations.first().map(|c| c.id.clone());
        self.conversations = conversations;
    }

    /// Moves the active pointer. Unknown ids leave the pointer untouched.
    pub fn select(&mut self, conversation_id: &str) -> bool {
        if self.get(conversation_id).is_none() {
            warn!("select of unknown conversation {conversation_id} ignored");
            return false;
        }
        self.active_id = Some(conversation_id.to_string());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NormalizedReply, DEFAULT_TITLE};

    #[test]
    fn create_makes_conversation_active() {
        let mut store = ConversationStore::new();
        let id = store.create_conversation(None).id.clone();
        assert_eq!(store.active_id(), Some(id.as_str()));
        assert_eq!(store.conversations().len(), 1);
        assert_eq!(store.active().unwrap().title, DEFAULT_TITLE);
    }

    #[test]
    fn first_user_message_sets_title() {
        let mut store = ConversationStore::new();
        let id = store.create_conversation(None).id.clone();
        assert!(store.append_message(&id, Message::user("Find me a CRM")));
        assert_eq!(store.get(&id).unwrap().title, "Find me a CRM");

        store.append_message(&id, Message::user("Something else entirely"));
        assert_eq!(store.get(&id).unwrap().title, "Find me a CRM");
    }

    #[test]
    fn long_first_message_truncates_title() {
        let mut store = ConversationStore::new();
        let id = store.create_conversation(None).id.clone();
        store.append_message(&id, Message::user("a".repeat(80)));
        assert_eq!(store.get(&id).unwrap().title.chars().count(), 50);
    }

    #[test]
    fn first_assistant_message_keeps_title() {
        let mut store = ConversationStore::new();
        let id = store.create_conversation(Some("Seeded")).id.clone();
        store.append_message(&id, Message::assistant(NormalizedReply::text("hi")));
        assert_eq!(store.get(&id).unwrap().title, "Seeded");
    }

    #[test]
    fn append_refreshes_updated_at() {
        let mut store = ConversationStore::new();
        let id = store.create_conversation(None).id.clone();
        let before = store.get(&id).unwrap().updated_at;
        store.append_message(&id, Message::user("hello"));
        assert!(store.get(&id).unwrap().updated_at >= before);
    }

    #[test]
    fn append_to_unknown_conversation_is_rejected() {
        let mut store = ConversationStore::new();
        assert!(!store.append_message("missing", Message::user("hello")));
        assert!(store.conversations().is_empty());
    }

    #[test]
    fn remove_error_messages_keeps_others() {
        let mut store = ConversationStore::new();
        let id = store.create_conversation(None).id.clone();
        store.append_message(&id, Message::user("q"));
        store.append_message(&id, Message::error("failed"));
        store.append_message(&id, Message::error("failed again"));
        assert_eq!(store.remove_error_messages(&id), Some(2));
        assert_eq!(store.get(&id).unwrap().messages.len(), 1);
        assert_eq!(store.remove_error_messages("missing"), None);
    }

    #[test]
    fn replace_all_activates_first_entry() {
        let mut store = ConversationStore::new();
        store.create_conversation(None);
        let first = Conversation::new(Some("first"));
        let second = Conversation::new(Some("second"));
        let first_id = first.id.clone();
        store.replace_all(vec![first, second]);
        assert_eq!(store.conversations().len(), 2);
        assert_eq!(store.active_id(), Some(first_id.as_str()));

        store.replace_all(Vec::new());
        assert_eq!(store.active_id(), None);
        assert!(store.active().is_none());
    }

    #[test]
    fn select_only_accepts_known_ids() {
        let mut store = ConversationStore::new();
        let a = store.create_conversation(None).id.clone();
        let b = store.create_conversation(None).id.clone();
        assert_eq!(store.active_id(), Some(b.as_str()));
        assert!(store.select(&a));
        assert_eq!(store.active_id(), Some(a.as_str()));
        assert!(!store.select("missing"));
        assert_eq!(store.active_id(), Some(a.as_str()));
    }
}
