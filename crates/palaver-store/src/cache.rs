//! The local state store.
//!
//! [`ChatCache`] holds what the UI currently believes: the signed-in
//! username, the ordered conversation list, and one insertion-ordered
//! message collection per conversation, keyed by `message_id`. There is a
//! single instance per process, constructed at startup and shared by
//! reference with whichever layer needs it.
//!
//! Invariants:
//! - every conversation in the list has exactly one collection, possibly
//!   empty;
//! - a collection never holds two entries with the same `message_id`;
//! - iteration order is insertion order, except where
//!   [`ChatCache::add_old_messages_to_conversation`] explicitly prepends.

use std::collections::HashMap;

use indexmap::IndexMap;

use palaver_shared::{Conversation, Message};

/// In-memory mirror of the user's conversations and messages.
#[derive(Debug, Default)]
pub struct ChatCache {
    username: String,
    conversations: Vec<Conversation>,
    messages: HashMap<String, IndexMap<String, Message>>,
}

impl ChatCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The signed-in username. Empty until authentication completes.
    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn set_username(&mut self, username: impl Into<String>) {
        self.username = username.into();
    }

    /// Clear the identity on sign-out.
    pub fn clear_username(&mut self) {
        self.username.clear();
    }

    /// All conversations, in list order.
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn conversation_by_id(&self, conversation_id: &str) -> Option<&Conversation> {
        self.conversations
            .iter()
            .find(|c| c.conversation_id == conversation_id)
    }

    /// Replace the entire conversation list and re-initialize one empty
    /// message collection per conversation. This is a destructive reset:
    /// any previously held messages are dropped.
    pub fn set_conversations(&mut self, conversations: Vec<Conversation>) {
        let mut messages = HashMap::with_capacity(conversations.len());
        for conversation in &conversations {
            messages.insert(conversation.conversation_id.clone(), IndexMap::new());
        }
        self.conversations = conversations;
        self.messages = messages;
    }

    /// Append a conversation and allocate its empty message collection.
    ///
    /// No dedup check: inserting a duplicate id is a caller error, and the
    /// fresh collection replaces whatever the old entry held.
    pub fn add_conversation(&mut self, conversation: Conversation) {
        self.messages
            .insert(conversation.conversation_id.clone(), IndexMap::new());
        self.conversations.push(conversation);
    }

    /// The conversation's messages in insertion order. Unknown conversations
    /// yield an empty iterator.
    pub fn messages<'a>(
        &'a self,
        conversation_id: &str,
    ) -> impl Iterator<Item = &'a Message> + 'a {
        self.messages
            .get(conversation_id)
            .into_iter()
            .flat_map(|log| log.values())
    }

    pub fn message_count(&self, conversation_id: &str) -> usize {
        self.messages.get(conversation_id).map_or(0, IndexMap::len)
    }

    pub fn contains_message(&self, conversation_id: &str, message_id: &str) -> bool {
        self.messages
            .get(conversation_id)
            .is_some_and(|log| log.contains_key(message_id))
    }

    /// Replace the conversation's collection wholesale, keyed by
    /// `message_id` and preserving the input order. Used for bulk/initial
    /// loads.
    pub fn set_messages_for_conversation(
        &mut self,
        conversation_id: &str,
        messages: Vec<Message>,
    ) {
        let mut log = IndexMap::with_capacity(messages.len());
        for message in messages {
            log.insert(message.message_id.clone(), message);
        }
        self.messages.insert(conversation_id.to_string(), log);
    }

    /// Upsert a message by `message_id`. A second arrival of the same id
    /// replaces the record without growing the collection.
    ///
    /// Adding to a conversation that is not loaded is tolerated silently;
    /// a broadcast can race the conversation list.
    pub fn add_message_to_conversation(&mut self, conversation_id: &str, message: Message) {
        match self.messages.get_mut(conversation_id) {
            Some(log) => {
                log.insert(message.message_id.clone(), message);
            }
            None => {
                tracing::debug!(
                    conversation_id,
                    message_id = %message.message_id,
                    "dropping message for unknown conversation"
                );
            }
        }
    }

    /// Prepend a batch of older messages, keeping the relative order of both
    /// the new batch and the existing collection. Used for paginated history
    /// loads at the top of a conversation.
    pub fn add_old_messages_to_conversation(
        &mut self,
        conversation_id: &str,
        older: Vec<Message>,
    ) {
        let Some(log) = self.messages.get_mut(conversation_id) else {
            tracing::debug!(conversation_id, "dropping history for unknown conversation");
            return;
        };
        let mut merged = IndexMap::with_capacity(older.len() + log.len());
        for message in older {
            merged.insert(message.message_id.clone(), message);
        }
        for (message_id, message) in log.drain(..) {
            merged.insert(message_id, message);
        }
        *log = merged;
    }

    /// Replace the optimistic record keyed by `temp_id` with one keyed by
    /// the confirmed `message_id`, carrying the server timestamp and
    /// otherwise identical content. The record keeps its position in the
    /// collection, and the temporary key is gone afterwards.
    ///
    /// Returns false when no record is held under `temp_id` (already
    /// promoted, or a confirmation for someone else's send).
    pub fn promote_message(
        &mut self,
        conversation_id: &str,
        temp_id: &str,
        message_id: &str,
        date_time: i64,
    ) -> bool {
        let Some(log) = self.messages.get_mut(conversation_id) else {
            return false;
        };
        let Some(index) = log.get_index_of(temp_id) else {
            return false;
        };
        let Some((_, mut message)) = log.shift_remove_index(index) else {
            return false;
        };
        message.message_id = message_id.to_string();
        message.date_time = date_time;
        // If the confirmed id already arrived as a broadcast echo, this
        // insert collapses onto that entry instead of duplicating it.
        log.shift_insert(index, message.message_id.clone(), message);
        true
    }
}
