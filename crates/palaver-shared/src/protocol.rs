//! Actions exchanged over the realtime connection.
//!
//! Every frame is a UTF-8 JSON object with a mandatory string `action`
//! discriminator. Both unions are closed: an inbound frame whose tag matches
//! no [`ServerAction`] variant fails to parse, which the connection layer
//! reports as a protocol error instead of ignoring it, so client/server skew
//! surfaces early.

use serde::{Deserialize, Serialize};

use crate::types::{Message, MessageContent, MessageMetaData, MessageOptions};

/// Client → server actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ClientAction {
    /// Send a message, identified by a temporary client-generated id until
    /// the server answers with an `id` action.
    Message { data: OutgoingMessage },
    /// Like a message.
    Like { data: LikeRequest },
    /// Announce a newly created conversation to its participants.
    Conversation { data: ConversationRequest },
    /// Request a batch of recent messages. `limit` sits at the top level of
    /// the frame, not under `data`.
    MessageBatch { limit: u32 },
}

/// Server → client actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ServerAction {
    /// A message broadcast from any participant, possibly a delayed echo of
    /// this client's own send.
    Message { data: Message },
    /// Updated like count for a message.
    Like { data: LikeUpdate },
    /// Confirmation of a send: the authoritative id and timestamp for the
    /// record currently held under `temp_id`.
    Id { data: IdAssignment },
}

/// Payload of an outbound `message` action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub temp_message_id: String,
    /// Epoch milliseconds, local clock.
    pub temp_date_time: i64,
    pub conversation_id: String,
    pub username: String,
    pub content: MessageContent,
    pub is_media: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<MessageOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_data: Option<MessageMetaData>,
}

impl OutgoingMessage {
    /// The optimistic cache record for this send: keyed by the temporary id
    /// and stamped with the local clock until the server confirms.
    pub fn to_message(&self) -> Message {
        Message {
            message_id: self.temp_message_id.clone(),
            conversation_id: self.conversation_id.clone(),
            username: self.username.clone(),
            content: self.content.clone(),
            date_time: self.temp_date_time,
            is_media: self.is_media,
            root_id: self.root_id.clone(),
            options: self.options.clone(),
            meta_data: self.meta_data.clone(),
        }
    }
}

/// Payload of an outbound `like` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeRequest {
    pub message_id: String,
    pub conversation_id: String,
    pub user_id: String,
}

/// Payload of an outbound `conversation` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRequest {
    pub name: String,
    pub users: Vec<String>,
}

/// Payload of an inbound `like` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeUpdate {
    pub message_id: String,
    pub conversation_id: String,
    pub likes: u64,
}

/// Payload of an inbound `id` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdAssignment {
    pub message_id: String,
    pub conversation_id: String,
    pub temp_id: String,
    /// Epoch milliseconds, server clock.
    pub date_time: i64,
}
