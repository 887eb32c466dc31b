use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Message body: either plain text or a raw media payload that has not yet
/// been converted to its transmissible text form.
///
/// `Media` deliberately fails serialization. The send pipeline must run the
/// conversion step first, so an unconverted blob can never end up inline in
/// a JSON frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    Text(String),
    Media(Bytes),
}

impl MessageContent {
    /// The text form, if this content has one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MessageContent::Text(s) => Some(s),
            MessageContent::Media(_) => None,
        }
    }

    pub fn is_media(&self) -> bool {
        matches!(self, MessageContent::Media(_))
    }
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        MessageContent::Text(s)
    }
}

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        MessageContent::Text(s.to_string())
    }
}

impl From<Bytes> for MessageContent {
    fn from(bytes: Bytes) -> Self {
        MessageContent::Media(bytes)
    }
}

impl From<Vec<u8>> for MessageContent {
    fn from(bytes: Vec<u8>) -> Self {
        MessageContent::Media(Bytes::from(bytes))
    }
}

impl Serialize for MessageContent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MessageContent::Text(s) => serializer.serialize_str(s),
            MessageContent::Media(_) => Err(serde::ser::Error::custom(
                "media content must be converted to text before serialization",
            )),
        }
    }
}

impl<'de> Deserialize<'de> for MessageContent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(MessageContent::Text(String::deserialize(deserializer)?))
    }
}

/// A message as it lives in the cache and on the wire.
///
/// `message_id` is the identity. Before the server confirms a send, the id
/// is a client-generated temporary uuid and `date_time` is the local clock;
/// confirmation replaces both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub message_id: String,
    pub conversation_id: String,
    pub username: String,
    pub content: MessageContent,
    /// Epoch milliseconds.
    pub date_time: i64,
    pub is_media: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<MessageOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_data: Option<MessageMetaData>,
}

/// Per-message display options (media messages).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_be_saved: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_sensitive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_play_on: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// Free-form message annotations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetaData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub popup_text: Option<String>,
    // The server spells this one with a capital I.
    #[serde(rename = "IsLocation", skip_serializing_if = "Option::is_none")]
    pub is_location: Option<bool>,
}

/// A named group of users sharing an ordered message history.
///
/// Identity is `conversation_id`. Conversations are only ever appended to or
/// replaced wholesale, never mutated field-by-field. The location-sharing
/// metadata is carried opaquely for the rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub conversation_id: String,
    pub name: String,
    pub users: Vec<String>,
    /// Epoch milliseconds.
    pub creation_date_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markers: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_settings: Option<serde_json::Value>,
}
