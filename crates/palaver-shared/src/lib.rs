//! palaver-shared: the wire contract between client and server. Action
//! payloads plus the conversation/message models they carry. Pure data,
//! no I/O.

pub mod protocol;
pub mod types;

pub use protocol::{
    ClientAction, ConversationRequest, IdAssignment, LikeRequest, LikeUpdate, OutgoingMessage,
    ServerAction,
};
pub use types::{Conversation, Message, MessageContent, MessageMetaData, MessageOptions};
