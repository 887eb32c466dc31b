//! Reconciliation between optimistic local writes and authoritative server
//! state.
//!
//! [`ChatSession`] sits on top of the [`Socket`] and the shared
//! [`ChatCache`]. Sending inserts an optimistic record under a temporary id
//! before anything touches the network; the server's `id` action later
//! promotes that record to its real identity, and broadcast `message`
//! actions upsert idempotently so a delayed echo of our own send never
//! duplicates. Each mutation emits a [`ChatEvent`] so the UI can re-render.
//!
//! Display order within a conversation is cache insertion order. Network
//! delivery order is not guaranteed, so the observable order can differ
//! from strict `date_time` order; renderers that care re-sort themselves.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::mpsc;
use uuid::Uuid;

use palaver_shared::{
    ClientAction, Conversation, ConversationRequest, LikeRequest, MessageContent, MessageMetaData,
    MessageOptions, OutgoingMessage,
};
use palaver_store::ChatCache;

use crate::api::ApiClient;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::socket::{ConnectionState, Socket};

/// Notifications for the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// A broadcast message landed in the cache (net-new or echo).
    MessageReceived {
        conversation_id: String,
        message_id: String,
    },
    /// An optimistic record was promoted to its server identity.
    MessageConfirmed {
        conversation_id: String,
        temp_id: String,
        message_id: String,
    },
    /// A like count changed. The cache does not model like counts; this is
    /// a pass-through for the UI.
    MessageLiked {
        conversation_id: String,
        message_id: String,
        likes: u64,
    },
    /// The conversation list was (re)loaded.
    ConversationsLoaded,
    /// A conversation's history was (re)loaded.
    MessagesLoaded { conversation_id: String },
    /// A conversation was created and appended.
    ConversationAdded { conversation_id: String },
}

/// A message about to be sent. `is_media` on the wire follows from the
/// content variant.
#[derive(Debug, Clone)]
pub struct Draft {
    pub conversation_id: String,
    pub content: MessageContent,
    pub root_id: Option<String>,
    pub options: Option<MessageOptions>,
    pub meta_data: Option<MessageMetaData>,
}

impl Draft {
    pub fn text(conversation_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            content: MessageContent::Text(text.into()),
            root_id: None,
            options: None,
            meta_data: None,
        }
    }

    pub fn media(conversation_id: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            content: MessageContent::from(bytes.into()),
            ..Self::text(conversation_id, "")
        }
    }
}

/// The reconciliation layer: one per signed-in client, owning the socket
/// and sharing the cache with the UI.
pub struct ChatSession {
    cache: Arc<Mutex<ChatCache>>,
    socket: Socket,
    api: ApiClient,
    events: mpsc::UnboundedSender<ChatEvent>,
}

// A poisoned lock only means some reader panicked mid-view; the cache data
// itself is still consistent, so keep going with it.
fn lock_cache(cache: &Mutex<ChatCache>) -> MutexGuard<'_, ChatCache> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ChatSession {
    /// Build a session over a shared cache. Returns the receiving end of
    /// the event stream for the rendering layer to drain.
    pub fn new(
        config: &ClientConfig,
        cache: Arc<Mutex<ChatCache>>,
    ) -> (Self, mpsc::UnboundedReceiver<ChatEvent>) {
        let (events, event_rx) = mpsc::unbounded_channel();
        let session = Self {
            cache,
            socket: Socket::new(config.ws_url()),
            api: ApiClient::new(config.api_base()),
            events,
        };
        (session, event_rx)
    }

    /// Open the realtime connection and register the inbound handlers.
    pub async fn connect(&mut self) -> Result<()> {
        self.socket.connect().await?;
        self.install_handlers();
        Ok(())
    }

    /// Close the realtime connection. The cache is untouched.
    pub fn disconnect(&mut self) {
        self.socket.close();
    }

    /// Close the connection and clear the identity.
    pub fn sign_out(&mut self) {
        self.socket.close();
        lock_cache(&self.cache).clear_username();
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.socket.state()
    }

    /// Observe connection transitions, e.g. to drive an application-level
    /// reconnect.
    pub fn on_connection_change<F>(&self, observer: F)
    where
        F: FnMut(ConnectionState) + Send + 'static,
    {
        self.socket.on_state_change(observer);
    }

    /// Wire the three inbound action kinds to cache mutations. Idempotent:
    /// handler registration is latest-wins, so calling this again simply
    /// replaces the previous wiring.
    pub fn install_handlers(&self) {
        let cache = Arc::clone(&self.cache);
        let events = self.events.clone();
        self.socket.on_message(move |message| {
            let conversation_id = message.conversation_id.clone();
            let message_id = message.message_id.clone();
            // Upsert: an echo of our own already-confirmed send collapses
            // onto the existing record instead of duplicating it.
            lock_cache(&cache).add_message_to_conversation(&conversation_id, message);
            let _ = events.send(ChatEvent::MessageReceived {
                conversation_id,
                message_id,
            });
        });

        let cache = Arc::clone(&self.cache);
        let events = self.events.clone();
        self.socket.on_id(move |assignment| {
            let promoted = lock_cache(&cache).promote_message(
                &assignment.conversation_id,
                &assignment.temp_id,
                &assignment.message_id,
                assignment.date_time,
            );
            if promoted {
                let _ = events.send(ChatEvent::MessageConfirmed {
                    conversation_id: assignment.conversation_id,
                    temp_id: assignment.temp_id,
                    message_id: assignment.message_id,
                });
            } else {
                tracing::debug!(
                    temp_id = %assignment.temp_id,
                    "id confirmation for a temporary id we do not hold"
                );
            }
        });

        let events = self.events.clone();
        self.socket.on_like(move |update| {
            let _ = events.send(ChatEvent::MessageLiked {
                conversation_id: update.conversation_id,
                message_id: update.message_id,
                likes: update.likes,
            });
        });
    }

    /// Optimistic send: insert the record under a fresh temporary id and
    /// the local clock, then transmit. The record is visible to the UI
    /// before any network round trip, and it stays in place if transmission
    /// fails; only the transmission failure is reported.
    ///
    /// Returns the temporary id the eventual `id` action will refer to.
    pub async fn send_message(&self, draft: Draft) -> Result<String> {
        let username = lock_cache(&self.cache).username().to_string();
        let outgoing = OutgoingMessage {
            temp_message_id: Uuid::new_v4().to_string(),
            temp_date_time: Utc::now().timestamp_millis(),
            conversation_id: draft.conversation_id,
            username,
            is_media: draft.content.is_media(),
            content: draft.content,
            root_id: draft.root_id,
            options: draft.options,
            meta_data: draft.meta_data,
        };
        let temp_id = outgoing.temp_message_id.clone();

        lock_cache(&self.cache)
            .add_message_to_conversation(&outgoing.conversation_id, outgoing.to_message());

        self.socket
            .send(ClientAction::Message { data: outgoing })
            .await?;
        Ok(temp_id)
    }

    /// Like a message on behalf of the signed-in user.
    pub async fn send_like(&self, conversation_id: &str, message_id: &str) -> Result<()> {
        let user_id = lock_cache(&self.cache).username().to_string();
        self.socket
            .send(ClientAction::Like {
                data: LikeRequest {
                    message_id: message_id.to_string(),
                    conversation_id: conversation_id.to_string(),
                    user_id,
                },
            })
            .await
    }

    /// Announce a conversation to its participants over the realtime
    /// connection.
    pub async fn announce_conversation(&self, name: &str, users: Vec<String>) -> Result<()> {
        self.socket
            .send(ClientAction::Conversation {
                data: ConversationRequest {
                    name: name.to_string(),
                    users,
                },
            })
            .await
    }

    /// Ask the server for a batch of recent messages.
    pub async fn request_batch(&self, limit: u32) -> Result<()> {
        self.socket.send(ClientAction::MessageBatch { limit }).await
    }

    /// Bulk-load the signed-in user's conversations into the cache. On an
    /// upstream error the cache is left exactly as it was.
    pub async fn load_conversations(&self) -> Result<()> {
        let username = lock_cache(&self.cache).username().to_string();
        let conversations = self.api.fetch_conversations(&username).await?;
        lock_cache(&self.cache).set_conversations(conversations);
        let _ = self.events.send(ChatEvent::ConversationsLoaded);
        Ok(())
    }

    /// Bulk-load a conversation's recent history into the cache. On an
    /// upstream error the collection is left exactly as it was.
    pub async fn load_messages(&self, conversation_id: &str, limit: u32) -> Result<()> {
        let messages = self.api.fetch_messages(conversation_id, limit).await?;
        lock_cache(&self.cache).set_messages_for_conversation(conversation_id, messages);
        let _ = self.events.send(ChatEvent::MessagesLoaded {
            conversation_id: conversation_id.to_string(),
        });
        Ok(())
    }

    /// Create a conversation via the HTTP API and append it to the cache.
    pub async fn start_conversation(&self, name: &str, users: Vec<String>) -> Result<Conversation> {
        let conversation = self.api.create_conversation(name, users).await?;
        lock_cache(&self.cache).add_conversation(conversation.clone());
        let _ = self.events.send(ChatEvent::ConversationAdded {
            conversation_id: conversation.conversation_id.clone(),
        });
        Ok(conversation)
    }
}
