//! The realtime connection client.
//!
//! [`Socket`] owns the single live WebSocket, serializes outgoing
//! [`ClientAction`]s into JSON text frames, and dispatches every inbound
//! frame to the one handler currently registered for its action kind. Frame
//! I/O runs on two spawned tasks bridged by a channel; protocol policy stays
//! with the caller.
//!
//! The connection state machine is `Closed → Connecting → Open → Closed`.
//! Only one connection is ever live: [`Socket::connect`] tears down the
//! prior socket first, and [`Socket::close`] ends in `Closed` from any
//! state.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{info, warn};

use palaver_shared::{ClientAction, IdAssignment, LikeUpdate, Message, MessageContent, ServerAction};

use crate::error::{ClientError, Result};

/// Outbound frames queued between `send` callers and the writer task.
const OUTBOUND_BUFFER: usize = 32;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Handler for inbound `message` actions.
pub type MessageHandler = Box<dyn FnMut(Message) + Send>;
/// Handler for inbound `like` actions.
pub type LikeHandler = Box<dyn FnMut(LikeUpdate) + Send>;
/// Handler for inbound `id` actions.
pub type IdHandler = Box<dyn FnMut(IdAssignment) + Send>;
/// Observer of connection state transitions.
pub type StateObserver = Box<dyn FnMut(ConnectionState) + Send>;

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Connecting,
    Open,
}

/// One registered handler per inbound action kind. Registering again
/// replaces the previous handler: whichever surface currently owns the
/// screen is the one that receives deliveries.
#[derive(Default)]
struct Handlers {
    message: Option<MessageHandler>,
    like: Option<LikeHandler>,
    id: Option<IdHandler>,
}

/// State shared with the reader task.
struct Shared {
    handlers: Mutex<Handlers>,
    state: Mutex<ConnectionState>,
    observer: Mutex<Option<StateObserver>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            handlers: Mutex::new(Handlers::default()),
            state: Mutex::new(ConnectionState::Closed),
            observer: Mutex::new(None),
        }
    }

    fn state(&self) -> ConnectionState {
        self.state.lock().map_or(ConnectionState::Closed, |s| *s)
    }

    fn set_state(&self, next: ConnectionState) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if *state == next {
            return;
        }
        *state = next;
        drop(state);

        let Ok(mut observer) = self.observer.lock() else {
            return;
        };
        if let Some(callback) = observer.as_mut() {
            callback(next);
        }
    }
}

/// Handle to the live connection's tasks and outbound queue.
struct Connection {
    outbound: mpsc::Sender<WsMessage>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Connection {
    fn stop(&self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// The connection client. See the module docs for the lifecycle contract.
pub struct Socket {
    url: String,
    shared: Arc<Shared>,
    conn: Option<Connection>,
}

impl Socket {
    /// A closed socket pointing at `url`. No I/O happens until
    /// [`Socket::connect`].
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            shared: Arc::new(Shared::new()),
            conn: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Open the transport and start the frame pump. Any prior connection is
    /// closed first, so repeated calls never produce two live sockets.
    /// Registered handlers survive reconnects.
    pub async fn connect(&mut self) -> Result<()> {
        self.close();
        self.shared.set_state(ConnectionState::Connecting);

        let (stream, _response) = match connect_async(self.url.as_str()).await {
            Ok(ok) => ok,
            Err(e) => {
                self.shared.set_state(ConnectionState::Closed);
                return Err(ClientError::Transport(e.to_string()));
            }
        };
        info!(url = %self.url, "websocket connected");

        let (write, read) = stream.split();
        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let writer = tokio::spawn(write_loop(outbound_rx, write));
        let reader = tokio::spawn(read_loop(read, Arc::clone(&self.shared)));

        self.conn = Some(Connection {
            outbound,
            reader,
            writer,
        });
        self.shared.set_state(ConnectionState::Open);
        Ok(())
    }

    /// Close the connection and release the handle so a stale reference can
    /// never be reused. Safe to call from any state; a no-op when already
    /// closed.
    pub fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.stop();
            info!("websocket closed");
        }
        self.shared.set_state(ConnectionState::Closed);
    }

    /// Serialize `action` and queue it for transmission.
    ///
    /// Fails with [`ClientError::NotConnected`] when no connection is open.
    /// A `message` action carrying raw media bytes goes through the
    /// conversion step first; if that fails the send fails with
    /// [`ClientError::Serialization`] and the connection stays usable.
    /// Concurrent media sends convert independently and may transmit in
    /// either order.
    pub async fn send(&self, action: ClientAction) -> Result<()> {
        let conn = match (&self.conn, self.state()) {
            (Some(conn), ConnectionState::Open) => conn,
            _ => return Err(ClientError::NotConnected),
        };

        let action = prepare_for_wire(action).await?;
        let frame = serde_json::to_string(&action)
            .map_err(|e| ClientError::Serialization(e.to_string()))?;

        conn.outbound
            .send(WsMessage::Text(frame))
            .await
            .map_err(|_| ClientError::NotConnected)
    }

    /// Register the handler for inbound `message` actions. The latest
    /// registration wins; the previous handler is dropped.
    pub fn on_message<F>(&self, handler: F)
    where
        F: FnMut(Message) + Send + 'static,
    {
        if let Ok(mut handlers) = self.shared.handlers.lock() {
            handlers.message = Some(Box::new(handler));
        }
    }

    /// Register the handler for inbound `like` actions. Latest wins.
    pub fn on_like<F>(&self, handler: F)
    where
        F: FnMut(LikeUpdate) + Send + 'static,
    {
        if let Ok(mut handlers) = self.shared.handlers.lock() {
            handlers.like = Some(Box::new(handler));
        }
    }

    /// Register the handler for inbound `id` actions. Latest wins.
    pub fn on_id<F>(&self, handler: F)
    where
        F: FnMut(IdAssignment) + Send + 'static,
    {
        if let Ok(mut handlers) = self.shared.handlers.lock() {
            handlers.id = Some(Box::new(handler));
        }
    }

    /// Observe state transitions, e.g. to drive an application-level
    /// reconnect policy. The core never reconnects on its own. Latest wins.
    pub fn on_state_change<F>(&self, observer: F)
    where
        F: FnMut(ConnectionState) + Send + 'static,
    {
        if let Ok(mut slot) = self.shared.observer.lock() {
            *slot = Some(Box::new(observer));
        }
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.stop();
        }
    }
}

/// Run the media conversion step if the action needs one, yielding an
/// action that is safe to serialize.
async fn prepare_for_wire(action: ClientAction) -> Result<ClientAction> {
    match action {
        ClientAction::Message { mut data } => {
            match data.content {
                MessageContent::Media(bytes) => {
                    data.content = MessageContent::Text(encode_media(bytes).await?);
                }
                MessageContent::Text(_) => {}
            }
            Ok(ClientAction::Message { data })
        }
        other => Ok(other),
    }
}

/// Convert a raw media payload to its transmissible text form.
///
/// Runs on a blocking worker so large payloads do not stall the event loop;
/// the sending caller is suspended, the connection is not.
pub(crate) async fn encode_media(bytes: Bytes) -> Result<String> {
    tokio::task::spawn_blocking(move || String::from_utf8(bytes.to_vec()))
        .await
        .map_err(|e| ClientError::Serialization(format!("media conversion task failed: {e}")))?
        .map_err(|e| ClientError::Serialization(format!("media content is not valid UTF-8: {e}")))
}

async fn write_loop(mut outbound: mpsc::Receiver<WsMessage>, mut write: SplitSink<WsStream, WsMessage>) {
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = write.send(frame).await {
            warn!(error = %e, "websocket write failed");
            break;
        }
    }
    let _ = write.close().await;
}

async fn read_loop(mut read: SplitStream<WsStream>, shared: Arc<Shared>) {
    while let Some(frame) = read.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => dispatch_frame(&shared, &text),
            Ok(WsMessage::Close(_)) => {
                info!("server closed the connection");
                break;
            }
            // Control frames carry no actions.
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "websocket read failed");
                break;
            }
        }
    }
    shared.set_state(ConnectionState::Closed);
}

/// Parse one inbound frame and hand it to the registered handler for its
/// action kind. Malformed frames and frames without a handler are dropped
/// with a diagnostic; neither is fatal to the connection.
fn dispatch_frame(shared: &Shared, text: &str) {
    let action: ServerAction = match serde_json::from_str(text) {
        Ok(action) => action,
        Err(e) => {
            let error = ClientError::Protocol(e.to_string());
            warn!(%error, "dropping inbound frame");
            return;
        }
    };

    let Ok(mut handlers) = shared.handlers.lock() else {
        return;
    };
    match action {
        ServerAction::Message { data } => match handlers.message.as_mut() {
            Some(handler) => handler(data),
            None => warn!("no handler registered for message actions"),
        },
        ServerAction::Like { data } => match handlers.like.as_mut() {
            Some(handler) => handler(data),
            None => warn!("no handler registered for like actions"),
        },
        ServerAction::Id { data } => match handlers.id.as_mut() {
            Some(handler) => handler(data),
            None => warn!("no handler registered for id actions"),
        },
    }
}
