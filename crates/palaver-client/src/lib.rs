//! palaver-client: the realtime synchronization core of the chat client.
//!
//! The pieces, bottom up: [`socket::Socket`] owns the single WebSocket and
//! dispatches inbound actions; [`api::ApiClient`] does the HTTP bulk loads;
//! [`session::ChatSession`] is the reconciliation policy that keeps the
//! shared [`palaver_store::ChatCache`] converged with the server.

pub mod api;
pub mod config;
pub mod error;
pub mod session;
pub mod socket;

pub use api::ApiClient;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use session::{ChatEvent, ChatSession, Draft};
pub use socket::{ConnectionState, Socket};

use tracing_subscriber::{fmt, EnvFilter};

/// Install the process-wide tracing subscriber. Call once at startup.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("palaver_client=debug,palaver_store=info,warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
