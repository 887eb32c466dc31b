//! palaver-store: the client's in-memory view of conversations and
//! messages. Purely synchronous, no I/O, and no awareness of the network.
//! The connection and reconciliation layers call mutation operations here
//! and never touch the internals.

pub mod cache;

pub use cache::ChatCache;
