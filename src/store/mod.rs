//! Storage collaborator contracts and the process-local reference backends.
//!
//! The chat core is a client of two external stores: a document store
//! (point reads/writes, set-mutation primitives) and a realtime keyed-tree
//! store (push keys, ordered-child queries, live window subscriptions).
//! Both are expressed as object-safe async traits so that a hosted backend
//! can be wired in without touching the services; the in-memory
//! implementations here back the test suite and embedders without one.

pub mod document;
pub mod memory_document;
pub mod memory_realtime;
pub mod realtime;

pub use document::DocumentStore;
pub use memory_document::MemoryDocumentStore;
pub use memory_realtime::MemoryRealtimeStore;
pub use realtime::{server_timestamp, ChildQuery, ListenerId, LiveWindow, RealtimeStore};
