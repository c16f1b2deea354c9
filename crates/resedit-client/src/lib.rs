//! resedit bridge client library
//!
//! Provides the typed [`Backend`] call surface to the out-of-process backend
//! that parses and serializes resources, two implementations of it (the
//! JSON line protocol over a child process or any stream, and an in-memory
//! backend for tests), and the [`BridgeClient`] that owns the observable
//! path and resource cells.
//!
//! ```text
//!   BridgeClient                       Backend (trait)
//!   ┌──────────────────────┐  calls   ┌───────────────────────────────┐
//!   │ opened_path    (watch)│ ───────▶ │ JsonRpcBackend ── stdin/stdout │
//!   │ opened_resource(watch)│ ◀─────── │ MemoryBackend                  │
//!   └──────────────────────┘  result  └───────────────────────────────┘
//!                                       │ pushes (open_file, ...)
//!                                       ▼
//!                               mpsc<BackendPush> → session queue
//! ```

pub mod backend;
pub mod bridge;
pub mod error;
pub mod json_rpc;
pub mod memory;
pub mod protocol;

pub use backend::{Backend, BackendMethod, BackendPush};
pub use bridge::BridgeClient;
pub use error::BackendError;
pub use json_rpc::{BackendCommand, JsonRpcBackend};
pub use memory::{BackendCall, MemoryBackend};
