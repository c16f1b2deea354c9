//! Editor session for one open resource.
//!
//! Sits on top of [`resedit_client::BridgeClient`] and owns everything the
//! editor knows that the backend does not: the unsaved edits, the block
//! editors that produce them, and the flows (save, reload, custom action,
//! open) that turn them into backend calls.
//!
//! ```text
//!   SessionHandle (Clone)     mpsc       session task
//!   ┌──────────────────┐  ─────────▶  ┌────────────────────────────┐
//!   │ .save()          │              │ Controller                 │
//!   │ .reload()        │  ◀─────────  │  ├─ BridgeClient (cells)    │
//!   │ .run_action()    │   oneshot    │  ├─ PendingChanges          │
//!   └──────────────────┘              │  └─ Prompter / Notifier     │
//!        │ edits                      └────────────────────────────┘
//!        ▼                                  ▲ BackendPush (mpsc)
//!   PendingChanges (shared)                 │
//! ```
//!
//! Flows run one at a time on the session task. Block edits do not queue:
//! editors write straight into the shared [`PendingChanges`].

pub mod actor;
pub mod block;
pub mod changes;
pub mod config;
pub mod controller;
pub mod editors;

pub use actor::{SessionError, SessionHandle, spawn_session};
pub use block::{BlockEditor, ChangeNotifier};
pub use changes::{EXTERNAL_CHANGES_KEY, PendingChanges};
pub use config::{ConfigError, SessionConfig};
pub use controller::{
    ActionOutcome, Controller, Notification, NotificationLevel, Notifier, OpenOutcome, Prompter,
    ReloadOutcome, SaveOutcome, SessionState,
};
pub use editors::{AnyEditor, CompoundEditor, EditError, NumberEditor, ValueEditor, editor_for};
