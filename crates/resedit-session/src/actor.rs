//! The session task.
//!
//! One tokio task owns the [`Controller`] and runs everything that touches
//! the backend one step at a time: user commands sent through a
//! [`SessionHandle`], and pushes coming from the backend. A push that
//! arrives while a flow is running waits until the flow is done.
//!
//! ```text
//!   SessionHandle (Clone)       mpsc        session task
//!   ┌──────────────────────┐  ────────▶  ┌──────────────────────────┐
//!   │ .save() .reload()    │             │ Controller               │
//!   │ .run_custom_action() │  ◀────────  │  one flow at a time      │
//!   │ .open()              │   oneshot   │                          │
//!   └──────────────────────┘             └──────────────────────────┘
//!                                              ▲ mpsc<BackendPush>
//!                                              │
//!                                        backend reader task
//! ```

use std::sync::Arc;

use resedit_client::{BackendError, BackendPush, BridgeClient};
use resedit_types::{BlockId, CustomAction, OpenedResource};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};

use crate::block::BlockEditor;
use crate::changes::PendingChanges;
use crate::controller::{
    ActionOutcome, Controller, OpenOutcome, ReloadOutcome, SaveOutcome, SessionState,
};
use crate::editors::AnyEditor;

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("session shut down")]
    Shutdown,
}

// ============================================================================
// Commands (internal)
// ============================================================================

enum SessionCommand {
    // Flows
    Save {
        reply: oneshot::Sender<SaveOutcome>,
    },
    Reload {
        reply: oneshot::Sender<ReloadOutcome>,
    },
    RunCustomAction {
        block_id: BlockId,
        action: CustomAction,
        reply: oneshot::Sender<ActionOutcome>,
    },
    Open {
        path: String,
        reply: oneshot::Sender<OpenOutcome>,
    },

    // Pass-throughs
    OpenWithSystemViewer {
        path: String,
        reply: oneshot::Sender<Result<(), BackendError>>,
    },
    SerializeResource {
        block_id: BlockId,
        settings_patch: Option<Value>,
        reply: oneshot::Sender<Result<Vec<String>, BackendError>>,
    },
    SerializeResourcePreview {
        block_id: BlockId,
        settings_patch: Option<Value>,
        reply: oneshot::Sender<Result<Vec<String>, BackendError>>,
    },
    DeserializeResource {
        block_id: BlockId,
        reply: oneshot::Sender<Result<OpenedResource, BackendError>>,
    },
}

// ============================================================================
// SessionHandle (public API)
// ============================================================================

/// Cloneable handle to a running session.
///
/// Flow methods queue a command and wait for its outcome. Reads of the
/// cells and the pending changes do not queue.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionCommand>,
    bridge: BridgeClient,
    changes: PendingChanges,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .map_err(|_| SessionError::Shutdown)?;
        rx.await.map_err(|_| SessionError::Shutdown)
    }

    // ── Flows ────────────────────────────────────────────────────────────

    pub async fn save(&self) -> Result<SaveOutcome, SessionError> {
        self.request(|reply| SessionCommand::Save { reply }).await
    }

    pub async fn reload(&self) -> Result<ReloadOutcome, SessionError> {
        self.request(|reply| SessionCommand::Reload { reply }).await
    }

    pub async fn run_custom_action(
        &self,
        block_id: &BlockId,
        action: &CustomAction,
    ) -> Result<ActionOutcome, SessionError> {
        self.request(|reply| SessionCommand::RunCustomAction {
            block_id: block_id.clone(),
            action: action.clone(),
            reply,
        })
        .await
    }

    pub async fn open(&self, path: &str) -> Result<OpenOutcome, SessionError> {
        self.request(|reply| SessionCommand::Open {
            path: path.to_string(),
            reply,
        })
        .await
    }

    // ── Pass-throughs ────────────────────────────────────────────────────

    pub async fn open_with_system_viewer(&self, path: &str) -> Result<(), SessionError> {
        Ok(self
            .request(|reply| SessionCommand::OpenWithSystemViewer {
                path: path.to_string(),
                reply,
            })
            .await??)
    }

    pub async fn serialize_resource(
        &self,
        block_id: &BlockId,
        settings_patch: Option<Value>,
    ) -> Result<Vec<String>, SessionError> {
        Ok(self
            .request(|reply| SessionCommand::SerializeResource {
                block_id: block_id.clone(),
                settings_patch,
                reply,
            })
            .await??)
    }

    pub async fn serialize_resource_preview(
        &self,
        block_id: &BlockId,
        settings_patch: Option<Value>,
    ) -> Result<Vec<String>, SessionError> {
        Ok(self
            .request(|reply| SessionCommand::SerializeResourcePreview {
                block_id: block_id.clone(),
                settings_patch,
                reply,
            })
            .await??)
    }

    pub async fn deserialize_resource(
        &self,
        block_id: &BlockId,
    ) -> Result<OpenedResource, SessionError> {
        Ok(self
            .request(|reply| SessionCommand::DeserializeResource {
                block_id: block_id.clone(),
                reply,
            })
            .await??)
    }

    // ── Direct access ────────────────────────────────────────────────────

    pub fn bridge(&self) -> &BridgeClient {
        &self.bridge
    }

    pub fn changes(&self) -> &PendingChanges {
        &self.changes
    }

    pub fn attach_editor(&self, editor: Arc<dyn BlockEditor>) {
        self.changes.attach(editor);
    }

    /// Attach every editable block of an editor tree.
    pub fn attach_editors(&self, editor: &AnyEditor) {
        self.changes.attach_all(editor);
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// True once the session task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ============================================================================
// Session task (internal)
// ============================================================================

struct SessionActor {
    controller: Controller,
}

impl SessionActor {
    /// Announce readiness, then process commands and pushes until every
    /// handle is gone.
    ///
    /// The announcement runs on its own task so a backend that never
    /// acknowledges it cannot hold up the queue. When a command and a push
    /// are both ready the command goes first; each channel keeps its own
    /// arrival order.
    async fn run(
        self,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
        pushes: mpsc::UnboundedReceiver<BackendPush>,
    ) {
        let bridge = self.controller.bridge().clone();
        tokio::spawn(async move {
            if let Err(e) = bridge.frontend_ready().await {
                tracing::warn!(error = %e, "backend did not acknowledge readiness");
            }
        });

        let mut pushes = Some(pushes);
        loop {
            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                push = next_push(&mut pushes) => match push {
                    Some(push) => {
                        tracing::debug!(?push, "backend push");
                        self.controller.handle_push(push).await;
                    }
                    None => {
                        tracing::debug!("backend push channel closed");
                        pushes = None;
                    }
                },
            }
        }
        tracing::debug!("session shutting down: all handles dropped");
    }

    async fn handle_command(&self, command: SessionCommand) {
        let c = &self.controller;
        match command {
            // ── Flows ────────────────────────────────────────────────
            SessionCommand::Save { reply } => {
                let _ = reply.send(c.save().await);
            }
            SessionCommand::Reload { reply } => {
                let _ = reply.send(c.reload().await);
            }
            SessionCommand::RunCustomAction {
                block_id,
                action,
                reply,
            } => {
                let _ = reply.send(c.run_custom_action(&block_id, &action).await);
            }
            SessionCommand::Open { path, reply } => {
                let _ = reply.send(c.open(&path).await);
            }

            // ── Pass-throughs ────────────────────────────────────────
            SessionCommand::OpenWithSystemViewer { path, reply } => {
                let _ = reply.send(c.open_with_system_viewer(&path).await);
            }
            SessionCommand::SerializeResource {
                block_id,
                settings_patch,
                reply,
            } => {
                let out = c
                    .serialize_resource(&block_id, settings_patch.as_ref())
                    .await;
                let _ = reply.send(out);
            }
            SessionCommand::SerializeResourcePreview {
                block_id,
                settings_patch,
                reply,
            } => {
                let out = c
                    .serialize_resource_preview(&block_id, settings_patch.as_ref())
                    .await;
                let _ = reply.send(out);
            }
            SessionCommand::DeserializeResource { block_id, reply } => {
                let _ = reply.send(c.deserialize_resource(&block_id).await);
            }
        }
    }
}

async fn next_push(pushes: &mut Option<mpsc::UnboundedReceiver<BackendPush>>) -> Option<BackendPush> {
    match pushes {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

// ============================================================================
// Public spawn function
// ============================================================================

/// Spawn the session task on the current tokio runtime.
///
/// `pushes` is the receiver returned alongside the backend (for example
/// by `JsonRpcBackend::new`). The task tells the backend the session is
/// ready without waiting for the answer, then serves commands and pushes.
pub fn spawn_session(
    controller: Controller,
    pushes: mpsc::UnboundedReceiver<BackendPush>,
) -> SessionHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = SessionHandle {
        tx,
        bridge: controller.bridge().clone(),
        changes: controller.changes().clone(),
        state: controller.subscribe_state(),
    };
    let actor = SessionActor { controller };
    tokio::spawn(actor.run(rx, pushes));
    handle
}
