//! Session flows: save, reload, run custom action, open.
//!
//! The [`Controller`] drives the [`BridgeClient`] and the [`PendingChanges`]
//! through each flow in a fixed order, asking the user through a
//! [`Prompter`] and reporting through a [`Notifier`]. Flows are plain async
//! methods; serializing them is the job of the session task
//! ([`crate::actor`]).
//!
//! ```text
//!  reload:  Idle ─dirty?─▶ AwaitingConfirm ─accept─▶ Reloading ─▶ Idle
//!                 └─clean──────────────────────────▶ ┘  (changes cleared on entry)
//!
//!  action:  Idle ─dirty?─▶ AwaitingConfirm ─accept─▶ Saving ─ok─┐
//!                 └─clean──────────────────────────────────────▶ CollectingArgs
//!           CollectingArgs ─args─▶ RunningAction ─ok──▶ Idle
//!                                               └─err─▶ Reloading ─▶ Idle
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use resedit_client::{BackendError, BackendPush, BridgeClient};
use resedit_types::{ActionArgError, BlockId, BlockValue, CustomAction, OpenedResource};
use serde_json::Value;
use strum::{Display, IntoStaticStr};
use tokio::sync::watch;

use crate::block::BlockEditor;
use crate::changes::PendingChanges;
use crate::config::SessionConfig;

// ── User-facing texts ────────────────────────────────────────────────────

pub const RELOAD_CONFIRM_TEXT: &str =
    "There are unsaved changes, which will be lost. Are you sure you want to reload file?";
pub const SAVE_FIRST_CONFIRM_TEXT: &str =
    "Cannot run custom action on a file with not saved changes. Do you want to save them first?";
pub const SAVED_TEXT: &str = "File Saved!";
pub const SAVE_FAILED_TEXT: &str = "Error while saving file! ";
pub const LOAD_FAILED_TEXT: &str = "Error while loading file! ";
pub const ACTION_DONE_TEXT: &str = "Action performed!";
pub const ACTION_FAILED_TEXT: &str = "Error while performing action! Reverting file state.. ";
pub const ACTION_ARGS_INVALID_TEXT: &str = "Invalid action arguments! ";
pub const SYSTEM_VIEWER_FAILED_TEXT: &str = "Error while opening file in system viewer! ";
pub const SERIALIZE_FAILED_TEXT: &str = "Error while serializing resource! ";
pub const DESERIALIZE_FAILED_TEXT: &str = "Error while deserializing resource! ";

// ============================================================================
// Collaborators
// ============================================================================

/// Blocking user dialogs. A dismissed dialog reads as a decline.
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Yes/no question. `true` means the user accepted.
    async fn confirm(&self, text: &str) -> bool;

    /// Ask for the action's arguments. `None` means the user cancelled.
    async fn collect_action_args(&self, action: &CustomAction) -> Option<Vec<BlockValue>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum NotificationLevel {
    Success,
    Error,
}

/// A transient toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub text: String,
    pub duration: Duration,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

// ============================================================================
// State and outcomes
// ============================================================================

/// Which step of which flow the session is in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    AwaitingConfirm,
    Saving,
    Reloading,
    CollectingArgs,
    RunningAction,
    Opening,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved,
    /// Pending changes are kept.
    Failed(BackendError),
    NothingOpen,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReloadOutcome {
    /// The resource was re-read; it may be a read error.
    Reloaded(OpenedResource),
    Failed(BackendError),
    Declined,
    NothingOpen,
}

impl ReloadOutcome {
    pub fn was_issued(&self) -> bool {
        matches!(self, Self::Reloaded(_) | Self::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Performed(Option<BlockValue>),
    /// The user would not save first.
    Declined,
    /// The argument dialog was dismissed.
    Cancelled,
    /// The forced save failed; the action was not run.
    SaveFailed(BackendError),
    InvalidArgs(ActionArgError),
    /// The action failed; local state was discarded and a reload attempted.
    Failed {
        error: BackendError,
        reload: ReloadOutcome,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum OpenOutcome {
    Opened(OpenedResource),
    Failed(BackendError),
    Declined,
}

// ============================================================================
// Controller
// ============================================================================

pub struct Controller {
    bridge: BridgeClient,
    changes: PendingChanges,
    prompter: Arc<dyn Prompter>,
    notifier: Arc<dyn Notifier>,
    config: SessionConfig,
    state_tx: watch::Sender<SessionState>,
}

impl Controller {
    pub fn new(
        bridge: BridgeClient,
        prompter: Arc<dyn Prompter>,
        notifier: Arc<dyn Notifier>,
        config: SessionConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Idle);
        Self {
            bridge,
            changes: PendingChanges::new(),
            prompter,
            notifier,
            config,
            state_tx,
        }
    }

    pub fn bridge(&self) -> &BridgeClient {
        &self.bridge
    }

    pub fn changes(&self) -> &PendingChanges {
        &self.changes
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Route a block editor's edits into the pending changes.
    pub fn attach_editor(&self, editor: Arc<dyn BlockEditor>) {
        self.changes.attach(editor);
    }

    // ── Save ─────────────────────────────────────────────────────────────

    pub async fn save(&self) -> SaveOutcome {
        let outcome = self.save_flow().await;
        self.set_state(SessionState::Idle);
        outcome
    }

    async fn save_flow(&self) -> SaveOutcome {
        let Some(path) = self.bridge.opened_path() else {
            tracing::debug!("save: nothing open");
            return SaveOutcome::NothingOpen;
        };
        self.set_state(SessionState::Saving);
        let snapshot = self.changes.change_set_for_commit();
        tracing::info!(%path, changes = snapshot.len(), "saving");

        match self.bridge.save(&path, &snapshot).await {
            Ok(()) => {
                self.changes.clear_unsaved_changes();
                self.success(SAVED_TEXT);
                SaveOutcome::Saved
            }
            Err(e) => {
                tracing::warn!(%path, error = %e, "save failed");
                self.failure(format!("{SAVE_FAILED_TEXT}{e}"));
                SaveOutcome::Failed(e)
            }
        }
    }

    // ── Reload ───────────────────────────────────────────────────────────

    pub async fn reload(&self) -> ReloadOutcome {
        let outcome = self.reload_flow().await;
        self.set_state(SessionState::Idle);
        outcome
    }

    async fn reload_flow(&self) -> ReloadOutcome {
        let Some(path) = self.bridge.opened_path() else {
            tracing::debug!("reload: nothing open");
            return ReloadOutcome::NothingOpen;
        };
        if self.changes.has_unsaved_changes() && !self.ask(RELOAD_CONFIRM_TEXT).await {
            tracing::debug!(%path, "reload declined");
            return ReloadOutcome::Declined;
        }

        self.set_state(SessionState::Reloading);
        self.changes.clear_unsaved_changes();
        tracing::info!(%path, "reloading");

        match self.bridge.open_resource(&path, true).await {
            Ok(resource) => ReloadOutcome::Reloaded(resource),
            Err(e) => {
                tracing::warn!(%path, error = %e, "reload failed");
                self.failure(format!("{LOAD_FAILED_TEXT}{e}"));
                ReloadOutcome::Failed(e)
            }
        }
    }

    // ── Custom action ────────────────────────────────────────────────────

    pub async fn run_custom_action(&self, block_id: &BlockId, action: &CustomAction) -> ActionOutcome {
        let outcome = self.action_flow(block_id, action).await;
        self.set_state(SessionState::Idle);
        outcome
    }

    async fn action_flow(&self, block_id: &BlockId, action: &CustomAction) -> ActionOutcome {
        tracing::info!(block = %block_id, action = %action.method, "custom action requested");

        if self.changes.has_unsaved_changes() {
            if !self.ask(SAVE_FIRST_CONFIRM_TEXT).await {
                tracing::debug!(action = %action.method, "save-first declined");
                return ActionOutcome::Declined;
            }
            match self.save_flow().await {
                SaveOutcome::Saved => {}
                SaveOutcome::Failed(e) => return ActionOutcome::SaveFailed(e),
                SaveOutcome::NothingOpen => {
                    let e = BackendError::new("no file is open");
                    self.failure(format!("{SAVE_FAILED_TEXT}{e}"));
                    return ActionOutcome::SaveFailed(e);
                }
            }
        }

        self.set_state(SessionState::CollectingArgs);
        let Some(args) = self.prompter.collect_action_args(action).await else {
            tracing::debug!(action = %action.method, "argument dialog cancelled");
            return ActionOutcome::Cancelled;
        };
        if let Err(e) = action.validate_args(&args) {
            tracing::warn!(action = %action.method, error = %e, "invalid action arguments");
            self.failure(format!("{ACTION_ARGS_INVALID_TEXT}{e}"));
            return ActionOutcome::InvalidArgs(e);
        }

        self.set_state(SessionState::RunningAction);
        match self.bridge.run_custom_action(block_id, action, &args).await {
            Ok(value) => {
                self.success(ACTION_DONE_TEXT);
                ActionOutcome::Performed(value)
            }
            Err(e) => {
                tracing::warn!(action = %action.method, error = %e, "custom action failed, reverting");
                // Edits made while the dialog was open go too.
                self.changes.clear_unsaved_changes();
                let reload = self.reload_flow().await;
                self.failure(format!("{ACTION_FAILED_TEXT}{e}"));
                ActionOutcome::Failed { error: e, reload }
            }
        }
    }

    // ── Open ─────────────────────────────────────────────────────────────

    /// Open `path`, replacing the current resource.
    pub async fn open(&self, path: &str) -> OpenOutcome {
        let outcome = self.open_flow(path).await;
        self.set_state(SessionState::Idle);
        outcome
    }

    async fn open_flow(&self, path: &str) -> OpenOutcome {
        if self.changes.has_unsaved_changes() && !self.ask(RELOAD_CONFIRM_TEXT).await {
            tracing::debug!(%path, "open declined");
            return OpenOutcome::Declined;
        }

        self.set_state(SessionState::Opening);
        self.changes.clear_unsaved_changes();
        tracing::info!(%path, "opening");

        match self.bridge.open_resource(path, false).await {
            Ok(resource) => OpenOutcome::Opened(resource),
            Err(e) => {
                tracing::warn!(%path, error = %e, "open failed");
                self.failure(format!("{LOAD_FAILED_TEXT}{e}"));
                OpenOutcome::Failed(e)
            }
        }
    }

    // ── Backend pushes ───────────────────────────────────────────────────

    pub async fn handle_push(&self, push: BackendPush) {
        match push {
            BackendPush::OpenFile { path } => {
                self.open(&path).await;
            }
            BackendPush::FileChanged { path } => {
                if self.bridge.opened_path().as_deref() == Some(path.as_str()) {
                    tracing::info!(%path, "file changed outside the session");
                    self.changes.mark_external_changes();
                } else {
                    tracing::debug!(%path, "change notice for a file that is not open");
                }
            }
        }
    }

    // ── Pass-throughs ────────────────────────────────────────────────────

    pub async fn open_with_system_viewer(&self, path: &str) -> Result<(), BackendError> {
        self.bridge
            .open_with_system_viewer(path)
            .await
            .inspect_err(|e| self.failure(format!("{SYSTEM_VIEWER_FAILED_TEXT}{e}")))
    }

    pub async fn serialize_resource(
        &self,
        block_id: &BlockId,
        settings_patch: Option<&Value>,
    ) -> Result<Vec<String>, BackendError> {
        self.bridge
            .serialize_resource(block_id, settings_patch)
            .await
            .inspect_err(|e| self.failure(format!("{SERIALIZE_FAILED_TEXT}{e}")))
    }

    /// Serialize with the unsaved edits applied, committing nothing.
    pub async fn serialize_resource_preview(
        &self,
        block_id: &BlockId,
        settings_patch: Option<&Value>,
    ) -> Result<Vec<String>, BackendError> {
        let changes = self.changes.change_set_for_commit();
        self.bridge
            .serialize_resource_tmp(block_id, &changes, settings_patch)
            .await
            .inspect_err(|e| self.failure(format!("{SERIALIZE_FAILED_TEXT}{e}")))
    }

    pub async fn deserialize_resource(
        &self,
        block_id: &BlockId,
    ) -> Result<OpenedResource, BackendError> {
        self.bridge
            .deserialize_resource(block_id)
            .await
            .inspect_err(|e| self.failure(format!("{DESERIALIZE_FAILED_TEXT}{e}")))
    }

    // ── Helpers ──────────────────────────────────────────────────────────

    async fn ask(&self, text: &str) -> bool {
        self.set_state(SessionState::AwaitingConfirm);
        self.prompter.confirm(text).await
    }

    fn set_state(&self, state: SessionState) {
        self.state_tx.send_replace(state);
    }

    fn success(&self, text: &str) {
        self.notifier.notify(Notification {
            level: NotificationLevel::Success,
            text: text.to_string(),
            duration: self.config.success_toast(),
        });
    }

    fn failure(&self, text: String) {
        self.notifier.notify(Notification {
            level: NotificationLevel::Error,
            text,
            duration: self.config.failure_toast(),
        });
    }
}
