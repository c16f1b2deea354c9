//! Bridge client: typed operations plus the two observable cells.
//!
//! The client is constructed once per process and injected into the session
//! controller. It is the only writer of the `opened_path` and
//! `opened_resource` cells; block editors and other UI observe them through
//! [`BridgeClient::subscribe_path`] / [`BridgeClient::subscribe_resource`].

use std::sync::Arc;

use resedit_types::{BlockChange, BlockId, BlockValue, CustomAction, OpenedResource, ReadError};
use serde_json::Value;
use tokio::sync::watch;

use crate::backend::Backend;
use crate::error::BackendError;

/// Typed wrapper over a [`Backend`] that owns the session's observable cells.
#[derive(Clone)]
pub struct BridgeClient {
    backend: Arc<dyn Backend>,
    path_tx: Arc<watch::Sender<Option<String>>>,
    resource_tx: Arc<watch::Sender<Option<OpenedResource>>>,
}

impl BridgeClient {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let (path_tx, _) = watch::channel(None);
        let (resource_tx, _) = watch::channel(None);
        Self {
            backend,
            path_tx: Arc::new(path_tx),
            resource_tx: Arc::new(resource_tx),
        }
    }

    // ── Cells ────────────────────────────────────────────────────────────

    /// Path of the open resource, `None` while nothing is open or loading.
    pub fn opened_path(&self) -> Option<String> {
        self.path_tx.borrow().clone()
    }

    /// Content of the open resource, `None` while nothing is open or loading.
    pub fn opened_resource(&self) -> Option<OpenedResource> {
        self.resource_tx.borrow().clone()
    }

    pub fn subscribe_path(&self) -> watch::Receiver<Option<String>> {
        self.path_tx.subscribe()
    }

    pub fn subscribe_resource(&self) -> watch::Receiver<Option<OpenedResource>> {
        self.resource_tx.subscribe()
    }

    // ── Operations ───────────────────────────────────────────────────────

    /// Load `path` into the cells, replacing whatever was open.
    ///
    /// Both cells are reset to `None` before the call goes out, so observers
    /// see a loading state. A read error is a successful load. If the call
    /// itself fails the resource cell shows the failure as a [`ReadError`]
    /// and the path cell keeps `path`, so the user can still reload.
    pub async fn open_resource(
        &self,
        path: &str,
        force_reload: bool,
    ) -> Result<OpenedResource, BackendError> {
        self.resource_tx.send_replace(None);
        self.path_tx.send_replace(None);

        log::debug!("Opening {path} (force_reload={force_reload})");
        let result = self.backend.open_file(path, force_reload).await;

        let shown = match &result {
            Ok(resource) => resource.clone(),
            Err(e) => {
                log::warn!("Opening {path} failed: {e}");
                OpenedResource::Error(ReadError {
                    block_id: Some(BlockId::for_file(path)),
                    error_class: None,
                    error_text: e.error_text.clone(),
                })
            }
        };
        self.resource_tx.send_replace(Some(shown));
        self.path_tx.send_replace(Some(path.to_string()));
        result
    }

    /// Hand the file to the host OS viewer.
    pub async fn open_with_system_viewer(&self, path: &str) -> Result<(), BackendError> {
        self.backend.open_file_with_system_app(path).await
    }

    pub async fn save(&self, path: &str, changes: &[BlockChange]) -> Result<(), BackendError> {
        log::debug!("Saving {} changes to {path}", changes.len());
        self.backend.save_file(path, changes).await
    }

    pub async fn run_custom_action(
        &self,
        block_id: &BlockId,
        action: &CustomAction,
        args: &[BlockValue],
    ) -> Result<Option<BlockValue>, BackendError> {
        log::debug!("Running {} on {block_id}", action.method);
        self.backend.run_custom_action(block_id, action, args).await
    }

    pub async fn serialize_resource(
        &self,
        block_id: &BlockId,
        settings_patch: Option<&Value>,
    ) -> Result<Vec<String>, BackendError> {
        let patch = settings_patch.cloned().unwrap_or_else(empty_patch);
        self.backend.serialize_resource(block_id, &patch).await
    }

    /// Serialize with unsaved `changes` applied, without committing them.
    pub async fn serialize_resource_tmp(
        &self,
        block_id: &BlockId,
        changes: &[BlockChange],
        settings_patch: Option<&Value>,
    ) -> Result<Vec<String>, BackendError> {
        let patch = settings_patch.cloned().unwrap_or_else(empty_patch);
        self.backend
            .serialize_resource_tmp(block_id, changes, &patch)
            .await
    }

    pub async fn deserialize_resource(
        &self,
        block_id: &BlockId,
    ) -> Result<OpenedResource, BackendError> {
        self.backend.deserialize_resource(block_id).await
    }

    pub async fn frontend_ready(&self) -> Result<(), BackendError> {
        self.backend.frontend_ready().await
    }
}

fn empty_patch() -> Value {
    Value::Object(Default::default())
}
