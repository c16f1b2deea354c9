//! In-memory backend.
//!
//! Holds resources keyed by path and records every call. Used for testing
//! the session flows and for running the editor without a backend process.
//! Failures are scripted per method with [`MemoryBackend::fail_next`].

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use resedit_types::{
    BlockChange, BlockId, BlockValue, CustomAction, OpenedResource, ReadData, ReadError,
};
use serde_json::Value;

use crate::backend::{Backend, BackendMethod};
use crate::error::BackendError;

/// A call as the memory backend saw it.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    OpenFile {
        path: String,
        force_reload: bool,
    },
    OpenFileWithSystemApp {
        path: String,
    },
    SaveFile {
        path: String,
        changes: Vec<BlockChange>,
    },
    RunCustomAction {
        block_id: BlockId,
        method: String,
        args: Vec<BlockValue>,
    },
    SerializeResource {
        block_id: BlockId,
        settings_patch: Value,
    },
    SerializeResourceTmp {
        block_id: BlockId,
        changes: Vec<BlockChange>,
        settings_patch: Value,
    },
    DeserializeResource {
        block_id: BlockId,
    },
    FrontendReady,
}

impl BackendCall {
    pub fn method(&self) -> BackendMethod {
        match self {
            Self::OpenFile { .. } => BackendMethod::OpenFile,
            Self::OpenFileWithSystemApp { .. } => BackendMethod::OpenFileWithSystemApp,
            Self::SaveFile { .. } => BackendMethod::SaveFile,
            Self::RunCustomAction { .. } => BackendMethod::RunCustomAction,
            Self::SerializeResource { .. } => BackendMethod::SerializeResource,
            Self::SerializeResourceTmp { .. } => BackendMethod::SerializeResourceTmp,
            Self::DeserializeResource { .. } => BackendMethod::DeserializeResource,
            Self::FrontendReady => BackendMethod::FrontendReady,
        }
    }
}

#[derive(Default)]
struct MemoryState {
    files: HashMap<String, OpenedResource>,
    calls: Vec<BackendCall>,
    failures: HashMap<BackendMethod, VecDeque<String>>,
    action_results: HashMap<String, BlockValue>,
}

impl MemoryState {
    /// Record the call, then consume a scripted failure if one is queued.
    fn enter(&mut self, call: BackendCall) -> Result<(), BackendError> {
        let method = call.method();
        self.calls.push(call);
        match self.failures.get_mut(&method).and_then(VecDeque::pop_front) {
            Some(text) => Err(BackendError::new(text)),
            None => Ok(()),
        }
    }
}

/// Thread-safe in-memory [`Backend`].
#[derive(Default)]
pub struct MemoryBackend {
    state: parking_lot::Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`MemoryBackend::insert_file`].
    pub fn with_file(self, path: &str, resource: impl Into<OpenedResource>) -> Self {
        self.insert_file(path, resource);
        self
    }

    pub fn insert_file(&self, path: &str, resource: impl Into<OpenedResource>) {
        self.state
            .lock()
            .files
            .insert(path.to_string(), resource.into());
    }

    /// Current stored content of a file.
    pub fn file(&self, path: &str) -> Option<OpenedResource> {
        self.state.lock().files.get(path).cloned()
    }

    /// Make the next call to `method` fail with `error_text`.
    ///
    /// Queued failures are consumed in order, one per call.
    pub fn fail_next(&self, method: BackendMethod, error_text: impl Into<String>) {
        self.state
            .lock()
            .failures
            .entry(method)
            .or_default()
            .push_back(error_text.into());
    }

    /// Value returned by successful runs of the action with this method name.
    pub fn set_action_result(&self, method: &str, value: BlockValue) {
        self.state
            .lock()
            .action_results
            .insert(method.to_string(), value);
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().calls.clone()
    }

    pub fn calls_to(&self, method: BackendMethod) -> Vec<BackendCall> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.method() == method)
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }
}

fn missing_file(path: &str) -> ReadError {
    ReadError {
        block_id: Some(BlockId::for_file(path)),
        error_class: Some("FileNotFoundError".into()),
        error_text: format!("No such file: {path}"),
    }
}

/// Overwrite the `value` of the block with `id` anywhere in a JSON block tree.
fn apply_change(node: &mut Value, id: &BlockId, new_value: &BlockValue) -> bool {
    if node.get("block_id").and_then(Value::as_str) == Some(id.as_str()) {
        if let Some(obj) = node.as_object_mut() {
            obj.insert("value".into(), new_value.clone());
            return true;
        }
    }
    match node.get_mut("value") {
        Some(Value::Object(children)) => children
            .values_mut()
            .any(|child| apply_change(child, id, new_value)),
        Some(Value::Array(children)) => children
            .iter_mut()
            .any(|child| apply_change(child, id, new_value)),
        _ => false,
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn open_file(
        &self,
        path: &str,
        force_reload: bool,
    ) -> Result<OpenedResource, BackendError> {
        let mut state = self.state.lock();
        state.enter(BackendCall::OpenFile {
            path: path.to_string(),
            force_reload,
        })?;
        Ok(state
            .files
            .get(path)
            .cloned()
            .unwrap_or_else(|| missing_file(path).into()))
    }

    async fn open_file_with_system_app(&self, path: &str) -> Result<(), BackendError> {
        self.state.lock().enter(BackendCall::OpenFileWithSystemApp {
            path: path.to_string(),
        })
    }

    async fn save_file(&self, path: &str, changes: &[BlockChange]) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.enter(BackendCall::SaveFile {
            path: path.to_string(),
            changes: changes.to_vec(),
        })?;
        let Some(OpenedResource::Data(data)) = state.files.get(path).cloned() else {
            return Err(BackendError::new(format!("No such file: {path}")));
        };
        let mut tree = serde_json::to_value(&data)?;
        for change in changes {
            if !apply_change(&mut tree, &change.id, &change.value) {
                log::warn!("MemoryBackend: no block {} in {path}", change.id);
            }
        }
        let updated: ReadData = serde_json::from_value(tree)?;
        state.files.insert(path.to_string(), updated.into());
        Ok(())
    }

    async fn run_custom_action(
        &self,
        block_id: &BlockId,
        action: &CustomAction,
        args: &[BlockValue],
    ) -> Result<Option<BlockValue>, BackendError> {
        let mut state = self.state.lock();
        state.enter(BackendCall::RunCustomAction {
            block_id: block_id.clone(),
            method: action.method.clone(),
            args: args.to_vec(),
        })?;
        Ok(state.action_results.get(&action.method).cloned())
    }

    async fn serialize_resource(
        &self,
        block_id: &BlockId,
        settings_patch: &Value,
    ) -> Result<Vec<String>, BackendError> {
        self.state.lock().enter(BackendCall::SerializeResource {
            block_id: block_id.clone(),
            settings_patch: settings_patch.clone(),
        })?;
        Ok(vec![format!("{block_id}.out")])
    }

    async fn serialize_resource_tmp(
        &self,
        block_id: &BlockId,
        changes: &[BlockChange],
        settings_patch: &Value,
    ) -> Result<Vec<String>, BackendError> {
        self.state.lock().enter(BackendCall::SerializeResourceTmp {
            block_id: block_id.clone(),
            changes: changes.to_vec(),
            settings_patch: settings_patch.clone(),
        })?;
        Ok(vec![format!("{block_id}.tmp.out")])
    }

    async fn deserialize_resource(
        &self,
        block_id: &BlockId,
    ) -> Result<OpenedResource, BackendError> {
        let mut state = self.state.lock();
        state.enter(BackendCall::DeserializeResource {
            block_id: block_id.clone(),
        })?;
        let path = block_id.file_path();
        let found = match state.files.get(&path) {
            Some(OpenedResource::Data(data)) => data.find(block_id).map(OpenedResource::Data),
            _ => None,
        };
        Ok(found.unwrap_or_else(|| missing_file(&path).into()))
    }

    async fn frontend_ready(&self) -> Result<(), BackendError> {
        self.state.lock().enter(BackendCall::FrontendReady)
    }
}
