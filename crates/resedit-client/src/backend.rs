//! The typed backend call surface.
//!
//! One method per operation the backend exposes. Unknown operations cannot
//! be expressed: [`BackendMethod`] is the closed set of wire names, and
//! [`BackendPush`] is the closed set of calls the backend may make into the
//! session unsolicited.

use async_trait::async_trait;
use resedit_types::{BlockChange, BlockId, BlockValue, CustomAction, OpenedResource};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};

use crate::error::BackendError;

/// Wire names of backend operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum BackendMethod {
    OpenFile,
    OpenFileWithSystemApp,
    SaveFile,
    RunCustomAction,
    SerializeResource,
    SerializeResourceTmp,
    DeserializeResource,
    #[strum(serialize = "on_angular_ready")]
    FrontendReady,
}

/// Asynchronous call surface of the backend process.
///
/// Every method fails with [`BackendError`] on backend-reported or transport
/// failure. A resource that fails to parse is *not* an error: it comes back
/// as [`OpenedResource::Error`].
#[async_trait]
pub trait Backend: Send + Sync {
    async fn open_file(&self, path: &str, force_reload: bool)
    -> Result<OpenedResource, BackendError>;

    /// Hand the file to the host OS default application.
    async fn open_file_with_system_app(&self, path: &str) -> Result<(), BackendError>;

    /// Commit a change set. The list never carries the external-change marker.
    async fn save_file(&self, path: &str, changes: &[BlockChange]) -> Result<(), BackendError>;

    /// Run a backend-defined action; it may mutate the file as a side effect.
    async fn run_custom_action(
        &self,
        block_id: &BlockId,
        action: &CustomAction,
        args: &[BlockValue],
    ) -> Result<Option<BlockValue>, BackendError>;

    /// Export a block; returns the produced artifact paths in order.
    async fn serialize_resource(
        &self,
        block_id: &BlockId,
        settings_patch: &Value,
    ) -> Result<Vec<String>, BackendError>;

    /// Like [`Backend::serialize_resource`] but with unsaved changes applied
    /// to a temporary copy. Does not commit anything.
    async fn serialize_resource_tmp(
        &self,
        block_id: &BlockId,
        changes: &[BlockChange],
        settings_patch: &Value,
    ) -> Result<Vec<String>, BackendError>;

    async fn deserialize_resource(&self, block_id: &BlockId)
    -> Result<OpenedResource, BackendError>;

    /// Tell the backend the editor is ready to receive pushes.
    async fn frontend_ready(&self) -> Result<(), BackendError>;
}

/// A call the backend makes into the session on its own initiative.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendPush {
    /// Open a file, exactly as if the user asked for it.
    OpenFile { path: String },
    /// The file changed outside the session.
    FileChanged { path: String },
}

impl BackendPush {
    /// Decode a backend-initiated call by name and positional arguments.
    pub fn from_call(name: &str, args: &[Value]) -> Result<Self, BackendError> {
        let path = || -> Result<String, BackendError> {
            args.first()
                .and_then(Value::as_str)
                .map(String::from)
                .ok_or_else(|| BackendError::protocol(format!("{name}: expected a path argument")))
        };
        match name {
            "open_file" => Ok(Self::OpenFile { path: path()? }),
            "on_file_changed" => Ok(Self::FileChanged { path: path()? }),
            other => Err(BackendError::protocol(format!("unknown push: {other}"))),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::OpenFile { path } | Self::FileChanged { path } => path,
        }
    }
}
