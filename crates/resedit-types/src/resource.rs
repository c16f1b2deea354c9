//! The opened resource as the backend describes it.
//!
//! A successful read is a tree of [`ReadData`]: container blocks keep their
//! children inside `value` (an object keyed by field name, or an array).
//! A failed read is a [`ReadError`]. Both travel as plain JSON and are
//! presented to observers as [`OpenedResource`]; a read error is a normal
//! value, never an `Err`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::action::CustomAction;
use crate::block::BlockKind;
use crate::ids::BlockId;

/// Opaque block payload. The core never inspects its shape.
pub type BlockValue = Value;

/// Successfully read block (and, for containers, its subtree).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReadData {
    pub block_id: BlockId,
    /// `__`-joined backend class chain, most specific first.
    #[serde(default)]
    pub block_class_mro: String,
    #[serde(default)]
    pub block_state: Map<String, Value>,
    #[serde(default)]
    pub value: BlockValue,
    #[serde(default)]
    pub custom_actions: Vec<CustomAction>,
}

impl ReadData {
    pub fn kind(&self) -> BlockKind {
        BlockKind::from_class_chain(&self.block_class_mro)
    }

    /// Nested blocks directly below this one, in document order.
    ///
    /// Entries of `value` that do not look like a block are skipped.
    pub fn children(&self) -> Vec<ReadData> {
        let entries: Vec<&Value> = match &self.value {
            Value::Object(map) => map.values().collect(),
            Value::Array(items) => items.iter().collect(),
            _ => return Vec::new(),
        };
        entries
            .into_iter()
            .filter(|v| v.get("block_id").is_some())
            .filter_map(|v| serde_json::from_value(v.clone()).ok())
            .collect()
    }

    /// Depth-first search for a block by id, starting with `self`.
    pub fn find(&self, id: &BlockId) -> Option<ReadData> {
        if &self.block_id == id {
            return Some(self.clone());
        }
        self.children().into_iter().find_map(|c| c.find(id))
    }

    /// Look up a numeric entry of `block_state` (e.g. `min_value`).
    pub fn state_f64(&self, key: &str) -> Option<f64> {
        self.block_state.get(key).and_then(Value::as_f64)
    }
}

/// Resource that failed to parse.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadError {
    #[serde(default)]
    pub block_id: Option<BlockId>,
    #[serde(default)]
    pub error_class: Option<String>,
    pub error_text: String,
}

impl ReadError {
    pub fn new(error_text: impl Into<String>) -> Self {
        Self {
            block_id: None,
            error_class: None,
            error_text: error_text.into(),
        }
    }
}

/// Content of the resource cell once a load resolves.
///
/// Untagged on the wire: an object carrying `error_text` is a read error,
/// any other object must be block data. Non-objects are rejected.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OpenedResource {
    Error(ReadError),
    Data(ReadData),
}

impl<'de> Deserialize<'de> for OpenedResource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let object = Value::Object(Map::deserialize(deserializer)?);
        let decoded = if object.get("error_text").is_some() {
            serde_json::from_value(object).map(Self::Error)
        } else {
            serde_json::from_value(object).map(Self::Data)
        };
        decoded.map_err(serde::de::Error::custom)
    }
}

impl OpenedResource {
    pub fn as_data(&self) -> Option<&ReadData> {
        match self {
            Self::Data(data) => Some(data),
            Self::Error(_) => None,
        }
    }

    pub fn as_error(&self) -> Option<&ReadError> {
        match self {
            Self::Error(err) => Some(err),
            Self::Data(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn block_id(&self) -> Option<&BlockId> {
        match self {
            Self::Data(data) => Some(&data.block_id),
            Self::Error(err) => err.block_id.as_ref(),
        }
    }
}

impl From<ReadData> for OpenedResource {
    fn from(data: ReadData) -> Self {
        Self::Data(data)
    }
}

impl From<ReadError> for OpenedResource {
    fn from(err: ReadError) -> Self {
        Self::Error(err)
    }
}
