//! Concrete block editors, selected by the block kind in the read data.
//!
//! | Kind                                   | Editor             |
//! |----------------------------------------|--------------------|
//! | `Integer`, `Decimal`                   | [`NumberEditor`]   |
//! | `Compound`, `Array`                    | [`CompoundEditor`] |
//! | everything else                        | [`ValueEditor`]    |

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use resedit_types::{BlockId, BlockKind, BlockValue, ReadData};
use serde_json::Value;

use crate::block::{BlockEditor, ChangeNotifier};

/// An edit the editor refused.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditError {
    #[error("{block}: expected a number")]
    NotANumber { block: BlockId },
    #[error("{block}: expected a whole number")]
    NotAnInteger { block: BlockId },
}

// ============================================================================
// ValueEditor
// ============================================================================

/// Editor for blocks whose value is taken as-is (strings, flags, enums, bytes).
#[derive(Debug)]
pub struct ValueEditor {
    block_id: BlockId,
    name: String,
    kind: BlockKind,
    value: Mutex<Option<BlockValue>>,
    notifier: ChangeNotifier,
}

impl ValueEditor {
    pub fn new(data: &ReadData, name: &str) -> Self {
        Self {
            block_id: data.block_id.clone(),
            name: name.to_string(),
            kind: data.kind(),
            value: Mutex::new(initial_value(data)),
            notifier: ChangeNotifier::new(),
        }
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    pub fn set_value(&self, value: BlockValue) {
        *self.value.lock() = Some(value);
        self.notifier.notify();
    }
}

impl BlockEditor for ValueEditor {
    fn block_id(&self) -> &BlockId {
        &self.block_id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn value(&self) -> Option<BlockValue> {
        self.value.lock().clone()
    }
    fn on_change(&self) -> &ChangeNotifier {
        &self.notifier
    }
}

// ============================================================================
// NumberEditor
// ============================================================================

/// Editor for integer and decimal blocks.
///
/// Bounds come from `min_value`/`max_value` in the block state. Values
/// outside them are clamped; non-numbers are refused.
#[derive(Debug)]
pub struct NumberEditor {
    block_id: BlockId,
    name: String,
    integer: bool,
    min: Option<f64>,
    max: Option<f64>,
    value: Mutex<Option<BlockValue>>,
    notifier: ChangeNotifier,
}

impl NumberEditor {
    pub fn new(data: &ReadData, name: &str) -> Self {
        let integer = data.kind() == BlockKind::Integer;
        let mut min = data.state_f64("min_value");
        let mut max = data.state_f64("max_value");
        if integer {
            min = min.map(f64::ceil);
            max = max.map(f64::floor);
        }
        Self {
            block_id: data.block_id.clone(),
            name: name.to_string(),
            integer,
            min,
            max,
            value: Mutex::new(initial_value(data)),
            notifier: ChangeNotifier::new(),
        }
    }

    pub fn bounds(&self) -> (Option<f64>, Option<f64>) {
        (self.min, self.max)
    }

    /// Store `value` (clamped to the bounds) and signal the change.
    ///
    /// Returns the value actually stored.
    pub fn set_value(&self, value: BlockValue) -> Result<BlockValue, EditError> {
        let n = value.as_f64().ok_or_else(|| EditError::NotANumber {
            block: self.block_id.clone(),
        })?;
        if self.integer && n.fract() != 0.0 {
            return Err(EditError::NotAnInteger {
                block: self.block_id.clone(),
            });
        }

        let clamped = self.clamp(n);
        let stored = if clamped == n {
            value
        } else if self.integer {
            Value::from(clamped as i64)
        } else {
            Value::from(clamped)
        };

        *self.value.lock() = Some(stored.clone());
        self.notifier.notify();
        Ok(stored)
    }

    fn clamp(&self, n: f64) -> f64 {
        let n = match self.min {
            Some(min) if n < min => min,
            _ => n,
        };
        match self.max {
            Some(max) if n > max => max,
            _ => n,
        }
    }
}

impl BlockEditor for NumberEditor {
    fn block_id(&self) -> &BlockId {
        &self.block_id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn value(&self) -> Option<BlockValue> {
        self.value.lock().clone()
    }
    fn on_change(&self) -> &ChangeNotifier {
        &self.notifier
    }
}

// ============================================================================
// CompoundEditor
// ============================================================================

/// Container editor. Holds one editor per child; its own value is never
/// edited, so it never signals.
#[derive(Debug)]
pub struct CompoundEditor {
    block_id: BlockId,
    name: String,
    value: BlockValue,
    children: IndexMap<String, AnyEditor>,
    notifier: ChangeNotifier,
}

impl CompoundEditor {
    pub fn new(data: &ReadData, name: &str) -> Self {
        let children = named_children(data)
            .into_iter()
            .map(|(child_name, child)| {
                let editor = editor_for(&child, &child_name);
                (child_name, editor)
            })
            .collect();
        Self {
            block_id: data.block_id.clone(),
            name: name.to_string(),
            value: data.value.clone(),
            children,
            notifier: ChangeNotifier::new(),
        }
    }

    pub fn children(&self) -> &IndexMap<String, AnyEditor> {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<&AnyEditor> {
        self.children.get(name)
    }

    /// Depth-first lookup of a descendant editor by block id.
    pub fn find(&self, block_id: &BlockId) -> Option<AnyEditor> {
        self.children.values().find_map(|child| {
            if child.block_id() == block_id {
                return Some(child.clone());
            }
            match child {
                AnyEditor::Compound(compound) => compound.find(block_id),
                _ => None,
            }
        })
    }
}

impl BlockEditor for CompoundEditor {
    fn block_id(&self) -> &BlockId {
        &self.block_id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn value(&self) -> Option<BlockValue> {
        Some(self.value.clone())
    }
    fn on_change(&self) -> &ChangeNotifier {
        &self.notifier
    }
}

// ============================================================================
// Selection
// ============================================================================

/// One editor of any concrete kind.
#[derive(Debug, Clone)]
pub enum AnyEditor {
    Value(Arc<ValueEditor>),
    Number(Arc<NumberEditor>),
    Compound(Arc<CompoundEditor>),
}

impl AnyEditor {
    pub fn as_dyn(&self) -> Arc<dyn BlockEditor> {
        match self {
            Self::Value(e) => e.clone(),
            Self::Number(e) => e.clone(),
            Self::Compound(e) => e.clone(),
        }
    }

    pub fn block_id(&self) -> &BlockId {
        match self {
            Self::Value(e) => e.block_id(),
            Self::Number(e) => e.block_id(),
            Self::Compound(e) => e.block_id(),
        }
    }
}

/// Build the editor for `data` (and, for containers, its whole subtree).
pub fn editor_for(data: &ReadData, name: &str) -> AnyEditor {
    match data.kind() {
        BlockKind::Integer | BlockKind::Decimal => {
            AnyEditor::Number(Arc::new(NumberEditor::new(data, name)))
        }
        BlockKind::Compound | BlockKind::Array => {
            AnyEditor::Compound(Arc::new(CompoundEditor::new(data, name)))
        }
        _ => AnyEditor::Value(Arc::new(ValueEditor::new(data, name))),
    }
}

fn initial_value(data: &ReadData) -> Option<BlockValue> {
    match &data.value {
        Value::Null => None,
        v => Some(v.clone()),
    }
}

/// Child blocks with their field names; array elements are named by index.
fn named_children(data: &ReadData) -> Vec<(String, ReadData)> {
    let entries: Vec<(String, &Value)> = match &data.value {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        _ => return Vec::new(),
    };
    entries
        .into_iter()
        .filter(|(_, v)| v.get("block_id").is_some())
        .filter_map(|(name, v)| {
            serde_json::from_value::<ReadData>(v.clone())
                .ok()
                .map(|child| (name, child))
        })
        .collect()
}
