//! Unsaved edits of the open resource.
//!
//! A [`PendingChanges`] maps block ids to their latest edited value, in
//! first-edit order, plus one flag saying the file changed outside the
//! session. The flag makes the session dirty but never reaches a change set.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use resedit_types::{BlockChange, BlockId, BlockValue};

use crate::block::BlockEditor;
use crate::editors::AnyEditor;

/// Reserved change key that flags an external modification.
pub const EXTERNAL_CHANGES_KEY: &str = "__has_external_changes__";

#[derive(Debug, Default)]
struct Inner {
    changes: IndexMap<BlockId, BlockValue>,
    external: bool,
}

/// Shared handle to the pending-change mapping.
///
/// Clones see the same state. Block editors write through it while the
/// session task reads it inside flows.
#[derive(Debug, Clone, Default)]
pub struct PendingChanges {
    inner: Arc<Mutex<Inner>>,
}

impl PendingChanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert the value for `block_id`; the last write wins.
    ///
    /// Recording [`EXTERNAL_CHANGES_KEY`] sets the external-change flag.
    pub fn record_change(&self, block_id: impl Into<BlockId>, value: BlockValue) {
        let block_id = block_id.into();
        let mut inner = self.inner.lock();
        if block_id.as_str() == EXTERNAL_CHANGES_KEY {
            inner.external = true;
        } else {
            inner.changes.insert(block_id, value);
        }
    }

    pub fn mark_external_changes(&self) {
        self.inner.lock().external = true;
    }

    pub fn has_unsaved_changes(&self) -> bool {
        let inner = self.inner.lock();
        inner.external || !inner.changes.is_empty()
    }

    pub fn has_external_changes(&self) -> bool {
        self.inner.lock().external
    }

    /// Snapshot of the edits as `{id, value}` entries, in first-edit order.
    pub fn change_set_for_commit(&self) -> Vec<BlockChange> {
        self.inner
            .lock()
            .changes
            .iter()
            .map(|(id, value)| BlockChange::new(id.clone(), value.clone()))
            .collect()
    }

    /// Drop every edit and the external-change flag.
    pub fn clear_unsaved_changes(&self) {
        let mut inner = self.inner.lock();
        inner.changes.clear();
        inner.external = false;
    }

    pub fn pending_value(&self, block_id: &BlockId) -> Option<BlockValue> {
        self.inner.lock().changes.get(block_id).cloned()
    }

    /// Number of edited blocks. The external-change flag is not counted.
    pub fn len(&self) -> usize {
        self.inner.lock().changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record the editor's value every time it signals a change.
    ///
    /// The subscription holds the editor weakly; once the editor is dropped
    /// its notifications are ignored.
    pub fn attach(&self, editor: Arc<dyn BlockEditor>) {
        let weak = Arc::downgrade(&editor);
        let changes = self.clone();
        editor.on_change().subscribe(move || {
            let Some(editor) = weak.upgrade() else {
                return;
            };
            let value = editor.value().unwrap_or(BlockValue::Null);
            tracing::trace!(block = %editor.block_id(), "edit recorded");
            changes.record_change(editor.block_id().clone(), value);
        });
    }

    /// Attach every editable block of an editor tree.
    pub fn attach_all(&self, editor: &AnyEditor) {
        match editor {
            AnyEditor::Compound(compound) => {
                for child in compound.children().values() {
                    self.attach_all(child);
                }
            }
            leaf => self.attach(leaf.as_dyn()),
        }
    }
}
