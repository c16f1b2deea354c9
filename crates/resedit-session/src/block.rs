//! The capability set every block editor exposes to the session.

use std::sync::Arc;

use resedit_types::{BlockId, BlockValue};

/// What the session needs from a block editor, and nothing more.
///
/// Editors never read each other's state. They announce edits through
/// [`BlockEditor::on_change`]; the listener pulls [`BlockEditor::value`] at
/// notification time.
pub trait BlockEditor: Send + Sync {
    fn block_id(&self) -> &BlockId;

    /// Field name of the block inside its parent.
    fn name(&self) -> &str;

    /// Current value as shown in the editor. `None` when the block has none.
    fn value(&self) -> Option<BlockValue>;

    fn on_change(&self) -> &ChangeNotifier;
}

type Listener = Arc<dyn Fn() + Send + Sync>;

/// Payload-less change signal.
#[derive(Default)]
pub struct ChangeNotifier {
    listeners: parking_lot::Mutex<Vec<Listener>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) {
        self.listeners.lock().push(Arc::new(listener));
    }

    /// Call every listener in subscription order.
    ///
    /// Listeners run outside the lock, so one may subscribe another.
    pub fn notify(&self) {
        let listeners: Vec<Listener> = self.listeners.lock().clone();
        for listener in listeners {
            listener();
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_notify_reaches_every_listener() {
        let notifier = ChangeNotifier::new();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let hits = hits.clone();
            notifier.subscribe(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }

        notifier.notify();
        notifier.notify();
        assert_eq!(hits.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_notify_without_listeners() {
        let notifier = ChangeNotifier::new();
        notifier.notify();
        assert_eq!(notifier.listener_count(), 0);
    }
}
