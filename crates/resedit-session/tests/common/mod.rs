//! Scripted collaborators shared by the session integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use resedit_client::{BridgeClient, MemoryBackend};
use resedit_session::{Controller, Notification, Notifier, Prompter, SessionConfig};
use resedit_types::{BlockValue, CustomAction, ReadData};
use serde_json::json;
use tokio::sync::Notify;

pub const PATH: &str = "/tmp/a.bin";

/// `{b1: 1, b2: 2}` at [`PATH`].
pub fn resource() -> ReadData {
    resource_at(PATH)
}

pub fn resource_at(path: &str) -> ReadData {
    serde_json::from_value(json!({
        "block_id": path,
        "block_class_mro": "TestResource__CompoundBlock__DataBlock",
        "value": {
            "b1": {"block_id": format!("{path}__b1"), "block_class_mro": "IntegerBlock", "value": 1},
            "b2": {"block_id": format!("{path}__b2"), "block_class_mro": "IntegerBlock", "value": 2}
        }
    }))
    .unwrap()
}

type DialogHook = Box<dyn FnOnce() + Send>;

/// Prompter answering from queues. Empty queues decline / cancel.
#[derive(Default)]
pub struct ScriptedPrompter {
    confirms: Mutex<VecDeque<bool>>,
    args: Mutex<VecDeque<Option<Vec<BlockValue>>>>,
    /// Questions asked, in order.
    pub asked: Mutex<Vec<String>>,
    /// Runs while the argument dialog is "open".
    during_dialog: Mutex<Option<DialogHook>>,
    /// When set, the argument dialog waits for this before answering.
    gate: Mutex<Option<Arc<Notify>>>,
}

impl ScriptedPrompter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn answer_confirm(&self, accept: bool) {
        self.confirms.lock().push_back(accept);
    }

    pub fn answer_args(&self, args: Option<Vec<BlockValue>>) {
        self.args.lock().push_back(args);
    }

    pub fn during_dialog(&self, hook: impl FnOnce() + Send + 'static) {
        *self.during_dialog.lock() = Some(Box::new(hook));
    }

    /// Hold the argument dialog open until the returned notify fires.
    pub fn hold_dialog(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().clone()
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn confirm(&self, text: &str) -> bool {
        self.asked.lock().push(text.to_string());
        self.confirms.lock().pop_front().unwrap_or(false)
    }

    async fn collect_action_args(&self, _action: &CustomAction) -> Option<Vec<BlockValue>> {
        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let hook = self.during_dialog.lock().take();
        if let Some(hook) = hook {
            hook();
        }
        self.args.lock().pop_front().flatten()
    }
}

/// Notifier that keeps every notification.
#[derive(Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn all(&self) -> Vec<Notification> {
        self.seen.lock().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.seen.lock().iter().map(|n| n.text.clone()).collect()
    }

    pub fn last(&self) -> Option<Notification> {
        self.seen.lock().last().cloned()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen.lock().push(notification);
    }
}

pub struct Fixture {
    pub backend: Arc<MemoryBackend>,
    pub prompter: Arc<ScriptedPrompter>,
    pub notifier: Arc<RecordingNotifier>,
    pub controller: Controller,
}

/// Controller over a memory backend holding [`resource`] at [`PATH`].
pub fn fixture() -> Fixture {
    let backend = Arc::new(MemoryBackend::new().with_file(PATH, resource()));
    let prompter = ScriptedPrompter::new();
    let notifier = RecordingNotifier::new();
    let controller = Controller::new(
        BridgeClient::new(backend.clone()),
        prompter.clone(),
        notifier.clone(),
        SessionConfig::default(),
    );
    Fixture {
        backend,
        prompter,
        notifier,
        controller,
    }
}

/// [`fixture`] with [`PATH`] already open and the call log cleared.
pub async fn opened() -> Fixture {
    let f = fixture();
    f.controller.open(PATH).await;
    f.backend.clear_calls();
    f
}

pub fn b1() -> resedit_types::BlockId {
    resedit_types::BlockId::new(format!("{PATH}__b1"))
}

pub fn b2() -> resedit_types::BlockId {
    resedit_types::BlockId::new(format!("{PATH}__b2"))
}
