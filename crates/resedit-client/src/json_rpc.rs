//! [`Backend`] over the JSON line protocol.
//!
//! Calls are written as [`Frame::Call`] and matched to their
//! [`Frame::Return`] by id, so several calls may be outstanding at once.
//! A single reader task owns the inbound half of the stream: it resolves
//! pending calls, decodes backend-initiated calls into [`BackendPush`] and
//! forwards them to the push channel, then acknowledges them.
//!
//! ```text
//!   call() ──write──▶ backend stdin
//!      ▲                               reader task
//!      └── oneshot ◀── pending[id] ◀── backend stdout ──▶ mpsc<BackendPush>
//! ```

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use resedit_types::{BlockChange, BlockId, BlockValue, CustomAction, OpenedResource};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc, oneshot};

use crate::backend::{Backend, BackendMethod, BackendPush};
use crate::error::BackendError;
use crate::protocol::{CallIdGen, Frame, read_frame, write_frame};

type SharedWriter = Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>;
type Reply = oneshot::Sender<Result<Value, BackendError>>;

/// How to launch the backend process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Calls waiting for their return frame.
#[derive(Default)]
struct PendingCalls {
    calls: HashMap<u64, Reply>,
    /// Set once the reader stops; later calls fail immediately.
    closed: bool,
}

/// Backend reached through newline-delimited JSON frames.
pub struct JsonRpcBackend {
    writer: SharedWriter,
    pending: Arc<parking_lot::Mutex<PendingCalls>>,
    ids: CallIdGen,
    /// Held so the process lives as long as the backend handle.
    _child: Option<Child>,
}

impl JsonRpcBackend {
    /// Speak the protocol over an arbitrary stream pair.
    ///
    /// Must be called within a tokio runtime; spawns the reader task.
    pub fn new<R, W>(reader: R, writer: W) -> (Self, mpsc::UnboundedReceiver<BackendPush>)
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let writer: SharedWriter = Arc::new(Mutex::new(Box::new(writer)));
        let pending = Arc::new(parking_lot::Mutex::new(PendingCalls::default()));
        let (push_tx, push_rx) = mpsc::unbounded_channel();

        tokio::spawn(read_loop(
            BufReader::new(reader),
            writer.clone(),
            pending.clone(),
            push_tx,
        ));

        let backend = Self {
            writer,
            pending,
            ids: CallIdGen::default(),
            _child: None,
        };
        (backend, push_rx)
    }

    /// Launch the backend as a child process speaking on stdin/stdout.
    pub fn spawn(
        command: &BackendCommand,
    ) -> Result<(Self, mpsc::UnboundedReceiver<BackendPush>), BackendError> {
        log::info!("Spawning backend: {} {:?}", command.program, command.args);
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BackendError::new("backend stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BackendError::new("backend stdout unavailable"))?;

        let (mut backend, pushes) = Self::new(stdout, stdin);
        backend._child = Some(child);
        Ok((backend, pushes))
    }

    /// Issue one call and wait for its return value.
    async fn call(&self, method: BackendMethod, args: Vec<Value>) -> Result<Value, BackendError> {
        let id = self.ids.next();
        let (reply, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock();
            if pending.closed {
                return Err(BackendError::disconnected());
            }
            pending.calls.insert(id, reply);
        }

        log::debug!("→ call {id} {method}");
        let frame = Frame::Call {
            id,
            name: method.as_ref().to_string(),
            args,
        };
        let written = {
            let mut writer = self.writer.lock().await;
            write_frame(&mut *writer, &frame).await
        };
        if let Err(e) = written {
            self.pending.lock().calls.remove(&id);
            return Err(e);
        }

        rx.await.map_err(|_| BackendError::disconnected())?
    }

    async fn call_typed<T: DeserializeOwned>(
        &self,
        method: BackendMethod,
        args: Vec<Value>,
    ) -> Result<T, BackendError> {
        let value = self.call(method, args).await?;
        Ok(serde_json::from_value(value)?)
    }
}

#[async_trait]
impl Backend for JsonRpcBackend {
    async fn open_file(
        &self,
        path: &str,
        force_reload: bool,
    ) -> Result<OpenedResource, BackendError> {
        self.call_typed(BackendMethod::OpenFile, vec![json!(path), json!(force_reload)])
            .await
    }

    async fn open_file_with_system_app(&self, path: &str) -> Result<(), BackendError> {
        self.call(BackendMethod::OpenFileWithSystemApp, vec![json!(path)])
            .await
            .map(drop)
    }

    async fn save_file(&self, path: &str, changes: &[BlockChange]) -> Result<(), BackendError> {
        self.call(
            BackendMethod::SaveFile,
            vec![json!(path), serde_json::to_value(changes)?],
        )
        .await
        .map(drop)
    }

    async fn run_custom_action(
        &self,
        block_id: &BlockId,
        action: &CustomAction,
        args: &[BlockValue],
    ) -> Result<Option<BlockValue>, BackendError> {
        let value = self
            .call(
                BackendMethod::RunCustomAction,
                vec![
                    json!(block_id),
                    serde_json::to_value(action)?,
                    Value::Array(args.to_vec()),
                ],
            )
            .await?;
        Ok((!value.is_null()).then_some(value))
    }

    async fn serialize_resource(
        &self,
        block_id: &BlockId,
        settings_patch: &Value,
    ) -> Result<Vec<String>, BackendError> {
        self.call_typed(
            BackendMethod::SerializeResource,
            vec![json!(block_id), settings_patch.clone()],
        )
        .await
    }

    async fn serialize_resource_tmp(
        &self,
        block_id: &BlockId,
        changes: &[BlockChange],
        settings_patch: &Value,
    ) -> Result<Vec<String>, BackendError> {
        self.call_typed(
            BackendMethod::SerializeResourceTmp,
            vec![
                json!(block_id),
                serde_json::to_value(changes)?,
                settings_patch.clone(),
            ],
        )
        .await
    }

    async fn deserialize_resource(
        &self,
        block_id: &BlockId,
    ) -> Result<OpenedResource, BackendError> {
        self.call_typed(BackendMethod::DeserializeResource, vec![json!(block_id)])
            .await
    }

    async fn frontend_ready(&self) -> Result<(), BackendError> {
        self.call(BackendMethod::FrontendReady, Vec::new())
            .await
            .map(drop)
    }
}

/// Own the inbound half of the stream until it ends.
async fn read_loop<R>(
    mut reader: BufReader<R>,
    writer: SharedWriter,
    pending: Arc<parking_lot::Mutex<PendingCalls>>,
    push_tx: mpsc::UnboundedSender<BackendPush>,
) where
    R: AsyncRead + Unpin,
{
    loop {
        match read_frame(&mut reader).await {
            Ok(Some(Frame::Return { id, outcome })) => {
                log::debug!("← return {id}");
                let reply = pending.lock().calls.remove(&id);
                match reply {
                    Some(reply) => {
                        let _ = reply.send(outcome.into_result());
                    }
                    None => log::warn!("Return for unknown call id {id}"),
                }
            }
            Ok(Some(Frame::Call { id, name, args })) => {
                log::debug!("← push {id} {name}");
                let ack = match BackendPush::from_call(&name, &args) {
                    Ok(push) => {
                        if push_tx.send(push).is_err() {
                            log::warn!("Push {name} dropped: session queue closed");
                        }
                        Frame::ok(id, Value::Null)
                    }
                    Err(e) => {
                        log::warn!("Rejecting backend call {name}: {e}");
                        Frame::err(id, e)
                    }
                };
                let mut writer = writer.lock().await;
                if let Err(e) = write_frame(&mut *writer, &ack).await {
                    log::error!("Failed to acknowledge push {id}: {e}");
                    break;
                }
            }
            Ok(None) => {
                log::info!("Backend stream closed");
                break;
            }
            Err(e) => {
                log::error!("Backend reader failed: {e}");
                break;
            }
        }
    }

    let orphaned: Vec<Reply> = {
        let mut pending = pending.lock();
        pending.closed = true;
        pending.calls.drain().map(|(_, reply)| reply).collect()
    };
    for reply in orphaned {
        let _ = reply.send(Err(BackendError::disconnected()));
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{DuplexStream, ReadHalf, WriteHalf, duplex, split};

    /// Far end of the duplex pipe, playing the backend.
    struct FakeBackend {
        reader: BufReader<ReadHalf<DuplexStream>>,
        writer: WriteHalf<DuplexStream>,
    }

    impl FakeBackend {
        async fn expect_call(&mut self) -> (u64, String, Vec<Value>) {
            match read_frame(&mut self.reader).await.unwrap() {
                Some(Frame::Call { id, name, args }) => (id, name, args),
                other => panic!("expected call, got {other:?}"),
            }
        }

        async fn send(&mut self, frame: Frame) {
            write_frame(&mut self.writer, &frame).await.unwrap();
        }
    }

    fn connect() -> (JsonRpcBackend, mpsc::UnboundedReceiver<BackendPush>, FakeBackend) {
        let _ = env_logger::builder().is_test(true).try_init();
        let (near, far) = duplex(64 * 1024);
        let (near_r, near_w) = split(near);
        let (far_r, far_w) = split(far);
        let (backend, pushes) = JsonRpcBackend::new(near_r, near_w);
        let fake = FakeBackend {
            reader: BufReader::new(far_r),
            writer: far_w,
        };
        (backend, pushes, fake)
    }

    #[tokio::test]
    async fn test_open_file_round_trip() {
        let (backend, _pushes, mut fake) = connect();

        let server = tokio::spawn(async move {
            let (id, name, args) = fake.expect_call().await;
            assert_eq!(name, "open_file");
            assert_eq!(args, vec![json!("/tmp/a.bin"), json!(true)]);
            fake.send(Frame::ok(
                id,
                json!({"block_id": "/tmp/a.bin", "block_class_mro": "TestResource__CompoundBlock", "value": {}}),
            ))
            .await;
            fake
        });

        let res = backend.open_file("/tmp/a.bin", true).await.unwrap();
        assert_eq!(res.block_id().unwrap().as_str(), "/tmp/a.bin");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_backend_error_surfaces_error_text() {
        let (backend, _pushes, mut fake) = connect();

        let server = tokio::spawn(async move {
            let (id, name, args) = fake.expect_call().await;
            assert_eq!(name, "save_file");
            assert_eq!(args[1], json!([{"id": "/tmp/a.bin__b1", "value": 2}]));
            fake.send(Frame::err(id, BackendError::new("disk full"))).await;
            fake
        });

        let err = backend
            .save_file("/tmp/a.bin", &[BlockChange::new("/tmp/a.bin__b1", json!(2))])
            .await
            .unwrap_err();
        assert_eq!(err.error_text, "disk full");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_out_of_order_returns_match_by_id() {
        let (backend, _pushes, mut fake) = connect();
        let backend = Arc::new(backend);

        let server = tokio::spawn(async move {
            let first = fake.expect_call().await;
            let second = fake.expect_call().await;
            // Answer the second call first.
            fake.send(Frame::ok(second.0, json!([format!("{}.out", second.1)]))).await;
            fake.send(Frame::ok(first.0, json!([format!("{}.out", first.1)]))).await;
            fake
        });

        let a = {
            let backend = backend.clone();
            tokio::spawn(async move {
                backend
                    .serialize_resource(&BlockId::new("/tmp/a.bin"), &json!({}))
                    .await
            })
        };
        // Make sure the first call is on the wire before the second.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let b = backend
            .deserialize_resource(&BlockId::new("/tmp/a.bin"))
            .await;

        assert_eq!(a.await.unwrap().unwrap(), vec!["serialize_resource.out".to_string()]);
        // A list of strings is neither ReadData nor ReadError.
        assert!(b.is_err());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_push_is_forwarded_once_and_acknowledged() {
        let (_backend, mut pushes, mut fake) = connect();

        fake.send(Frame::Call {
            id: 41,
            name: "open_file".into(),
            args: vec![json!("/tmp/b.bin")],
        })
        .await;

        let push = pushes.recv().await.unwrap();
        assert_eq!(push, BackendPush::OpenFile { path: "/tmp/b.bin".into() });

        let ack = read_frame(&mut fake.reader).await.unwrap().unwrap();
        assert_eq!(ack, Frame::ok(41, Value::Null));
        assert!(pushes.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unknown_push_is_rejected() {
        let (_backend, mut pushes, mut fake) = connect();

        fake.send(Frame::Call {
            id: 5,
            name: "rm_rf".into(),
            args: vec![],
        })
        .await;

        let ack = read_frame(&mut fake.reader).await.unwrap().unwrap();
        assert!(matches!(
            ack,
            Frame::Return {
                id: 5,
                outcome: crate::protocol::ReturnOutcome::Error { .. }
            }
        ));
        assert!(pushes.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_pending_calls_fail_when_backend_exits() {
        let (backend, _pushes, mut fake) = connect();

        let server = tokio::spawn(async move {
            let _ = fake.expect_call().await;
            drop(fake);
        });

        let err = backend.open_file_with_system_app("/tmp/a.bin").await.unwrap_err();
        assert_eq!(err, BackendError::disconnected());
        server.await.unwrap();

        let err = backend.frontend_ready().await.unwrap_err();
        assert_eq!(err, BackendError::disconnected());
    }

    #[tokio::test]
    async fn test_custom_action_null_result_is_none() {
        let (backend, _pushes, mut fake) = connect();

        let server = tokio::spawn(async move {
            let (id, name, args) = fake.expect_call().await;
            assert_eq!(name, "run_custom_action");
            assert_eq!(args[0], json!("/tmp/a.bin"));
            assert_eq!(args[2], json!([1.5]));
            fake.send(Frame::ok(id, Value::Null)).await;
            fake
        });

        let action = CustomAction::new("scale_car");
        let out = backend
            .run_custom_action(&BlockId::new("/tmp/a.bin"), &action, &[json!(1.5)])
            .await
            .unwrap();
        assert_eq!(out, None);
        server.await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawned_process_speaks_on_stdio() {
        let _ = env_logger::builder().is_test(true).try_init();
        // Answers the first call, then exits.
        let command = BackendCommand {
            program: "sh".into(),
            args: vec![
                "-c".into(),
                r#"read line; echo '{"kind":"return","id":0,"status":"ok","value":null}'"#.into(),
            ],
        };
        let (backend, _pushes) = JsonRpcBackend::spawn(&command).unwrap();

        backend.frontend_ready().await.unwrap();

        // The process has exited; later calls fail instead of hanging.
        assert!(backend.frontend_ready().await.is_err());
    }

    #[tokio::test]
    async fn test_spawn_missing_program_is_backend_error() {
        let command = BackendCommand {
            program: "/nonexistent/resedit-backend".into(),
            args: vec![],
        };
        let Err(err) = JsonRpcBackend::spawn(&command) else {
            panic!("spawning a missing program should fail");
        };
        assert!(!err.error_text.is_empty());
    }
}
