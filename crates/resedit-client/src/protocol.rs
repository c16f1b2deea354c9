//! Wire frames of the backend line protocol.
//!
//! One JSON object per line, in both directions:
//!
//! ```text
//! → {"kind":"call","id":7,"name":"save_file","args":["/tmp/a.bin",[{"id":"..","value":1}]]}
//! ← {"kind":"return","id":7,"status":"ok","value":null}
//! ← {"kind":"return","id":8,"status":"error","error":{"errorText":"corrupt"}}
//! ← {"kind":"call","id":3,"name":"open_file","args":["/tmp/b.bin"]}      (push)
//! → {"kind":"return","id":3,"status":"ok","value":null}
//! ```
//!
//! Ids are per-direction: the backend numbers its own pushes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::BackendError;

/// One line of the protocol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Frame {
    Call {
        id: u64,
        name: String,
        #[serde(default)]
        args: Vec<Value>,
    },
    Return {
        id: u64,
        #[serde(flatten)]
        outcome: ReturnOutcome,
    },
}

/// Result half of a [`Frame::Return`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReturnOutcome {
    Ok {
        #[serde(default)]
        value: Value,
    },
    Error {
        error: BackendError,
    },
}

impl ReturnOutcome {
    pub fn into_result(self) -> Result<Value, BackendError> {
        match self {
            Self::Ok { value } => Ok(value),
            Self::Error { error } => Err(error),
        }
    }
}

impl Frame {
    pub fn ok(id: u64, value: Value) -> Self {
        Self::Return {
            id,
            outcome: ReturnOutcome::Ok { value },
        }
    }

    pub fn err(id: u64, error: BackendError) -> Self {
        Self::Return {
            id,
            outcome: ReturnOutcome::Error { error },
        }
    }
}

/// Sequential id source for outgoing calls.
#[derive(Debug, Default)]
pub struct CallIdGen(std::sync::atomic::AtomicU64);

impl CallIdGen {
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    }
}

/// Read the next frame. `Ok(None)` means the stream ended cleanly.
///
/// Blank lines are skipped.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>, BackendError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        return Ok(Some(serde_json::from_str(trimmed)?));
    }
}

/// Write one frame followed by a newline, and flush.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), BackendError>
where
    W: AsyncWrite + Unpin,
{
    let mut bytes = serde_json::to_vec(frame)?;
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}
