// SPDX-License-Identifier: MIT
//! JSON-lines transport to a child engine process.
//!
//! One request per line on the child's stdin, one reply per line on its
//! stdout. Requests are `{"command": ..., "payload": ...}`; replies are
//! `{"ok": <value>}` or `{"error": "<message>"}`. Round trips are serialized
//! on the pipe, so a single mutex guards the whole I/O pair.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{Backend, BackendCallError};

/// Reply line from the engine process.
#[derive(Debug, Deserialize)]
struct PipeReply {
    #[serde(default)]
    ok: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

struct PipeIo {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    /// True while a request has been written but its reply not yet read.
    /// A round trip abandoned mid-exchange (caller dropped the future)
    /// leaves this set, and the next caller drops the connection instead
    /// of reading the stale reply.
    in_flight: bool,
}

/// [`Backend`] that runs an engine as a child process and speaks JSON lines
/// over its standard streams.
pub struct PipeBackend {
    binary: PathBuf,
    args: Vec<String>,
    call_timeout: Duration,
    io: Mutex<Option<PipeIo>>,
}

impl PipeBackend {
    pub fn new(binary: impl Into<PathBuf>, args: Vec<String>, call_timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            args,
            call_timeout,
            io: Mutex::new(None),
        }
    }

    /// One serialized round trip. Any I/O failure or EOF means the child is
    /// gone; the connection is dropped so the next call fails the same way.
    async fn round_trip(&self, request: Value) -> Result<Value, BackendCallError> {
        let mut guard = self.io.lock().await;
        let io = guard.as_mut().ok_or(BackendCallError::ConnectionLost)?;
        if io.in_flight {
            // A previous exchange was abandoned; the pipe is desynchronized.
            warn!(binary = %self.binary.display(), "abandoned exchange on the pipe, dropping connection");
            *guard = None;
            return Err(BackendCallError::ConnectionLost);
        }
        let mut line = serde_json::to_string(&request)
            .map_err(|e| BackendCallError::Failed(format!("request serialization: {e}")))?;
        line.push('\n');
        io.in_flight = true;

        let exchange = async {
            io.stdin
                .write_all(line.as_bytes())
                .await
                .map_err(|_| BackendCallError::ConnectionLost)?;
            io.stdin
                .flush()
                .await
                .map_err(|_| BackendCallError::ConnectionLost)?;

            let mut reply = String::new();
            let n = io
                .stdout
                .read_line(&mut reply)
                .await
                .map_err(|_| BackendCallError::ConnectionLost)?;
            if n == 0 {
                // EOF — the engine exited.
                return Err(BackendCallError::ConnectionLost);
            }
            Ok(reply)
        };

        let reply = match tokio::time::timeout(self.call_timeout, exchange).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(err)) => {
                *guard = None;
                return Err(err);
            }
            Err(_) => {
                // The pipe is now desynchronized; tear the connection down.
                warn!(binary = %self.binary.display(), "backend call timed out, dropping connection");
                *guard = None;
                return Err(BackendCallError::TimedOut);
            }
        };
        if let Some(io) = guard.as_mut() {
            io.in_flight = false;
        }

        let parsed: PipeReply = serde_json::from_str(reply.trim()).map_err(|e| {
            BackendCallError::Failed(format!("unparseable backend reply: {e}"))
        })?;
        match (parsed.ok, parsed.error) {
            (_, Some(msg)) => Err(BackendCallError::Failed(msg)),
            (Some(value), None) => Ok(value),
            (None, None) => Err(BackendCallError::Failed(
                "backend reply carried neither ok nor error".into(),
            )),
        }
    }
}

#[async_trait]
impl Backend for PipeBackend {
    async fn start(&self) -> Result<(), BackendCallError> {
        let mut guard = self.io.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let mut child = Command::new(&self.binary)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BackendCallError::Failed(format!("spawn {}: {e}", self.binary.display())))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BackendCallError::Failed("child stdin not captured".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BackendCallError::Failed("child stdout not captured".into()))?;

        info!(binary = %self.binary.display(), pid = child.id(), "engine process started");
        *guard = Some(PipeIo {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            in_flight: false,
        });
        Ok(())
    }

    async fn ready_probe(&self) -> Result<bool, BackendCallError> {
        let reply = self
            .round_trip(json!({ "command": "ready", "payload": {} }))
            .await?;
        Ok(reply.as_bool().unwrap_or(false))
    }

    async fn call(&self, command: &str, payload: Value) -> Result<Value, BackendCallError> {
        debug!(command, "forwarding to engine");
        self.round_trip(json!({ "command": command, "payload": payload }))
            .await
    }

    async fn shutdown(&self) {
        let mut guard = self.io.lock().await;
        if let Some(mut io) = guard.take() {
            // Closing stdin is the polite exit signal; kill if it lingers.
            drop(io.stdin);
            match tokio::time::timeout(Duration::from_secs(2), io.child.wait()).await {
                Ok(Ok(status)) => {
                    info!(binary = %self.binary.display(), %status, "engine process exited")
                }
                _ => {
                    warn!(binary = %self.binary.display(), "engine did not exit, killing");
                    let _ = io.child.kill().await;
                }
            }
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn cat_backend() -> PipeBackend {
        // `cat` echoes each request line back, which is a valid reply as long
        // as the request itself looks like a reply. Good enough to exercise
        // the framing without a real engine.
        PipeBackend::new("cat", vec![], Duration::from_secs(2))
    }

    #[tokio::test]
    async fn call_before_start_is_connection_lost() {
        let b = cat_backend();
        let err = b.call("GetType", json!({})).await.unwrap_err();
        assert_eq!(err, BackendCallError::ConnectionLost);
    }

    #[tokio::test]
    async fn echoed_request_is_rejected_as_malformed_reply() {
        let b = cat_backend();
        b.start().await.unwrap();
        // The echoed line has "command"/"payload" fields and no "ok"/"error",
        // which the reply parser rejects.
        let err = b.call("noop", json!({})).await.unwrap_err();
        assert!(matches!(err, BackendCallError::Failed(ref m) if m.contains("neither")));
        b.shutdown().await;
    }

    #[tokio::test]
    async fn engine_exit_surfaces_as_connection_lost() {
        let b = PipeBackend::new("true", vec![], Duration::from_secs(2));
        b.start().await.unwrap();
        // `true` exits immediately; the read side sees EOF.
        let err = b.call("GetType", json!({})).await.unwrap_err();
        assert_eq!(err, BackendCallError::ConnectionLost);
        b.shutdown().await;
    }

    /// Adapter that reads a request line, waits, then answers.
    fn slow_backend(delay: &str, call_timeout: Duration) -> PipeBackend {
        PipeBackend::new(
            "bash",
            vec![
                "-c".to_string(),
                format!("while read line; do sleep {delay}; echo '{{\"ok\": true}}'; done"),
            ],
            call_timeout,
        )
    }

    #[tokio::test]
    async fn slow_reply_times_out_and_drops_the_connection() {
        let b = slow_backend("1", Duration::from_millis(100));
        b.start().await.unwrap();

        let err = b.call("GetType", json!({})).await.unwrap_err();
        assert_eq!(err, BackendCallError::TimedOut);
        // The connection was torn down; the late reply cannot be read.
        let err = b.call("GetType", json!({})).await.unwrap_err();
        assert_eq!(err, BackendCallError::ConnectionLost);
        b.shutdown().await;
    }

    #[tokio::test]
    async fn abandoned_exchange_poisons_the_connection() {
        // A caller-side bound shorter than the pipe's own leaves the round
        // trip dropped mid-exchange with a reply still in flight.
        let b = slow_backend("1", Duration::from_secs(5));
        b.start().await.unwrap();

        let abandoned =
            tokio::time::timeout(Duration::from_millis(50), b.call("GetType", json!({}))).await;
        assert!(abandoned.is_err());

        // The next call must not read the stale reply.
        let err = b.call("GetType", json!({})).await.unwrap_err();
        assert_eq!(err, BackendCallError::ConnectionLost);
        b.shutdown().await;
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let b = cat_backend();
        b.start().await.unwrap();
        b.start().await.unwrap();
        b.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_without_start_is_a_no_op() {
        let b = cat_backend();
        b.shutdown().await;
    }
}
