// SPDX-License-Identifier: MIT
//! The backend seam.
//!
//! A [`Backend`] is the transport to one semantic engine process. The broker
//! only ever sees this trait: the lifecycle manager starts/probes/stops it,
//! the dispatcher calls it, the normalizer interprets what comes back. Tests
//! substitute scripted implementations at this seam.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::BrokerError;

pub mod pipe;

pub use pipe::PipeBackend;

// ─── Error sentinels ──────────────────────────────────────────────────────────

/// Message prefix a backend uses to report "still warming up" on a call.
pub const SERVER_INITIALIZING: &str = "SERVER_INITIALIZING";

/// Message prefix a backend uses to reject a stale or unknown fix-it token.
/// The rest of the message describes the token.
pub const INVALID_FIXIT_TOKEN: &str = "INVALID_FIXIT_TOKEN:";

// ─── BackendCallError ─────────────────────────────────────────────────────────

/// Failure modes of one backend round trip.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendCallError {
    /// The transport died mid-call (process exit, closed pipe). The subserver
    /// is presumed crashed.
    #[error("backend connection lost")]
    ConnectionLost,
    /// The round trip exceeded the transport's call bound. Retryable; the
    /// transport has already torn the connection down.
    #[error("backend call timed out")]
    TimedOut,
    /// The backend answered with an error payload. Sentinel prefixes in the
    /// message carry structured meaning; see [`classify_call_error`].
    #[error("{0}")]
    Failed(String),
}

/// Map a transport failure to the broker's error taxonomy.
///
/// Sentinel-prefixed messages become their typed counterparts; everything
/// else is surfaced verbatim as a backend error.
pub fn classify_call_error(err: BackendCallError) -> BrokerError {
    match err {
        BackendCallError::ConnectionLost => BrokerError::ServerCrashed,
        BackendCallError::TimedOut => BrokerError::Timeout,
        BackendCallError::Failed(msg) => {
            if msg.starts_with(SERVER_INITIALIZING) {
                BrokerError::ServerInitializing
            } else if let Some(token) = msg.strip_prefix(INVALID_FIXIT_TOKEN) {
                BrokerError::InvalidFixItToken(token.trim().to_string())
            } else {
                BrokerError::BackendError(msg)
            }
        }
    }
}

// ─── Backend ──────────────────────────────────────────────────────────────────

/// Transport to one semantic engine process.
///
/// Implementations must be safe to share across tasks; the lifecycle manager
/// serializes start/shutdown, but `call` and `ready_probe` may race with
/// each other.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Launch the engine process. Returns once the transport is up — the
    /// engine may still be indexing; readiness is a separate concern.
    async fn start(&self) -> Result<(), BackendCallError>;

    /// One cheap readiness check. `Ok(false)` means still initializing;
    /// errors mean the probe itself could not be delivered.
    async fn ready_probe(&self) -> Result<bool, BackendCallError>;

    /// Forward one command with its payload and await the engine's answer.
    async fn call(&self, command: &str, payload: Value) -> Result<Value, BackendCallError>;

    /// Tear the engine down. Idempotent; never fails loudly.
    async fn shutdown(&self);
}

// ─── Tests ────────────────────────────────────────────────────────────────────
