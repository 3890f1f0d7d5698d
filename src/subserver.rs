// SPDX-License-Identifier: MIT
//! Subserver lifecycle manager.
//!
//! One [`Subserver`] supervises one semantic engine process. Commands are
//! forwarded only from `Ready`; every other state answers fast with
//! `ServerInitializing` instead of blocking the caller.
//!
//! # State machine
//!
//! ```text
//! Unstarted ──(first FileReadyToParse)──► Starting ──► Initializing ──► Ready
//!     ▲                                                    ▲             │
//!     ├──(stop / start failure / start timeout)            │      (crash or
//!     │                                                    │   RestartServer)
//!     └───────────── Stopping ◄──── Ready         Restarting ◄────────────┘
//! ```
//!
//! At most one transition is in flight per subserver. Background start and
//! restart tasks are generation-guarded: a stale task observing a newer
//! generation abandons its write instead of clobbering fresher state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::backend::{classify_call_error, Backend, BackendCallError};
use crate::error::BrokerError;

// ─── State ────────────────────────────────────────────────────────────────────

/// Observable lifecycle state of a subserver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// No engine process exists.
    Unstarted,
    /// The engine process is being launched.
    Starting,
    /// The process is up but still indexing; readiness is being polled.
    Initializing,
    /// The engine answers queries.
    Ready,
    /// The old instance is being torn down before a fresh start.
    Restarting,
    /// Resources are being released on the way back to `Unstarted`.
    Stopping,
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerState::Unstarted => write!(f, "unstarted"),
            ServerState::Starting => write!(f, "starting"),
            ServerState::Initializing => write!(f, "initializing"),
            ServerState::Ready => write!(f, "ready"),
            ServerState::Restarting => write!(f, "restarting"),
            ServerState::Stopping => write!(f, "stopping"),
        }
    }
}

/// Tunables for one subserver's startup behavior.
#[derive(Debug, Clone)]
pub struct SubserverConfig {
    /// Overall deadline for `Starting -> Ready`. Exceeding it tears the
    /// engine down and surfaces `ServerStartTimeout` on the next forward.
    pub start_timeout: Duration,
    /// Initial readiness-probe interval. Doubles per probe, capped at 1s.
    pub probe_interval: Duration,
}

impl Default for SubserverConfig {
    fn default() -> Self {
        Self {
            start_timeout: Duration::from_secs(30),
            probe_interval: Duration::from_millis(50),
        }
    }
}

/// Builds a fresh backend transport from the configuration snapshot taken at
/// registration time. Called on every start and restart.
pub type BackendFactory = Arc<dyn Fn() -> Arc<dyn Backend> + Send + Sync>;

struct SubserverInner {
    state: ServerState,
    backend: Option<Arc<dyn Backend>>,
    /// Bumped on every transition; background tasks carry the generation they
    /// were spawned under and abandon writes when it has moved on.
    generation: u64,
    /// Set when the last start attempt exceeded its deadline; reported once
    /// on the next forward, then cleared by the retriggered start.
    start_timed_out: bool,
    last_activity: Option<DateTime<Utc>>,
}

// ─── Subserver ────────────────────────────────────────────────────────────────

/// Supervisor for one engine process. Cheaply cloneable; clones share state.
#[derive(Clone)]
pub struct Subserver {
    name: Arc<str>,
    factory: BackendFactory,
    config: Arc<SubserverConfig>,
    inner: Arc<RwLock<SubserverInner>>,
}

impl Subserver {
    pub fn new(name: impl Into<String>, factory: BackendFactory, config: SubserverConfig) -> Self {
        Self {
            name: Arc::from(name.into().as_str()),
            factory,
            config: Arc::new(config),
            inner: Arc::new(RwLock::new(SubserverInner {
                state: ServerState::Unstarted,
                backend: None,
                generation: 0,
                start_timed_out: false,
                last_activity: None,
            })),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn state(&self) -> ServerState {
        self.inner.read().await.state
    }

    pub async fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.inner.read().await.last_activity
    }

    /// Lazy start trigger (first `FileReadyToParse` for the file type).
    ///
    /// Idempotent under concurrent triggering: only the caller that observes
    /// `Unstarted` under the write lock launches the engine; everyone else
    /// sees a transition already in flight and returns immediately.
    pub async fn ensure_started(&self) {
        {
            let inner = self.inner.read().await;
            if inner.state != ServerState::Unstarted {
                return;
            }
        }
        let generation = {
            let mut inner = self.inner.write().await;
            // Re-check after acquiring the write lock.
            if inner.state != ServerState::Unstarted {
                return;
            }
            inner.state = ServerState::Starting;
            inner.start_timed_out = false;
            inner.generation += 1;
            inner.backend = Some((self.factory)());
            inner.last_activity = Some(Utc::now());
            inner.generation
        };
        info!(subserver = %self.name, "starting engine");
        let this = self.clone();
        tokio::spawn(async move { this.run_start(generation).await });
    }

    /// Fail-fast readiness gate: `Ok` only from `Ready`. A start attempt
    /// that hit its deadline reports `ServerStartTimeout` instead of the
    /// generic `ServerInitializing`.
    pub async fn readiness(&self) -> Result<(), BrokerError> {
        let inner = self.inner.read().await;
        match inner.state {
            ServerState::Ready => Ok(()),
            ServerState::Unstarted if inner.start_timed_out => {
                Err(BrokerError::ServerStartTimeout)
            }
            _ => Err(BrokerError::ServerInitializing),
        }
    }

    /// Forward one command. Fails fast from any non-`Ready` state.
    pub async fn forward(&self, command: &str, payload: Value) -> Result<Value, BrokerError> {
        let (backend, generation) = {
            let inner = self.inner.read().await;
            match inner.state {
                ServerState::Ready => {
                    let backend = inner
                        .backend
                        .clone()
                        .ok_or(BrokerError::ServerInitializing)?;
                    (backend, inner.generation)
                }
                ServerState::Unstarted if inner.start_timed_out => {
                    return Err(BrokerError::ServerStartTimeout);
                }
                _ => return Err(BrokerError::ServerInitializing),
            }
        };

        match backend.call(command, payload).await {
            Ok(value) => {
                self.inner.write().await.last_activity = Some(Utc::now());
                Ok(value)
            }
            Err(BackendCallError::ConnectionLost) => {
                // The engine died under us. Kick off a restart in the
                // background and fail this request; the caller decides
                // whether to retry.
                warn!(subserver = %self.name, command, "engine connection lost, restarting");
                self.begin_restart(Some(generation)).await;
                Err(BrokerError::ServerCrashed)
            }
            Err(err) => Err(classify_call_error(err)),
        }
    }

    /// Explicit restart (the `RestartServer` command).
    pub async fn restart(&self) {
        info!(subserver = %self.name, "restart requested");
        self.begin_restart(None).await;
    }

    /// Tear down and return to `Unstarted`. Resource release is
    /// unconditional: the backend handle is taken and shut down even when
    /// the process is already dead.
    pub async fn stop(&self) {
        let backend = {
            let mut inner = self.inner.write().await;
            if inner.state == ServerState::Unstarted {
                return;
            }
            inner.state = ServerState::Stopping;
            inner.generation += 1;
            inner.backend.take()
        };
        if let Some(backend) = backend {
            backend.shutdown().await;
        }
        let mut inner = self.inner.write().await;
        inner.state = ServerState::Unstarted;
        inner.last_activity = Some(Utc::now());
        info!(subserver = %self.name, "engine stopped");
    }

    // ─── Internal transitions ─────────────────────────────────────────────────

    /// `expected_generation` makes crash-triggered restarts abort when the
    /// state has moved on since the failing call cloned its backend handle —
    /// a drained (stopped) subserver must not be resurrected by a straggling
    /// in-flight call. Explicit restarts pass `None`.
    async fn begin_restart(&self, expected_generation: Option<u64>) {
        let (old_backend, generation) = {
            let mut inner = self.inner.write().await;
            if let Some(expected) = expected_generation {
                if inner.generation != expected {
                    return;
                }
            }
            if inner.state == ServerState::Restarting || inner.state == ServerState::Stopping {
                // A teardown is already in flight.
                return;
            }
            inner.state = ServerState::Restarting;
            inner.generation += 1;
            (inner.backend.take(), inner.generation)
        };
        let this = self.clone();
        tokio::spawn(async move {
            if let Some(backend) = old_backend {
                backend.shutdown().await;
            }
            let proceed = {
                let mut inner = this.inner.write().await;
                if inner.generation != generation {
                    false
                } else {
                    inner.state = ServerState::Starting;
                    inner.start_timed_out = false;
                    inner.backend = Some((this.factory)());
                    true
                }
            };
            if proceed {
                this.run_start(generation).await;
            }
        });
    }

    /// Launch the engine, then poll readiness with doubling backoff until the
    /// overall deadline. Runs in the background under a fixed generation.
    async fn run_start(&self, generation: u64) {
        let backend = match self.inner.read().await.backend.clone() {
            Some(b) => b,
            None => return,
        };

        if let Err(err) = backend.start().await {
            warn!(subserver = %self.name, error = %err, "engine failed to start");
            backend.shutdown().await;
            self.finish_start(generation, ServerState::Unstarted, false).await;
            return;
        }
        if !self.finish_start(generation, ServerState::Initializing, false).await {
            backend.shutdown().await;
            return;
        }

        let deadline = Instant::now() + self.config.start_timeout;
        let mut interval = self.config.probe_interval;
        loop {
            match backend.ready_probe().await {
                Ok(true) => {
                    if self.finish_start(generation, ServerState::Ready, false).await {
                        info!(subserver = %self.name, "engine ready");
                    } else {
                        backend.shutdown().await;
                    }
                    return;
                }
                Ok(false) => {
                    debug!(subserver = %self.name, "engine still initializing");
                }
                Err(err) => {
                    warn!(subserver = %self.name, error = %err, "readiness probe failed");
                    backend.shutdown().await;
                    self.finish_start(generation, ServerState::Unstarted, false).await;
                    return;
                }
            }
            if Instant::now() + interval > deadline {
                warn!(subserver = %self.name, "engine start deadline exceeded");
                backend.shutdown().await;
                self.finish_start(generation, ServerState::Unstarted, true).await;
                return;
            }
            tokio::time::sleep(interval).await;
            interval = (interval * 2).min(Duration::from_secs(1));
        }
    }

    /// Commit a start-task transition, unless a newer generation owns the
    /// state. Returns whether the write was applied.
    async fn finish_start(&self, generation: u64, state: ServerState, timed_out: bool) -> bool {
        let mut inner = self.inner.write().await;
        if inner.generation != generation {
            return false;
        }
        inner.state = state;
        inner.start_timed_out = timed_out;
        inner.last_activity = Some(Utc::now());
        if state == ServerState::Unstarted {
            inner.backend = None;
        }
        true
    }
}

impl std::fmt::Debug for Subserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subserver").field("name", &self.name).finish()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
