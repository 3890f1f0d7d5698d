// SPDX-License-Identifier: MIT
//! Shared test fixtures: a scriptable backend and registry builders.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use lingod::backend::{Backend, BackendCallError};
use lingod::completers::{CompleterCapabilities, SubserverCompleter};
use lingod::registry::CompleterRegistry;
use lingod::request::Request;
use lingod::subserver::{ServerState, Subserver, SubserverConfig};

/// Backend whose answers are scripted per command ahead of time.
pub struct ScriptedBackend {
    ready: AtomicBool,
    starts: std::sync::atomic::AtomicU32,
    responses: Mutex<HashMap<String, VecDeque<Result<Value, BackendCallError>>>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl ScriptedBackend {
    /// A backend that reports ready on the first probe.
    pub fn ready() -> Arc<Self> {
        Arc::new(Self {
            ready: AtomicBool::new(true),
            starts: std::sync::atomic::AtomicU32::new(0),
            responses: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Queue one answer for the next call of `command`.
    pub async fn script(&self, command: &str, answer: Result<Value, BackendCallError>) {
        self.responses
            .lock()
            .await
            .entry(command.to_string())
            .or_default()
            .push_back(answer);
    }

    /// Every `(command, payload)` pair forwarded so far.
    pub async fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().await.clone()
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// How many times the engine was started.
    pub fn starts(&self) -> u32 {
        self.starts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn start(&self) -> Result<(), BackendCallError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn ready_probe(&self) -> Result<bool, BackendCallError> {
        Ok(self.ready.load(Ordering::SeqCst))
    }

    async fn call(&self, command: &str, payload: Value) -> Result<Value, BackendCallError> {
        self.calls
            .lock()
            .await
            .push((command.to_string(), payload));
        self.responses
            .lock()
            .await
            .get_mut(command)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(BackendCallError::Failed(format!(
                    "unscripted command '{command}'"
                )))
            })
    }

    async fn shutdown(&self) {}
}

/// A subserver over the scripted backend with test-speed timeouts.
pub fn subserver_over(backend: Arc<ScriptedBackend>) -> Subserver {
    Subserver::new(
        "clangd",
        Arc::new(move || backend.clone() as Arc<dyn Backend>),
        SubserverConfig {
            start_timeout: Duration::from_millis(500),
            probe_interval: Duration::from_millis(5),
        },
    )
}

/// Registry with one full-capability C-family completer over `backend`,
/// routed from the `cpp` and `c` file types.
pub fn semantic_registry(backend: Arc<ScriptedBackend>) -> CompleterRegistry {
    let subserver = subserver_over(backend);
    CompleterRegistry::builder()
        .register(
            SubserverCompleter::new(
                "clangd",
                CompleterCapabilities::full(),
                subserver,
                Duration::from_millis(500),
            ),
            &["cpp", "c"],
        )
        .build()
}

/// Poll until the named completer's subserver reaches `state`.
pub async fn wait_for_state(registry: &CompleterRegistry, completer: &str, state: ServerState) {
    use lingod::request::CompleterTarget;
    let completer = registry
        .resolve("", &CompleterTarget::Named(completer.to_string()))
        .expect("completer registered");
    let subserver = completer.subserver().expect("has a subserver");
    for _ in 0..200 {
        if subserver.state().await == state {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!(
        "subserver never reached {state}, stuck at {}",
        subserver.state().await
    );
}

/// A point request against `/tmp/test.cpp`.
pub fn point_request(command_arguments: &[&str], line: u32, col: u32) -> Request {
    Request {
        filetype: "cpp".into(),
        completer_target: None,
        command_arguments: command_arguments.iter().map(|s| s.to_string()).collect(),
        filepath: "/tmp/test.cpp".into(),
        line_num: Some(line),
        column_num: Some(col),
        range: None,
        contents: None,
        fixit: None,
    }
}
