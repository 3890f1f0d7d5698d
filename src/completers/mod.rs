// SPDX-License-Identifier: MIT
//! Completer layer.
//!
//! A [`Completer`] owns everything about one language's semantics: which
//! commands it answers, how requests become backend payloads, and how the
//! backend's answers become canonical responses. Most completers drive a
//! subserver; candidate-only providers (snippets) do not.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::{json, Value};

use crate::error::BrokerError;
use crate::fixit;
use crate::normalize;
use crate::request::{CommandName, Request};
use crate::response::{CanonicalResponse, FixItSet};
use crate::subserver::Subserver;

pub mod snippets;

pub use snippets::SnippetCompleter;

// ─── Capabilities ─────────────────────────────────────────────────────────────

/// Every command a fully featured semantic completer can declare.
static FULL_COMMAND_SET: Lazy<HashSet<CommandName>> = Lazy::new(|| {
    use CommandName::*;
    [
        GetType,
        GetTypeImprecise,
        GetDoc,
        GetDocImprecise,
        GoTo,
        GoToImprecise,
        GoToDeclaration,
        GoToDefinition,
        GoToInclude,
        GoToReferences,
        GoToSymbol,
        FixIt,
        ResolveFixIt,
        Format,
        RefactorRename,
        ExecuteCommand,
        RestartServer,
    ]
    .into_iter()
    .collect()
});

/// What a completer declares about itself at registration time.
#[derive(Debug, Clone)]
pub struct CompleterCapabilities {
    /// Commands this completer answers; anything else is `UnsupportedCommand`.
    pub commands: HashSet<CommandName>,
    /// Whether the backend distinguishes "still initializing" from other
    /// failures on its own calls.
    pub reports_initializing: bool,
    /// Whether fix-it resolution is two-phase for this completer.
    pub two_phase_fixit: bool,
}

impl CompleterCapabilities {
    /// The full command set (C-family profile).
    pub fn full() -> Self {
        Self {
            commands: FULL_COMMAND_SET.clone(),
            reports_initializing: true,
            two_phase_fixit: true,
        }
    }

    /// Full set minus the named commands.
    pub fn full_except(excluded: &[CommandName]) -> Self {
        let mut caps = Self::full();
        for cmd in excluded {
            caps.commands.remove(cmd);
        }
        caps
    }

    /// No semantic commands at all (candidate-only providers).
    pub fn none() -> Self {
        Self {
            commands: HashSet::new(),
            reports_initializing: false,
            two_phase_fixit: false,
        }
    }

    pub fn supports(&self, cmd: CommandName) -> bool {
        self.commands.contains(&cmd)
    }
}

// ─── Completer ────────────────────────────────────────────────────────────────

/// One language's semantic provider.
#[async_trait]
pub trait Completer: Send + Sync {
    fn name(&self) -> &str;

    fn capabilities(&self) -> &CompleterCapabilities;

    /// The subserver this completer drives, when it has one.
    fn subserver(&self) -> Option<&Subserver> {
        None
    }

    /// Answer one already-capability-checked command.
    async fn run_command(
        &self,
        cmd: CommandName,
        req: &Request,
    ) -> Result<CanonicalResponse, BrokerError>;

    /// A buffer of this completer's file type is ready for analysis.
    async fn on_file_ready_to_parse(&self) {}

    /// The user visited a buffer of this completer's file type.
    async fn on_buffer_visit(&self, _req: &Request) {}
}

impl std::fmt::Debug for dyn Completer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completer")
            .field("name", &self.name())
            .finish()
    }
}

// ─── SubserverCompleter ───────────────────────────────────────────────────────

/// Generic semantic completer: builds the backend-native payload, forwards
/// through its subserver with a bounded timeout, normalizes the result.
pub struct SubserverCompleter {
    name: String,
    capabilities: CompleterCapabilities,
    subserver: Subserver,
    command_timeout: Duration,
}

impl SubserverCompleter {
    pub fn new(
        name: impl Into<String>,
        capabilities: CompleterCapabilities,
        subserver: Subserver,
        command_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            capabilities,
            subserver,
            command_timeout,
        })
    }

    /// The backend-native request payload: cursor/range/contents plus the
    /// trailing command arguments.
    fn wire_payload(&self, req: &Request) -> Value {
        let mut payload = json!({
            "filepath": req.filepath,
            "arguments": req.trailing_arguments(),
        });
        if let Some(line) = req.line_num {
            payload["line_num"] = json!(line);
        }
        if let Some(col) = req.column_num {
            payload["column_num"] = json!(col);
        }
        if let Some(range) = &req.range {
            payload["range"] = json!(range);
        }
        if let Some(contents) = &req.contents {
            payload["contents"] = json!(contents);
        }
        payload
    }

    /// One bounded forward. An elapsed timer is `Timeout`, retryable by the
    /// caller; the pipe is left to the subserver's own crash detection.
    async fn forward(&self, command: CommandName, payload: Value) -> Result<Value, BrokerError> {
        match tokio::time::timeout(
            self.command_timeout,
            self.subserver.forward(command.as_str(), payload),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(BrokerError::Timeout),
        }
    }

    async fn run_fixit(&self, req: &Request) -> Result<CanonicalResponse, BrokerError> {
        let raw = self.forward(CommandName::FixIt, self.wire_payload(req)).await?;
        let set = normalize::parse_fixit_set(raw)?;
        let set = match (&req.range, req.cursor()) {
            // A ranged request with nothing applicable is a valid single
            // fix-it with no chunks, not an error.
            (Some(range), _) if set.fixits.is_empty() => fixit::empty_ranged_set(range),
            (None, Some(cursor)) => fixit::filter_at_cursor(set, &cursor),
            _ => set,
        };
        Ok(CanonicalResponse::FixIts(set))
    }

    async fn run_resolve_fixit(&self, req: &Request) -> Result<CanonicalResponse, BrokerError> {
        // No backend is involved yet; a resolve without a fix-it to resolve
        // is a caller-side token error.
        let fixit = req.fixit.clone().ok_or_else(|| {
            BrokerError::InvalidFixItToken("no fix-it provided to resolve".into())
        })?;
        // Resolving an already-resolved fix-it is an idempotent no-op.
        if fixit.is_resolved() {
            return Ok(CanonicalResponse::FixIts(FixItSet {
                fixits: vec![fixit],
            }));
        }
        let token = fixit
            .resolve_token
            .as_ref()
            .map(|t| t.0.clone())
            .unwrap_or(Value::Null);
        let mut payload = self.wire_payload(req);
        payload["command"] = token;
        let raw = self.forward(CommandName::ResolveFixIt, payload).await?;
        let resolved = fixit::merge_resolved(fixit, raw)?;
        Ok(CanonicalResponse::FixIts(FixItSet {
            fixits: vec![resolved],
        }))
    }
}

#[async_trait]
impl Completer for SubserverCompleter {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &CompleterCapabilities {
        &self.capabilities
    }

    fn subserver(&self) -> Option<&Subserver> {
        Some(&self.subserver)
    }

    async fn run_command(
        &self,
        cmd: CommandName,
        req: &Request,
    ) -> Result<CanonicalResponse, BrokerError> {
        match cmd {
            CommandName::FixIt => self.run_fixit(req).await,
            CommandName::ResolveFixIt => self.run_resolve_fixit(req).await,
            _ => {
                let raw = self.forward(cmd, self.wire_payload(req)).await?;
                normalize::normalize(cmd, raw)
            }
        }
    }

    async fn on_file_ready_to_parse(&self) {
        self.subserver.ensure_started().await;
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
