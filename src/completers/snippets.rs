// SPDX-License-Identifier: MIT
//! Snippet candidate provider.
//!
//! Subserver-less completer that keeps per-file-type snippet candidates
//! loaded from `.snippets` definition files. It declares no semantic
//! commands; its only job is refreshing the candidate set when the user
//! visits a buffer. May be registered as the wildcard fallback so file
//! types without a semantic engine still resolve to something.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{Completer, CompleterCapabilities};
use crate::error::BrokerError;
use crate::request::{CommandName, Request};
use crate::response::CanonicalResponse;

/// One snippet candidate: the trigger word and its description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub trigger: String,
    pub description: String,
}

/// Candidate-only snippet completer.
pub struct SnippetCompleter {
    capabilities: CompleterCapabilities,
    /// Directories scanned for `<filetype>.snippets` files.
    snippet_dirs: Vec<PathBuf>,
    candidates: RwLock<HashMap<String, Vec<Snippet>>>,
}

impl SnippetCompleter {
    pub fn new(snippet_dirs: Vec<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            capabilities: CompleterCapabilities::none(),
            snippet_dirs,
            candidates: RwLock::new(HashMap::new()),
        })
    }

    /// Current candidates for a file type (empty until a buffer visit).
    pub async fn candidates(&self, filetype: &str) -> Vec<Snippet> {
        self.candidates
            .read()
            .await
            .get(filetype)
            .cloned()
            .unwrap_or_default()
    }

    /// Re-read `<dir>/<filetype>.snippets` for every configured directory.
    /// Later directories shadow earlier ones on duplicate triggers.
    async fn refresh(&self, filetype: &str) {
        let mut found: Vec<Snippet> = Vec::new();
        for dir in &self.snippet_dirs {
            let path = dir.join(format!("{filetype}.snippets"));
            let contents = match tokio::fs::read_to_string(&path).await {
                Ok(c) => c,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to read snippet file");
                    continue;
                }
            };
            for snippet in parse_snippet_headers(&contents) {
                found.retain(|s| s.trigger != snippet.trigger);
                found.push(snippet);
            }
        }
        debug!(filetype, count = found.len(), "snippet candidates refreshed");
        self.candidates
            .write()
            .await
            .insert(filetype.to_string(), found);
    }
}

/// Parse `snippet TRIGGER "description"` header lines. Bodies and end
/// markers are irrelevant here; only the candidate surface matters.
fn parse_snippet_headers(contents: &str) -> Vec<Snippet> {
    let mut out = Vec::new();
    for line in contents.lines() {
        let Some(rest) = line.strip_prefix("snippet ") else {
            continue;
        };
        let rest = rest.trim();
        if rest.is_empty() {
            continue;
        }
        let (trigger, description) = match rest.split_once(char::is_whitespace) {
            Some((trigger, tail)) => {
                let tail = tail.trim();
                (trigger, tail.trim_matches('"').to_string())
            }
            None => (rest, String::new()),
        };
        out.push(Snippet {
            trigger: trigger.to_string(),
            description,
        });
    }
    out
}

#[async_trait]
impl Completer for SnippetCompleter {
    fn name(&self) -> &str {
        "snippets"
    }

    fn capabilities(&self) -> &CompleterCapabilities {
        &self.capabilities
    }

    async fn run_command(
        &self,
        cmd: CommandName,
        _req: &Request,
    ) -> Result<CanonicalResponse, BrokerError> {
        // The empty capability set means dispatch never reaches this.
        Err(BrokerError::UnsupportedCommand(cmd.as_str().to_string()))
    }

    async fn on_buffer_visit(&self, req: &Request) {
        self.refresh(&req.filetype).await;
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
