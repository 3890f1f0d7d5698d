// SPDX-License-Identifier: MIT
//! Completer registry.
//!
//! Built once from configuration at process start, read-only afterwards;
//! the only mutation after construction is lifecycle state inside each
//! subserver. No globals: an isolated registry is just a freshly built one,
//! which is what tests do.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::completers::Completer;
use crate::error::BrokerError;
use crate::request::CompleterTarget;

/// Immutable name/file-type routing table.
///
/// Several file types may share one completer (one engine process analyzing
/// related languages); lifecycle triggering through either file type lands
/// on the same subserver and is idempotent there.
pub struct CompleterRegistry {
    by_name: HashMap<String, Arc<dyn Completer>>,
    by_filetype: HashMap<String, Arc<dyn Completer>>,
    wildcard: Option<Arc<dyn Completer>>,
}

impl CompleterRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Resolution order: explicit completer name, then the file type's
    /// completer, then the wildcard fallback.
    pub fn resolve(
        &self,
        filetype: &str,
        target: &CompleterTarget,
    ) -> Result<Arc<dyn Completer>, BrokerError> {
        match target {
            CompleterTarget::Named(name) => self
                .by_name
                .get(name)
                .cloned()
                .ok_or_else(|| BrokerError::NoSuchCompleter(name.clone())),
            CompleterTarget::FiletypeDefault => self
                .by_filetype
                .get(filetype)
                .or(self.wildcard.as_ref())
                .cloned()
                .ok_or_else(|| BrokerError::NoSuchCompleter(filetype.to_string())),
        }
    }

    /// Registered completers with the file types routed to each, sorted by
    /// name. The wildcard appears under the `"*"` file type.
    pub fn table(&self) -> Vec<(String, Vec<String>)> {
        let mut filetypes_of: HashMap<&str, Vec<String>> = HashMap::new();
        for (filetype, completer) in &self.by_filetype {
            filetypes_of
                .entry(completer.name())
                .or_default()
                .push(filetype.clone());
        }
        if let Some(wildcard) = &self.wildcard {
            filetypes_of
                .entry(wildcard.name())
                .or_default()
                .push("*".to_string());
        }
        let mut table: Vec<(String, Vec<String>)> = self
            .by_name
            .values()
            .map(|c| {
                let mut filetypes = filetypes_of.remove(c.name()).unwrap_or_default();
                filetypes.sort();
                (c.name().to_string(), filetypes)
            })
            .collect();
        table.sort();
        table
    }

    /// Stop every subserver. Daemon teardown path; idempotent.
    pub async fn shutdown_all(&self) {
        for completer in self.by_name.values() {
            if let Some(subserver) = completer.subserver() {
                subserver.stop().await;
            }
        }
        info!("all subservers stopped");
    }
}

// ─── RegistryBuilder ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RegistryBuilder {
    by_name: HashMap<String, Arc<dyn Completer>>,
    by_filetype: HashMap<String, Arc<dyn Completer>>,
    wildcard: Option<Arc<dyn Completer>>,
}

impl RegistryBuilder {
    /// Register a completer for its file types. Later registrations win on
    /// file-type conflicts.
    pub fn register(mut self, completer: Arc<dyn Completer>, filetypes: &[&str]) -> Self {
        self.by_name
            .insert(completer.name().to_string(), completer.clone());
        for filetype in filetypes {
            self.by_filetype
                .insert((*filetype).to_string(), completer.clone());
        }
        self
    }

    /// Register the fallback completer for file types with no dedicated one.
    pub fn register_wildcard(mut self, completer: Arc<dyn Completer>) -> Self {
        self.by_name
            .insert(completer.name().to_string(), completer.clone());
        self.wildcard = Some(completer);
        self
    }

    pub fn build(self) -> CompleterRegistry {
        CompleterRegistry {
            by_name: self.by_name,
            by_filetype: self.by_filetype,
            wildcard: self.wildcard,
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
