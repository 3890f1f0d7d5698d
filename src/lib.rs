// SPDX-License-Identifier: MIT
//! lingod — language-intelligence broker.
//!
//! Routes editor semantic queries (go-to, type/doc lookup, fix-its,
//! refactors) to per-language analysis engines, supervises each engine's
//! lifecycle, and normalizes every answer into one canonical wire model.

pub mod backend;
pub mod completers;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fixit;
pub mod location;
pub mod normalize;
pub mod registry;
pub mod request;
pub mod response;
pub mod subserver;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::info;

use backend::{Backend, PipeBackend};
use completers::{CompleterCapabilities, SnippetCompleter, SubserverCompleter};
use config::BrokerConfig;
use registry::CompleterRegistry;
use subserver::{BackendFactory, Subserver, SubserverConfig};

pub use error::BrokerError;
pub use request::Request;
pub use response::CanonicalResponse;

/// Shared broker state passed to the serving loop and background tasks.
pub struct BrokerContext {
    pub config: BrokerConfig,
    pub registry: CompleterRegistry,
    pub started_at: DateTime<Utc>,
}

impl BrokerContext {
    /// Build the registry from configuration and wrap it up as shared state.
    pub fn initialize(config: BrokerConfig) -> Arc<Self> {
        let registry = build_registry(&config);
        info!(completers = config.completers.len(), "completer registry built");
        Arc::new(Self {
            config,
            registry,
            started_at: Utc::now(),
        })
    }

    /// Daemon teardown: drain every subserver.
    pub async fn shutdown(&self) {
        self.registry.shutdown_all().await;
    }
}

/// Wire the configured completer table into a registry: one pipe-backed
/// subserver completer per profile, the snippet provider as the wildcard.
pub fn build_registry(config: &BrokerConfig) -> CompleterRegistry {
    let mut builder = CompleterRegistry::builder();
    for (name, profile) in &config.completers {
        let command = profile.command.clone();
        let args = profile.args.clone();
        let call_timeout = profile.command_timeout();
        let factory: BackendFactory = Arc::new(move || {
            Arc::new(PipeBackend::new(
                command.clone(),
                args.clone(),
                call_timeout,
            )) as Arc<dyn Backend>
        });
        let subserver = Subserver::new(
            name.clone(),
            factory,
            SubserverConfig {
                start_timeout: profile.start_timeout(),
                probe_interval: Duration::from_millis(50),
            },
        );
        let capabilities = match profile.command_set(name) {
            Some(commands) => CompleterCapabilities {
                commands: commands.into_iter().collect(),
                reports_initializing: true,
                two_phase_fixit: true,
            },
            None => CompleterCapabilities::full(),
        };
        let filetypes: Vec<&str> = profile.filetypes.iter().map(String::as_str).collect();
        builder = builder.register(
            SubserverCompleter::new(name.clone(), capabilities, subserver, call_timeout),
            &filetypes,
        );
    }
    builder
        .register_wildcard(SnippetCompleter::new(config.snippet_dirs.clone()))
        .build()
}
