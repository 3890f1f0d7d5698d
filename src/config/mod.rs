// SPDX-License-Identifier: MIT
//! Broker configuration.
//!
//! Priority (highest to lowest): CLI / env var, then `{data_dir}/config.toml`,
//! then built-in defaults. The built-in completer table mirrors the stock
//! deployment: a C-family engine, a Rust analyzer, a JavaScript analyzer,
//! and the snippet provider as the wildcard fallback.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, warn};

use crate::request::CommandName;

const DEFAULT_LOG: &str = "info";
const DEFAULT_LOG_FORMAT: &str = "pretty";
const DEFAULT_START_TIMEOUT_SECS: u64 = 30;
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 10;

// ─── CompleterProfile ─────────────────────────────────────────────────────────

/// One completer's configuration (`[completer.<name>]` in config.toml).
#[derive(Debug, Clone, Deserialize)]
pub struct CompleterProfile {
    /// File types routed to this completer.
    pub filetypes: Vec<String>,
    /// Adapter binary forwarded to via JSON lines on stdio.
    pub command: String,
    /// Arguments passed to the adapter binary.
    #[serde(default)]
    pub args: Vec<String>,
    /// Overall readiness deadline in seconds (default: 30).
    #[serde(default = "default_start_timeout")]
    pub start_timeout_secs: u64,
    /// Per-command forward timeout in seconds (default: 10).
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    /// Supported command names. Omit for the full command set.
    #[serde(default)]
    pub commands: Option<Vec<String>>,
}

fn default_start_timeout() -> u64 {
    DEFAULT_START_TIMEOUT_SECS
}

fn default_command_timeout() -> u64 {
    DEFAULT_COMMAND_TIMEOUT_SECS
}

impl CompleterProfile {
    pub fn start_timeout(&self) -> Duration {
        Duration::from_secs(self.start_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Parse the configured command list; unknown names are skipped with a
    /// warning. `None` means the full command set.
    pub fn command_set(&self, completer: &str) -> Option<Vec<CommandName>> {
        let names = self.commands.as_ref()?;
        let mut parsed = Vec::with_capacity(names.len());
        for name in names {
            match CommandName::parse(name) {
                Some(cmd) => parsed.push(cmd),
                None => warn!(completer, command = %name, "unknown command in config, skipping"),
            }
        }
        Some(parsed)
    }
}

// ─── TOML config file ─────────────────────────────────────────────────────────

/// `{data_dir}/config.toml` — all fields are optional overrides.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// Log level filter string, e.g. "debug", "info,lingod=trace" (default: "info").
    log: Option<String>,
    /// Log output format: "pretty" (default) | "json".
    log_format: Option<String>,
    /// Directories scanned for `<filetype>.snippets` files.
    snippet_dirs: Option<Vec<PathBuf>>,
    /// Completer table (`[completer.clangd]` etc.). Replaces the built-in
    /// entry of the same name; built-ins without an override are kept.
    completer: Option<HashMap<String, CompleterProfile>>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

// ─── BrokerConfig ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub data_dir: PathBuf,
    /// Log level filter (LINGOD_LOG env var).
    pub log: String,
    /// Log output format: "pretty" | "json" (LINGOD_LOG_FORMAT env var).
    pub log_format: String,
    /// Directories scanned for snippet definition files.
    pub snippet_dirs: Vec<PathBuf>,
    /// Completer table, keyed by completer name.
    pub completers: HashMap<String, CompleterProfile>,
}

impl BrokerConfig {
    /// Build config from CLI/env args + optional TOML file.
    pub fn new(data_dir: Option<PathBuf>, log: Option<String>) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        let toml = load_toml(&data_dir).unwrap_or_default();

        let log = log.or(toml.log).unwrap_or_else(|| DEFAULT_LOG.to_string());

        let log_format = std::env::var("LINGOD_LOG_FORMAT")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.log_format)
            .unwrap_or_else(|| DEFAULT_LOG_FORMAT.to_string());

        let snippet_dirs = toml
            .snippet_dirs
            .unwrap_or_else(|| vec![data_dir.join("snippets")]);

        let mut completers = builtin_completers();
        for (name, profile) in toml.completer.unwrap_or_default() {
            completers.insert(name, profile);
        }

        Self {
            data_dir,
            log,
            log_format,
            snippet_dirs,
            completers,
        }
    }
}

/// The stock completer table.
fn builtin_completers() -> HashMap<String, CompleterProfile> {
    let mut table = HashMap::new();
    table.insert(
        "clangd".to_string(),
        CompleterProfile {
            filetypes: ["c", "cpp", "objc", "objcpp", "cuda"]
                .map(String::from)
                .to_vec(),
            command: "lingod-clangd-adapter".to_string(),
            args: vec![],
            start_timeout_secs: DEFAULT_START_TIMEOUT_SECS,
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            // Full command set, GoToInclude included.
            commands: None,
        },
    );
    table.insert(
        "rust-analyzer".to_string(),
        CompleterProfile {
            filetypes: vec!["rust".to_string()],
            command: "lingod-ra-adapter".to_string(),
            args: vec![],
            start_timeout_secs: 120,
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            commands: Some(
                [
                    "GetType",
                    "GetDoc",
                    "GoTo",
                    "GoToDeclaration",
                    "GoToDefinition",
                    "GoToReferences",
                    "GoToSymbol",
                    "FixIt",
                    "ResolveFixIt",
                    "Format",
                    "RefactorRename",
                    "ExecuteCommand",
                    "RestartServer",
                ]
                .map(String::from)
                .to_vec(),
            ),
        },
    );
    table.insert(
        "tsserver".to_string(),
        CompleterProfile {
            filetypes: ["javascript", "typescript", "javascriptreact", "typescriptreact"]
                .map(String::from)
                .to_vec(),
            command: "lingod-tsserver-adapter".to_string(),
            args: vec![],
            start_timeout_secs: DEFAULT_START_TIMEOUT_SECS,
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            commands: Some(
                [
                    "GetType",
                    "GetDoc",
                    "GoTo",
                    "GoToDefinition",
                    "GoToReferences",
                    "GoToSymbol",
                    "FixIt",
                    "ResolveFixIt",
                    "Format",
                    "RefactorRename",
                    "RestartServer",
                ]
                .map(String::from)
                .to_vec(),
            ),
        },
    );
    table
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("lingod");
        }
    }
    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("lingod");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("lingod");
        }
    }
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("lingod");
        }
    }
    PathBuf::from(".lingod")
}

// ─── Tests ────────────────────────────────────────────────────────────────────
