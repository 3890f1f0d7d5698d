// SPDX-License-Identifier: MIT
//! Incoming request model and the command surface.
//!
//! The editor-facing transport (out of scope here) delivers requests in this
//! shape; field names match what clients already send
//! (`completer_target`, `command_arguments`, `line_num`, `column_num`).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::location::{Location, Range};
use crate::response::FixIt;

// ─── CommandName ──────────────────────────────────────────────────────────────

/// Closed set of commands the broker forwards to completers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandName {
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
}

impl CommandName {
    /// Parse a wire command name. Unknown names are a caller mistake and map
    /// to `UnsupportedCommand` at the dispatch layer, not a crash.
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "GetType" => Self::GetType,
            "GetTypeImprecise" => Self::GetTypeImprecise,
            "GetDoc" => Self::GetDoc,
            "GetDocImprecise" => Self::GetDocImprecise,
            "GoTo" => Self::GoTo,
            "GoToImprecise" => Self::GoToImprecise,
            "GoToDeclaration" => Self::GoToDeclaration,
            "GoToDefinition" => Self::GoToDefinition,
            "GoToInclude" => Self::GoToInclude,
            "GoToReferences" => Self::GoToReferences,
            "GoToSymbol" => Self::GoToSymbol,
            "FixIt" => Self::FixIt,
            "ResolveFixIt" => Self::ResolveFixIt,
            "Format" => Self::Format,
            "RefactorRename" => Self::RefactorRename,
            "ExecuteCommand" => Self::ExecuteCommand,
            "RestartServer" => Self::RestartServer,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetType => "GetType",
            Self::GetTypeImprecise => "GetTypeImprecise",
            Self::GetDoc => "GetDoc",
            Self::GetDocImprecise => "GetDocImprecise",
            Self::GoTo => "GoTo",
            Self::GoToImprecise => "GoToImprecise",
            Self::GoToDeclaration => "GoToDeclaration",
            Self::GoToDefinition => "GoToDefinition",
            Self::GoToInclude => "GoToInclude",
            Self::GoToReferences => "GoToReferences",
            Self::GoToSymbol => "GoToSymbol",
            Self::FixIt => "FixIt",
            Self::ResolveFixIt => "ResolveFixIt",
            Self::Format => "Format",
            Self::RefactorRename => "RefactorRename",
            Self::ExecuteCommand => "ExecuteCommand",
            Self::RestartServer => "RestartServer",
        }
    }

    /// Commands answered with locations (single or list).
    pub fn is_goto(&self) -> bool {
        matches!(
            self,
            Self::GoTo
                | Self::GoToImprecise
                | Self::GoToDeclaration
                | Self::GoToDefinition
                | Self::GoToInclude
                | Self::GoToReferences
                | Self::GoToSymbol
        )
    }

    /// Commands answered with a fix-it set.
    pub fn is_fixit(&self) -> bool {
        matches!(
            self,
            Self::FixIt | Self::ResolveFixIt | Self::Format | Self::RefactorRename
        )
    }
}

impl std::fmt::Display for CommandName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── CompleterTarget ──────────────────────────────────────────────────────────

/// Which completer the caller wants: the file type's default, or a named one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CompleterTarget {
    #[default]
    FiletypeDefault,
    Named(String),
}

impl CompleterTarget {
    /// Wire value: `"filetype_default"` (or absent) means default resolution.
    pub fn from_wire(value: Option<&str>) -> Self {
        match value {
            None | Some("filetype_default") | Some("") => Self::FiletypeDefault,
            Some(name) => Self::Named(name.to_string()),
        }
    }
}

// ─── Request ──────────────────────────────────────────────────────────────────

/// One semantic request against a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// File type key, e.g. `"cpp"`, `"rust"`, `"javascript"`.
    pub filetype: String,
    /// Wire name of the target completer (`"filetype_default"` = resolve by
    /// file type).
    #[serde(default)]
    pub completer_target: Option<String>,
    /// Command name plus trailing arguments, in wire order
    /// (e.g. `["RefactorRename", "Bar"]`).
    pub command_arguments: Vec<String>,
    /// Absolute path to the file the request is about.
    pub filepath: PathBuf,
    /// Cursor line (1-based), for point requests.
    #[serde(default)]
    pub line_num: Option<u32>,
    /// Cursor column (1-based), for point requests.
    #[serde(default)]
    pub column_num: Option<u32>,
    /// Selection, for range-qualified requests (e.g. ranged FixIt).
    #[serde(default)]
    pub range: Option<Range>,
    /// Full unsaved buffer contents, when the editor has dirty state.
    #[serde(default)]
    pub contents: Option<String>,
    /// A previously returned fix-it, for `ResolveFixIt`.
    #[serde(default)]
    pub fixit: Option<FixIt>,
}

impl Request {
    /// The command, parsed from the first command argument.
    pub fn command(&self) -> Option<CommandName> {
        self.command_arguments
            .first()
            .and_then(|n| CommandName::parse(n))
    }

    /// Arguments after the command name (symbol query, new name, ...).
    pub fn trailing_arguments(&self) -> &[String] {
        self.command_arguments.get(1..).unwrap_or(&[])
    }

    pub fn target(&self) -> CompleterTarget {
        CompleterTarget::from_wire(self.completer_target.as_deref())
    }

    /// Cursor position as a [`Location`], when both coordinates are present.
    pub fn cursor(&self) -> Option<Location> {
        match (self.line_num, self.column_num) {
            (Some(line), Some(col)) => Some(Location::new(self.filepath.clone(), line, col)),
            _ => None,
        }
    }
}

// ─── Lifecycle events ─────────────────────────────────────────────────────────

/// Notifications from the editor-facing layer that drive completer state but
/// are not semantic queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A buffer of this file type is ready for analysis. First occurrence
    /// lazily starts the file type's subserver.
    FileReadyToParse,
    /// The user visited a buffer. Candidate providers (e.g. the snippet
    /// completer) refresh their candidate sets on this.
    BufferVisit,
}

// ─── Tests ────────────────────────────────────────────────────────────────────
