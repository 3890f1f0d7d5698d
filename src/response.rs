// SPDX-License-Identifier: MIT
//! Canonical response model.
//!
//! Backends answer in wildly different shapes; the normalizer maps every one
//! of them into exactly one of these variants before anything leaves the
//! broker. Editors therefore parse a single wire format regardless of which
//! language backend served the request.

use serde::{Deserialize, Serialize};

use crate::error::BrokerError;
use crate::location::{Location, Range};

// ─── CanonicalResponse ────────────────────────────────────────────────────────

/// The one wire format every request resolves to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CanonicalResponse {
    /// A single jump target (go-to with one destination).
    Location(Location),
    /// Multiple targets, deduplicated and sorted by (file, line, column).
    LocationList(Vec<Location>),
    /// Free-form text: hover, type-at-cursor, command output.
    Text { message: String },
    /// Structured documentation.
    Doc(DocInfo),
    /// Candidate fixes at a location or over a selection.
    FixIts(FixItSet),
    /// A typed failure; see [`BrokerError`] for the kind taxonomy.
    Error { kind: String, message: String },
}

impl From<BrokerError> for CanonicalResponse {
    fn from(err: BrokerError) -> Self {
        CanonicalResponse::Error {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

// ─── DocInfo ──────────────────────────────────────────────────────────────────

/// Structured docstring, used when the backend reports more than plain text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocInfo {
    /// One-line summary (always present).
    pub summary: String,
    /// Declared type, when known (e.g. `"int"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ty: Option<String>,
    /// Constant value, when known (e.g. `"3"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// The declaration line, verbatim from the declaring file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declaration: Option<String>,
}

// ─── FixIts ───────────────────────────────────────────────────────────────────

/// Ordered set of candidate fixes. Order between fixes is backend-defined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixItSet {
    pub fixits: Vec<FixIt>,
}

/// Classification of a fix, mirroring the backends' own split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixItKind {
    Quickfix,
    Refactor,
}

/// A proposed, possibly multi-chunk source edit.
///
/// A fix-it with a [`ResolveToken`] has not had its edits computed yet — the
/// caller must send it back through `ResolveFixIt` to populate `chunks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixIt {
    pub kind: FixItKind,
    /// Human-readable description (e.g. "change 'int' to 'void'").
    pub text: String,
    /// Where the diagnostic or refactor anchor sits.
    pub location: Location,
    /// Concrete edits; empty when resolve-required or when no fix applies.
    pub chunks: Vec<Chunk>,
    /// Present iff the concrete edits require one more backend round trip.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolve_token: Option<ResolveToken>,
}

impl FixIt {
    /// A fix-it without a token is already fully specified.
    pub fn is_resolved(&self) -> bool {
        self.resolve_token.is_none()
    }
}

/// One contiguous replacement: empty text deletes the range, a zero-width
/// range inserts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub replacement_text: String,
    pub range: Range,
}

// ─── ResolveToken ─────────────────────────────────────────────────────────────

/// Opaque handle identifying a not-yet-computed fix-it.
///
/// The payload is a backend command descriptor; the broker never interprets
/// it, only hands it back on resolve. Ownership sits with the caller between
/// the two phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveToken(pub serde_json::Value);

// ─── Chunk invariants ─────────────────────────────────────────────────────────

/// Sort chunks by document position and reject overlapping edits.
///
/// Every fix-it leaving the broker satisfies this, whether it came from
/// phase 1 or from a resolve round trip.
pub fn normalize_chunks(mut chunks: Vec<Chunk>) -> Result<Vec<Chunk>, BrokerError> {
    chunks.sort_by(|a, b| {
        a.range
            .start
            .cmp(&b.range.start)
            .then(a.range.end.cmp(&b.range.end))
    });
    for pair in chunks.windows(2) {
        if pair[0].range.overlaps(&pair[1].range) {
            return Err(BrokerError::MalformedBackendResponse(format!(
                "overlapping fix-it chunks at {} and {}",
                pair[0].range.start, pair[1].range.start
            )));
        }
    }
    Ok(chunks)
}

// ─── Tests ────────────────────────────────────────────────────────────────────
