// SPDX-License-Identifier: MIT
//! Canonical source locations and ranges.
//!
//! Every cross-backend response is expressed in these types. Lines and
//! columns are 1-based; columns count code units in the backend's encoding.
//! The wire names (`line_num`, `column_num`) match what editor clients
//! already parse.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::PathBuf;

// ─── Location ─────────────────────────────────────────────────────────────────

/// An absolute position in a file: (path, 1-based line, 1-based column).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Absolute path to the file.
    pub filepath: PathBuf,
    /// 1-based line number.
    pub line_num: u32,
    /// 1-based column number (code units, backend encoding).
    pub column_num: u32,
}

impl Location {
    pub fn new(filepath: impl Into<PathBuf>, line_num: u32, column_num: u32) -> Self {
        Self {
            filepath: filepath.into(),
            line_num,
            column_num,
        }
    }

    /// A location is well-formed when both coordinates are at least 1.
    pub fn is_valid(&self) -> bool {
        self.line_num >= 1 && self.column_num >= 1
    }
}

// Total order by (filepath, line, column) — the sort key for location lists.
impl Ord for Location {
    fn cmp(&self, other: &Self) -> Ordering {
        self.filepath
            .cmp(&other.filepath)
            .then(self.line_num.cmp(&other.line_num))
            .then(self.column_num.cmp(&other.column_num))
    }
}

impl PartialOrd for Location {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.filepath.display(),
            self.line_num,
            self.column_num
        )
    }
}

// ─── Range ────────────────────────────────────────────────────────────────────

/// An ordered pair of locations. `start == end` is a zero-width insertion
/// point, which backends legitimately report for pure insertions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Location,
    pub end: Location,
}

impl Range {
    pub fn new(start: Location, end: Location) -> Self {
        Self { start, end }
    }

    /// Zero-width insertion point at a single location.
    pub fn point(loc: Location) -> Self {
        Self {
            start: loc.clone(),
            end: loc,
        }
    }

    /// Well-formed when both ends are valid, in the same file, and start ≤ end.
    pub fn is_valid(&self) -> bool {
        self.start.is_valid()
            && self.end.is_valid()
            && self.start.filepath == self.end.filepath
            && self.start <= self.end
    }

    /// True when `other` begins before this range ends (same file assumed).
    /// Touching ranges (end == start of next) do not overlap.
    pub fn overlaps(&self, other: &Range) -> bool {
        let (first, second) = if self.start <= other.start {
            (self, other)
        } else {
            (other, self)
        };
        // A zero-width range at exactly the boundary does not overlap.
        second.start < first.end
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
