// SPDX-License-Identifier: MIT
//! Two-phase fix-it protocol.
//!
//! Phase 1 (`FixIt`) returns candidate fixes; entries the backend has not
//! computed yet carry a resolve token instead of chunks. Phase 2
//! (`ResolveFixIt`) trades the token for concrete chunks. Between the two
//! phases the caller owns the token; the broker never looks inside it.
//!
//! The filtering and merging here sit on top of the normalizer's parsing;
//! the backend round trips themselves live in the completer.

use serde_json::Value;

use crate::error::BrokerError;
use crate::location::{Location, Range};
use crate::normalize;
use crate::response::{FixIt, FixItKind, FixItSet};

/// Point-request filtering: when several diagnostics share a line, keep only
/// the fixes anchored exactly at the cursor. A cursor matching no anchor
/// keeps the whole set, so imprecise cursor placement still shows options.
pub fn filter_at_cursor(set: FixItSet, cursor: &Location) -> FixItSet {
    if set.fixits.iter().any(|f| f.location == *cursor) {
        FixItSet {
            fixits: set
                .fixits
                .into_iter()
                .filter(|f| f.location == *cursor)
                .collect(),
        }
    } else {
        set
    }
}

/// The answer for a ranged request with nothing applicable: one fix-it with
/// no chunks, not an error.
pub fn empty_ranged_set(range: &Range) -> FixItSet {
    FixItSet {
        fixits: vec![FixIt {
            kind: FixItKind::Quickfix,
            text: String::new(),
            location: range.start.clone(),
            chunks: Vec::new(),
            resolve_token: None,
        }],
    }
}

/// Fold a resolve round trip's answer back into the original fix-it.
///
/// The backend answers with the resolved entry (same shapes phase 1 uses);
/// its chunks replace the original's and the token is discarded. Resolved
/// chunks go through the same ordering and overlap checks as any others.
pub fn merge_resolved(original: FixIt, raw: Value) -> Result<FixIt, BrokerError> {
    let mut set = normalize::parse_fixit_set(raw)?;
    if set.fixits.len() != 1 {
        return Err(BrokerError::MalformedBackendResponse(format!(
            "resolve answered with {} fixits, expected 1",
            set.fixits.len()
        )));
    }
    let resolved = set.fixits.remove(0);
    if !resolved.is_resolved() {
        return Err(BrokerError::MalformedBackendResponse(
            "resolve answered with another unresolved fixit".into(),
        ));
    }
    Ok(FixIt {
        kind: original.kind,
        text: if resolved.text.is_empty() {
            original.text
        } else {
            resolved.text
        },
        location: original.location,
        chunks: resolved.chunks,
        resolve_token: None,
    })
}

// ─── Tests ────────────────────────────────────────────────────────────────────
