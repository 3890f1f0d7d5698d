// SPDX-License-Identifier: MIT
//! Response normalizer.
//!
//! Maps raw backend payloads into the canonical model, keyed by command
//! class. Shapes the normalizer does not recognize become
//! `MalformedBackendResponse` with enough context to diagnose; they are
//! never silently dropped.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::Value;

use crate::error::BrokerError;
use crate::location::Location;
use crate::request::CommandName;
use crate::response::{
    normalize_chunks, CanonicalResponse, Chunk, DocInfo, FixIt, FixItKind, FixItSet, ResolveToken,
};

/// Normalize one raw backend answer for the given command.
///
/// `FixIt` and `ResolveFixIt` payloads go through [`parse_fixit_set`]
/// directly, since the fix-it protocol applies its own filtering on top.
pub fn normalize(cmd: CommandName, raw: Value) -> Result<CanonicalResponse, BrokerError> {
    use CommandName::*;
    match cmd {
        GoTo | GoToImprecise | GoToDeclaration | GoToDefinition | GoToInclude => {
            normalize_goto(raw, BrokerError::CannotJumpToLocation)
        }
        GoToReferences | GoToSymbol => normalize_goto(raw, BrokerError::SymbolNotFound),
        GetType | GetTypeImprecise => normalize_text(raw),
        GetDoc | GetDocImprecise => normalize_doc(raw),
        FixIt | ResolveFixIt | Format | RefactorRename => {
            Ok(CanonicalResponse::FixIts(parse_fixit_set(raw)?))
        }
        ExecuteCommand => normalize_execute(raw),
        // Lifecycle command, answered by the dispatcher before forwarding.
        RestartServer => Ok(CanonicalResponse::Text {
            message: String::new(),
        }),
    }
}

// ─── GoTo class ───────────────────────────────────────────────────────────────

/// Single answer → `Location`; lists are deduplicated by (file, line,
/// column), sorted by file path then document position, and a one-element
/// list collapses to `Location`. Nothing → the command class's not-found
/// error.
fn normalize_goto(raw: Value, not_found: BrokerError) -> Result<CanonicalResponse, BrokerError> {
    match raw {
        Value::Null => Err(not_found),
        Value::Array(items) => {
            let mut locations: BTreeSet<Location> = BTreeSet::new();
            for item in items {
                locations.insert(parse_location(item)?);
            }
            let mut locations: Vec<Location> = locations.into_iter().collect();
            if locations.is_empty() {
                return Err(not_found);
            }
            if locations.len() == 1 {
                return Ok(CanonicalResponse::Location(locations.remove(0)));
            }
            Ok(CanonicalResponse::LocationList(locations))
        }
        obj @ Value::Object(_) => Ok(CanonicalResponse::Location(parse_location(obj)?)),
        other => Err(malformed("goto answer", &other)),
    }
}

fn parse_location(value: Value) -> Result<Location, BrokerError> {
    let location: Location =
        serde_json::from_value(value).map_err(|e| BrokerError::MalformedBackendResponse(
            format!("location: {e}"),
        ))?;
    if !location.is_valid() {
        return Err(BrokerError::MalformedBackendResponse(format!(
            "location with zero coordinate: {location}"
        )));
    }
    Ok(location)
}

// ─── Text / doc class ─────────────────────────────────────────────────────────

fn normalize_text(raw: Value) -> Result<CanonicalResponse, BrokerError> {
    match raw {
        Value::Null => Err(BrokerError::NoDocumentationAvailable),
        Value::String(message) => Ok(CanonicalResponse::Text { message }),
        Value::Object(ref map) => match map.get("message").and_then(Value::as_str) {
            Some(message) => Ok(CanonicalResponse::Text {
                message: message.to_string(),
            }),
            None => Err(malformed("text answer", &raw)),
        },
        other => Err(malformed("text answer", &other)),
    }
}

fn normalize_doc(raw: Value) -> Result<CanonicalResponse, BrokerError> {
    match raw {
        Value::Null => Err(BrokerError::NoDocumentationAvailable),
        Value::String(message) => {
            if message.is_empty() {
                Err(BrokerError::NoDocumentationAvailable)
            } else {
                Ok(CanonicalResponse::Text { message })
            }
        }
        obj @ Value::Object(_) => {
            let doc: DocInfo = serde_json::from_value(obj).map_err(|e| {
                BrokerError::MalformedBackendResponse(format!("doc answer: {e}"))
            })?;
            Ok(CanonicalResponse::Doc(doc))
        }
        other => Err(malformed("doc answer", &other)),
    }
}

// ─── ExecuteCommand ───────────────────────────────────────────────────────────

/// Command output is plain text; a null answer is an empty success.
fn normalize_execute(raw: Value) -> Result<CanonicalResponse, BrokerError> {
    match raw {
        Value::Null => Ok(CanonicalResponse::Text {
            message: String::new(),
        }),
        Value::String(message) => Ok(CanonicalResponse::Text { message }),
        other => Err(malformed("command output", &other)),
    }
}

// ─── Fix-it payloads ──────────────────────────────────────────────────────────

/// A fix-it as backends report it. `resolve: true` entries carry the opaque
/// command descriptor and no chunks; the descriptor becomes the token.
#[derive(Debug, Deserialize)]
struct WireFixIt {
    #[serde(default)]
    kind: Option<FixItKind>,
    #[serde(default)]
    text: String,
    location: Location,
    #[serde(default)]
    chunks: Vec<Chunk>,
    #[serde(default)]
    resolve: bool,
    #[serde(default)]
    command: Option<Value>,
}

/// Parse a backend fix-it payload: either `{"fixits": [...]}` or a bare
/// array. Chunks come out position-sorted and overlap-checked.
pub fn parse_fixit_set(raw: Value) -> Result<FixItSet, BrokerError> {
    let entries = match raw {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("fixits") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => return Err(malformed("fixits field", &other)),
        },
        other => return Err(malformed("fixit answer", &other)),
    };

    let mut fixits = Vec::with_capacity(entries.len());
    for entry in entries {
        let wire: WireFixIt = serde_json::from_value(entry)
            .map_err(|e| BrokerError::MalformedBackendResponse(format!("fixit entry: {e}")))?;
        let resolve_token = if wire.resolve {
            match wire.command {
                Some(command) => Some(ResolveToken(command)),
                None => {
                    return Err(BrokerError::MalformedBackendResponse(
                        "resolve-required fixit without a command descriptor".into(),
                    ))
                }
            }
        } else {
            None
        };
        fixits.push(FixIt {
            kind: wire.kind.unwrap_or(FixItKind::Quickfix),
            text: wire.text,
            location: wire.location,
            chunks: normalize_chunks(wire.chunks)?,
            resolve_token,
        });
    }
    Ok(FixItSet { fixits })
}

fn malformed(what: &str, value: &Value) -> BrokerError {
    BrokerError::MalformedBackendResponse(format!("unexpected {what} shape: {value}"))
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn loc_json(file: &str, line: u32, col: u32) -> Value {
        json!({"filepath": file, "line_num": line, "column_num": col})
    }

    #[test]
    fn goto_single_object_becomes_location() {
        let resp = normalize(CommandName::GoTo, loc_json("/tmp/goto.cc", 4, 6)).unwrap();
        assert_eq!(
            resp,
            CanonicalResponse::Location(Location::new("/tmp/goto.cc", 4, 6))
        );
    }

    #[test]
    fn goto_null_cannot_jump() {
        let err = normalize(CommandName::GoTo, Value::Null).unwrap_err();
        assert_eq!(err, BrokerError::CannotJumpToLocation);
    }

    #[test]
    fn references_empty_list_is_symbol_not_found() {
        let err = normalize(CommandName::GoToReferences, json!([])).unwrap_err();
        assert_eq!(err, BrokerError::SymbolNotFound);
    }

    #[test]
    fn reference_lists_are_deduplicated_and_sorted() {
        let resp = normalize(
            CommandName::GoToReferences,
            json!([
                loc_json("/tmp/b.cc", 1, 5),
                loc_json("/tmp/a.cc", 9, 2),
                loc_json("/tmp/b.cc", 1, 5),
                loc_json("/tmp/a.cc", 2, 8),
            ]),
        )
        .unwrap();
        assert_eq!(
            resp,
            CanonicalResponse::LocationList(vec![
                Location::new("/tmp/a.cc", 2, 8),
                Location::new("/tmp/a.cc", 9, 2),
                Location::new("/tmp/b.cc", 1, 5),
            ])
        );
    }

    #[test]
    fn single_element_list_collapses_to_location() {
        let resp = normalize(CommandName::GoToSymbol, json!([loc_json("/tmp/a.cc", 2, 8)]))
            .unwrap();
        assert_eq!(
            resp,
            CanonicalResponse::Location(Location::new("/tmp/a.cc", 2, 8))
        );
    }

    #[test]
    fn zero_based_location_is_malformed() {
        let err = normalize(CommandName::GoTo, loc_json("/tmp/a.cc", 0, 3)).unwrap_err();
        assert_eq!(err.kind(), "MalformedBackendResponse");
    }

    #[test]
    fn get_type_string_and_message_object() {
        let resp = normalize(CommandName::GetType, json!("int")).unwrap();
        assert_eq!(resp, CanonicalResponse::Text { message: "int".into() });
        let resp = normalize(CommandName::GetType, json!({"message": "void ()"})).unwrap();
        assert_eq!(resp, CanonicalResponse::Text { message: "void ()".into() });
    }

    #[test]
    fn get_doc_structured_answer() {
        let resp = normalize(
            CommandName::GetDoc,
            json!({"summary": "A docstring.", "ty": "int", "value": "3"}),
        )
        .unwrap();
        match resp {
            CanonicalResponse::Doc(doc) => {
                assert_eq!(doc.summary, "A docstring.");
                assert_eq!(doc.ty.as_deref(), Some("int"));
                assert_eq!(doc.value.as_deref(), Some("3"));
                assert!(doc.declaration.is_none());
            }
            other => panic!("expected doc, got {other:?}"),
        }
    }

    #[test]
    fn get_doc_null_has_nothing_to_show() {
        let err = normalize(CommandName::GetDoc, Value::Null).unwrap_err();
        assert_eq!(err, BrokerError::NoDocumentationAvailable);
        let err = normalize(CommandName::GetDoc, json!("")).unwrap_err();
        assert_eq!(err, BrokerError::NoDocumentationAvailable);
    }

    #[test]
    fn execute_command_null_is_empty_text() {
        let resp = normalize(CommandName::ExecuteCommand, Value::Null).unwrap();
        assert_eq!(resp, CanonicalResponse::Text { message: String::new() });
        let resp = normalize(CommandName::ExecuteCommand, json!("reindexed")).unwrap();
        assert_eq!(resp, CanonicalResponse::Text { message: "reindexed".into() });
        let err = normalize(CommandName::ExecuteCommand, json!(42)).unwrap_err();
        assert_eq!(err.kind(), "MalformedBackendResponse");
    }

    #[test]
    fn fixit_payload_with_resolve_entry() {
        let set = parse_fixit_set(json!({"fixits": [
            {
                "kind": "quickfix",
                "text": "change 'int' to 'void'",
                "location": loc_json("/tmp/fixit.cpp", 3, 12),
                "chunks": [
                    {"replacement_text": "void",
                     "range": {"start": loc_json("/tmp/fixit.cpp", 3, 10),
                               "end": loc_json("/tmp/fixit.cpp", 3, 13)}}
                ]
            },
            {
                "kind": "refactor",
                "text": "Expand macro",
                "location": loc_json("/tmp/fixit.cpp", 7, 1),
                "resolve": true,
                "command": {"tweakID": "ExpandMacro"}
            }
        ]}))
        .unwrap();
        assert_eq!(set.fixits.len(), 2);
        assert!(set.fixits[0].is_resolved());
        assert_eq!(set.fixits[0].chunks.len(), 1);
        assert!(!set.fixits[1].is_resolved());
        assert!(set.fixits[1].chunks.is_empty());
        assert_eq!(set.fixits[1].kind, FixItKind::Refactor);
    }

    #[test]
    fn resolve_entry_without_command_is_malformed() {
        let err = parse_fixit_set(json!([{
            "text": "Broken",
            "location": loc_json("/tmp/fixit.cpp", 7, 1),
            "resolve": true
        }]))
        .unwrap_err();
        assert_eq!(err.kind(), "MalformedBackendResponse");
    }

    #[test]
    fn overlapping_fixit_chunks_are_surfaced() {
        let err = parse_fixit_set(json!([{
            "text": "bad edit",
            "location": loc_json("/tmp/fixit.cpp", 4, 1),
            "chunks": [
                {"replacement_text": "a",
                 "range": {"start": loc_json("/tmp/fixit.cpp", 4, 1),
                           "end": loc_json("/tmp/fixit.cpp", 4, 6)}},
                {"replacement_text": "b",
                 "range": {"start": loc_json("/tmp/fixit.cpp", 4, 4),
                           "end": loc_json("/tmp/fixit.cpp", 4, 9)}}
            ]
        }]))
        .unwrap_err();
        assert_eq!(err.kind(), "MalformedBackendResponse");
    }

    #[test]
    fn null_fixit_answer_is_an_empty_set() {
        assert!(parse_fixit_set(Value::Null).unwrap().fixits.is_empty());
        assert!(parse_fixit_set(json!({"fixits": null})).unwrap().fixits.is_empty());
    }
}
