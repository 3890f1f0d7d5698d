// SPDX-License-Identifier: MIT
//! End-to-end dispatch pipeline tests over a scripted backend.

mod common;

use common::{point_request, semantic_registry, wait_for_state, ScriptedBackend};
use lingod::completers::SnippetCompleter;
use lingod::dispatch::{dispatch, notify};
use lingod::location::Location;
use lingod::registry::CompleterRegistry;
use lingod::request::LifecycleEvent;
use lingod::response::CanonicalResponse;
use lingod::subserver::ServerState;
use serde_json::json;

async fn ready_registry(backend: &std::sync::Arc<ScriptedBackend>) -> CompleterRegistry {
    let registry = semantic_registry(backend.clone());
    notify(
        &registry,
        &point_request(&["GetType"], 1, 1),
        LifecycleEvent::FileReadyToParse,
    )
    .await;
    wait_for_state(&registry, "clangd", ServerState::Ready).await;
    registry
}

#[tokio::test]
async fn get_type_round_trips_through_the_pipeline() {
    let backend = ScriptedBackend::ready();
    let registry = ready_registry(&backend).await;

    backend.script("GetType", Ok(json!("int"))).await;
    let resp = dispatch(&registry, &point_request(&["GetType"], 12, 4)).await;
    assert_eq!(resp, CanonicalResponse::Text { message: "int".into() });

    // The cursor travels on the wire.
    let calls = backend.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "GetType");
    assert_eq!(calls[0].1["line_num"], 12);
    assert_eq!(calls[0].1["column_num"], 4);
    assert_eq!(calls[0].1["filepath"], "/tmp/test.cpp");
}

#[tokio::test]
async fn requests_before_readiness_fail_fast() {
    let backend = ScriptedBackend::ready();
    backend.set_ready(false);
    let registry = semantic_registry(backend.clone());
    notify(
        &registry,
        &point_request(&["GetType"], 1, 1),
        LifecycleEvent::FileReadyToParse,
    )
    .await;

    let resp = dispatch(&registry, &point_request(&["GetType"], 1, 1)).await;
    assert_eq!(
        resp,
        CanonicalResponse::Error {
            kind: "ServerInitializing".into(),
            message: "Server is initializing. Please wait.".into(),
        }
    );
    // Nothing was forwarded.
    assert!(backend.calls().await.is_empty());
}

#[tokio::test]
async fn ordinary_commands_do_not_start_the_engine() {
    let backend = ScriptedBackend::ready();
    let registry = semantic_registry(backend.clone());

    let resp = dispatch(&registry, &point_request(&["GetType"], 1, 1)).await;
    assert!(matches!(resp, CanonicalResponse::Error { ref kind, .. } if kind == "ServerInitializing"));
    assert_eq!(backend.starts(), 0);
}

#[tokio::test]
async fn unknown_filetype_without_wildcard_is_no_such_completer() {
    let backend = ScriptedBackend::ready();
    let registry = semantic_registry(backend);
    let mut req = point_request(&["GetType"], 1, 1);
    req.filetype = "haskell".into();

    let resp = dispatch(&registry, &req).await;
    assert_eq!(
        resp,
        CanonicalResponse::Error {
            kind: "NoSuchCompleter".into(),
            message: "No completer registered for 'haskell'".into(),
        }
    );
}

#[tokio::test]
async fn unknown_command_name_is_unsupported() {
    let backend = ScriptedBackend::ready();
    let registry = ready_registry(&backend).await;

    let resp = dispatch(&registry, &point_request(&["GoToImplementation"], 1, 1)).await;
    assert_eq!(
        resp,
        CanonicalResponse::Error {
            kind: "UnsupportedCommand".into(),
            message: "Supported commands do not include 'GoToImplementation'".into(),
        }
    );
}

#[tokio::test]
async fn goto_single_destination() {
    let backend = ScriptedBackend::ready();
    let registry = ready_registry(&backend).await;

    backend
        .script(
            "GoTo",
            Ok(json!({"filepath": "/tmp/test.h", "line_num": 4, "column_num": 6})),
        )
        .await;
    let resp = dispatch(&registry, &point_request(&["GoTo"], 9, 2)).await;
    assert_eq!(
        resp,
        CanonicalResponse::Location(Location::new("/tmp/test.h", 4, 6))
    );
}

#[tokio::test]
async fn goto_nowhere_cannot_jump() {
    let backend = ScriptedBackend::ready();
    let registry = ready_registry(&backend).await;

    backend.script("GoTo", Ok(json!(null))).await;
    let resp = dispatch(&registry, &point_request(&["GoTo"], 9, 2)).await;
    assert_eq!(
        resp,
        CanonicalResponse::Error {
            kind: "CannotJumpToLocation".into(),
            message: "Cannot jump to location".into(),
        }
    );
}

#[tokio::test]
async fn goto_symbol_list_is_sorted_and_deduplicated() {
    let backend = ScriptedBackend::ready();
    let registry = ready_registry(&backend).await;

    backend
        .script(
            "GoToSymbol",
            Ok(json!([
                {"filepath": "/tmp/test.cpp", "line_num": 21, "column_num": 3},
                {"filepath": "/tmp/test.cpp", "line_num": 4, "column_num": 9},
                {"filepath": "/tmp/test.cpp", "line_num": 21, "column_num": 3},
            ])),
        )
        .await;
    let resp = dispatch(
        &registry,
        &point_request(&["GoToSymbol", "line"], 1, 1),
    )
    .await;
    assert_eq!(
        resp,
        CanonicalResponse::LocationList(vec![
            Location::new("/tmp/test.cpp", 4, 9),
            Location::new("/tmp/test.cpp", 21, 3),
        ])
    );

    // The symbol query rides in the arguments.
    let calls = backend.calls().await;
    assert_eq!(calls[0].1["arguments"], json!(["line"]));
}

#[tokio::test]
async fn goto_references_empty_is_symbol_not_found() {
    let backend = ScriptedBackend::ready();
    let registry = ready_registry(&backend).await;

    backend.script("GoToReferences", Ok(json!([]))).await;
    let resp = dispatch(&registry, &point_request(&["GoToReferences"], 1, 1)).await;
    assert_eq!(
        resp,
        CanonicalResponse::Error {
            kind: "SymbolNotFound".into(),
            message: "Symbol not found".into(),
        }
    );
}

#[tokio::test]
async fn get_doc_with_nothing_to_show() {
    let backend = ScriptedBackend::ready();
    let registry = ready_registry(&backend).await;

    backend.script("GetDoc", Ok(json!(null))).await;
    let resp = dispatch(&registry, &point_request(&["GetDoc"], 1, 1)).await;
    assert_eq!(
        resp,
        CanonicalResponse::Error {
            kind: "NoDocumentationAvailable".into(),
            message: "No documentation available.".into(),
        }
    );
}

#[tokio::test]
async fn execute_command_with_no_output_is_empty_text() {
    let backend = ScriptedBackend::ready();
    let registry = ready_registry(&backend).await;

    backend.script("ExecuteCommand", Ok(json!(null))).await;
    let resp = dispatch(
        &registry,
        &point_request(&["ExecuteCommand", "clangd.applyFix"], 1, 1),
    )
    .await;
    assert_eq!(resp, CanonicalResponse::Text { message: String::new() });
}

#[tokio::test]
async fn malformed_backend_answers_are_surfaced() {
    let backend = ScriptedBackend::ready();
    let registry = ready_registry(&backend).await;

    backend.script("GoTo", Ok(json!(17))).await;
    let resp = dispatch(&registry, &point_request(&["GoTo"], 1, 1)).await;
    assert!(
        matches!(resp, CanonicalResponse::Error { ref kind, .. } if kind == "MalformedBackendResponse")
    );
}

#[tokio::test]
async fn wildcard_fallback_answers_for_unclaimed_filetypes() {
    let registry = CompleterRegistry::builder()
        .register_wildcard(SnippetCompleter::new(vec![]))
        .build();
    let mut req = point_request(&["GetType"], 1, 1);
    req.filetype = "markdown".into();

    // Resolution succeeds via the wildcard; the snippet provider then
    // declares no commands.
    let resp = dispatch(&registry, &req).await;
    assert!(matches!(resp, CanonicalResponse::Error { ref kind, .. } if kind == "UnsupportedCommand"));
}

#[tokio::test]
async fn explicit_completer_name_overrides_filetype_routing() {
    let backend = ScriptedBackend::ready();
    let registry = ready_registry(&backend).await;

    backend.script("GetType", Ok(json!("size_t"))).await;
    let mut req = point_request(&["GetType"], 1, 1);
    req.filetype = "python".into();
    req.completer_target = Some("clangd".into());

    let resp = dispatch(&registry, &req).await;
    assert_eq!(resp, CanonicalResponse::Text { message: "size_t".into() });
}

#[tokio::test]
async fn backend_errors_pass_through_verbatim() {
    let backend = ScriptedBackend::ready();
    let registry = ready_registry(&backend).await;

    backend
        .script(
            "GetType",
            Err(lingod::backend::BackendCallError::Failed(
                "clangd: no AST for file".into(),
            )),
        )
        .await;
    let resp = dispatch(&registry, &point_request(&["GetType"], 1, 1)).await;
    assert_eq!(
        resp,
        CanonicalResponse::Error {
            kind: "BackendError".into(),
            message: "clangd: no AST for file".into(),
        }
    );
}
