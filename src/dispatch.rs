// SPDX-License-Identifier: MIT
//! Request dispatcher.
//!
//! One entry point, one pipeline: resolve the completer, gate on subserver
//! readiness (fail fast, never block), check the capability set, forward,
//! normalize. Every failure along the way becomes a typed error response;
//! nothing is dropped or retried here — retry policy belongs to the caller.

use tracing::{debug, warn};

use crate::error::BrokerError;
use crate::registry::CompleterRegistry;
use crate::request::{CommandName, LifecycleEvent, Request};
use crate::response::CanonicalResponse;

/// Dispatch one request to its completer and return the canonical answer.
pub async fn dispatch(registry: &CompleterRegistry, req: &Request) -> CanonicalResponse {
    match run(registry, req).await {
        Ok(resp) => resp,
        Err(err) => {
            if err.is_not_found() || err.is_retryable() {
                debug!(filetype = %req.filetype, kind = err.kind(), "request not answerable");
            } else {
                warn!(filetype = %req.filetype, kind = err.kind(), error = %err, "request failed");
            }
            err.into()
        }
    }
}

async fn run(registry: &CompleterRegistry, req: &Request) -> Result<CanonicalResponse, BrokerError> {
    let completer = registry.resolve(&req.filetype, &req.target())?;

    let wire_name = req.command_arguments.first().cloned().unwrap_or_default();
    let cmd = CommandName::parse(&wire_name)
        .ok_or_else(|| BrokerError::UnsupportedCommand(wire_name.clone()))?;

    // RestartServer is a lifecycle operation: it must work from every state,
    // so it runs before the readiness gate.
    if cmd == CommandName::RestartServer {
        if !completer.capabilities().supports(cmd) {
            return Err(BrokerError::UnsupportedCommand(wire_name.clone()));
        }
        let subserver = completer
            .subserver()
            .ok_or(BrokerError::UnsupportedCommand(wire_name))?;
        subserver.restart().await;
        return Ok(CanonicalResponse::Text {
            message: String::new(),
        });
    }

    if let Some(subserver) = completer.subserver() {
        subserver.readiness().await?;
    }

    if !completer.capabilities().supports(cmd) {
        return Err(BrokerError::UnsupportedCommand(wire_name));
    }

    debug!(completer = completer.name(), command = %cmd, "dispatching");
    completer.run_command(cmd, req).await
}

/// Deliver a lifecycle event to the file type's completer. Events for file
/// types with no completer are dropped; they carry no answer to fail.
pub async fn notify(registry: &CompleterRegistry, req: &Request, event: LifecycleEvent) {
    let Ok(completer) = registry.resolve(&req.filetype, &req.target()) else {
        return;
    };
    match event {
        LifecycleEvent::FileReadyToParse => completer.on_file_ready_to_parse().await,
        LifecycleEvent::BufferVisit => completer.on_buffer_visit(req).await,
    }
}

// Pipeline-level tests (scripted backends, full request flow) live in
// tests/dispatch_test.rs.
