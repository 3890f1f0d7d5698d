// SPDX-License-Identifier: MIT
//! Broker error taxonomy.
//!
//! Every failure the broker surfaces is a stable (kind, message) pair.
//! Callers building UIs special-case the "not found" and "initializing"
//! kinds and display the rest verbatim, so messages here are user-facing
//! strings that must not drift.

use thiserror::Error;

/// All failures the broker can surface to a caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BrokerError {
    /// No completer is registered for the requested file type or name.
    #[error("No completer registered for '{0}'")]
    NoSuchCompleter(String),

    /// The subserver exists but is not yet (or no longer) ready. Retryable.
    #[error("Server is initializing. Please wait.")]
    ServerInitializing,

    /// The resolved completer does not declare this command.
    #[error("Supported commands do not include '{0}'")]
    UnsupportedCommand(String),

    /// A backend round trip exceeded its bound. Retryable.
    #[error("Request to the backend timed out")]
    Timeout,

    /// The subserver did not become ready within its startup deadline.
    #[error("Server did not become ready within the startup timeout")]
    ServerStartTimeout,

    /// The backend connection was lost while forwarding a command.
    /// A restart is triggered automatically; the request is not retried.
    #[error("The semantic engine crashed and is being restarted")]
    ServerCrashed,

    /// A go-to query found no destination. Expected, non-exceptional.
    #[error("Cannot jump to location")]
    CannotJumpToLocation,

    /// A reference/symbol query matched nothing. Expected, non-exceptional.
    #[error("Symbol not found")]
    SymbolNotFound,

    /// A hover/doc query had nothing to show. Expected, non-exceptional.
    #[error("No documentation available.")]
    NoDocumentationAvailable,

    /// A resolve was attempted with a stale or unknown fix-it token.
    #[error("Invalid fix-it token: {0}")]
    InvalidFixItToken(String),

    /// The backend answered with a shape the normalizer does not recognize.
    /// Always surfaced with enough context to diagnose, never dropped.
    #[error("Malformed backend response: {0}")]
    MalformedBackendResponse(String),

    /// A backend-reported internal error, message preserved verbatim.
    #[error("{0}")]
    BackendError(String),
}

impl BrokerError {
    /// Stable kind string callers dispatch on.
    pub fn kind(&self) -> &'static str {
        match self {
            BrokerError::NoSuchCompleter(_) => "NoSuchCompleter",
            BrokerError::ServerInitializing => "ServerInitializing",
            BrokerError::UnsupportedCommand(_) => "UnsupportedCommand",
            BrokerError::Timeout => "Timeout",
            BrokerError::ServerStartTimeout => "ServerStartTimeout",
            BrokerError::ServerCrashed => "ServerCrashed",
            BrokerError::CannotJumpToLocation => "CannotJumpToLocation",
            BrokerError::SymbolNotFound => "SymbolNotFound",
            BrokerError::NoDocumentationAvailable => "NoDocumentationAvailable",
            BrokerError::InvalidFixItToken(_) => "InvalidFixItToken",
            BrokerError::MalformedBackendResponse(_) => "MalformedBackendResponse",
            BrokerError::BackendError(_) => "BackendError",
        }
    }

    /// Transient lifecycle errors the caller may retry with backoff.
    /// Routing mistakes, "not found" outcomes, and protocol errors are not
    /// retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BrokerError::ServerInitializing | BrokerError::Timeout
        )
    }

    /// Semantic "nothing to show" outcomes of a well-formed query.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BrokerError::CannotJumpToLocation
                | BrokerError::SymbolNotFound
                | BrokerError::NoDocumentationAvailable
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initializing_message_is_exact() {
        // Editor plugins match this string; it must not change.
        assert_eq!(
            BrokerError::ServerInitializing.to_string(),
            "Server is initializing. Please wait."
        );
    }

    #[test]
    fn not_found_messages_are_exact() {
        assert_eq!(
            BrokerError::CannotJumpToLocation.to_string(),
            "Cannot jump to location"
        );
        assert_eq!(BrokerError::SymbolNotFound.to_string(), "Symbol not found");
        assert_eq!(
            BrokerError::NoDocumentationAvailable.to_string(),
            "No documentation available."
        );
    }

    #[test]
    fn retryable_classification() {
        assert!(BrokerError::ServerInitializing.is_retryable());
        assert!(BrokerError::Timeout.is_retryable());
        assert!(!BrokerError::ServerCrashed.is_retryable());
        assert!(!BrokerError::NoSuchCompleter("rust".into()).is_retryable());
        assert!(!BrokerError::SymbolNotFound.is_retryable());
    }

    #[test]
    fn backend_error_message_is_verbatim() {
        let e = BrokerError::BackendError("clangd: AST deserialization failed".into());
        assert_eq!(e.to_string(), "clangd: AST deserialization failed");
        assert_eq!(e.kind(), "BackendError");
    }

    #[test]
    fn not_found_kinds() {
        assert!(BrokerError::CannotJumpToLocation.is_not_found());
        assert!(!BrokerError::Timeout.is_not_found());
    }
}
