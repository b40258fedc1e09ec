// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error type for Pushbridge.

use thiserror::Error;

/// Top-level error type for all bridge operations.
///
/// Cloneable so that a rejected promise can hand its stored error to a
/// handler attached after settlement.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    // -- Dispatch errors --
    #[error("unknown action '{0}'")]
    UnknownAction(String),

    #[error("invalid parameter: {0}")]
    InvalidParameters(String),

    #[error("action '{0}' is known, but not implemented on this platform")]
    NotImplemented(String),

    #[error("action '{0}' is already registered")]
    DuplicateAction(String),

    // -- Native SDK --
    #[error("native SDK call failed: {0}")]
    CollaboratorFailure(String),

    // -- Promise lifecycle --
    #[error("promise already settled")]
    AlreadySettled,

    #[error("promise dropped before it was settled")]
    Abandoned,

    // -- Serialization / configuration --
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(String),
}

impl BridgeError {
    /// Stable machine-readable name of the error kind.
    ///
    /// Sent to the scripting side in failure payloads, so renaming a kind is
    /// a breaking change for callers that match on it.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownAction(_) => "UnknownAction",
            Self::InvalidParameters(_) => "InvalidParameters",
            Self::NotImplemented(_) => "NotImplemented",
            Self::DuplicateAction(_) => "DuplicateAction",
            Self::CollaboratorFailure(_) => "CollaboratorFailure",
            Self::AlreadySettled => "AlreadySettled",
            Self::Abandoned => "Abandoned",
            Self::Serialization(_) => "Serialization",
            Self::Config(_) => "Config",
            Self::Io(_) => "Io",
        }
    }

    /// Shorthand for a missing or mistyped parameter.
    pub fn invalid_parameter(detail: impl Into<String>) -> Self {
        Self::InvalidParameters(detail.into())
    }

    /// Shorthand for a failure reported by the native SDK.
    pub fn collaborator(detail: impl Into<String>) -> Self {
        Self::CollaboratorFailure(detail.into())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BridgeError>;
