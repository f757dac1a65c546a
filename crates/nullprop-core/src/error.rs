//! Error types and error code constants for nullprop.
//!
//! This module provides a single error type (`NullpropError`) for every
//! failure the engine can surface, plus a stable mapping to CLI exit codes.
//!
//! ## Error Code Mapping
//!
//! - `2`: Invalid input (unreadable model, bad type syntax, bad config)
//! - `3`: Resolution errors (unknown entity key, unknown file)
//! - `4`: Persistence errors (failed to write a rewritten file)
//! - `5`: Invariant violations (inconsistent graph, non-monotonic rewrite)
//! - `10`: Internal errors
//!
//! ## Recoverable vs Fatal
//!
//! Conflicts with explicit "never absent" contracts and unresolved edge
//! endpoints are *not* errors: passes report conflicts through the conflict
//! log and the graph filters unresolved endpoints. Every variant here aborts
//! the run.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::signature::EntityKey;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Stable error codes for JSON output and process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid input from the caller (model, config, type syntax).
    InvalidInput = 2,
    /// Resolution errors (entity or file not found).
    ResolutionError = 3,
    /// Failed to persist rewritten files.
    PersistError = 4,
    /// The static build produced an inconsistent graph, or a pass broke an invariant.
    InvariantViolation = 5,
    /// Internal errors (bugs, unexpected state).
    InternalError = 10,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Errors produced while loading, building, propagating, or persisting.
#[derive(Debug, Error)]
pub enum NullpropError {
    /// An identity key was never registered with the store.
    #[error("entity not found: {key}")]
    EntityNotFound { key: EntityKey },

    /// A location handle names a file the program does not contain.
    #[error("file not found in program: {path}")]
    FileNotFound { path: String },

    /// A location handle matched no live declaration.
    #[error("no declaration matches {signature} in {file}")]
    MissingDeclaration { file: String, signature: EntityKey },

    /// A location handle matched more than one live declaration.
    #[error("{count} declarations match {signature} in {file}")]
    DuplicateDeclaration {
        file: String,
        signature: EntityKey,
        count: usize,
    },

    /// An external entity was asked for its declaration.
    #[error("{key} is external and has no declaration")]
    ExternalEntity { key: EntityKey },

    /// The same identity was registered twice.
    #[error("entity {key} is registered more than once")]
    DuplicateEntity { key: EntityKey },

    /// Two model documents declare the same source file.
    #[error("source file {path} is declared by more than one model document")]
    DuplicateFile { path: String },

    /// A symbol the graph guarantees to exist is absent from the semantic model.
    #[error("symbol {key} is missing from the semantic model")]
    MissingSymbol { key: EntityKey },

    /// A rewrite removed an annotation or changed the declaration's shape.
    #[error("rewrite of {key} is not monotonic: {reason}")]
    NonMonotonicRewrite { key: EntityKey, reason: String },

    /// A rewrite produced a declaration with a different identity.
    #[error("rewrite of {key} changed its identity to {actual}")]
    IdentityChanged { key: EntityKey, actual: EntityKey },

    /// Type syntax could not be parsed.
    #[error("invalid type syntax '{input}': {message}")]
    InvalidTypeSyntax { input: String, message: String },

    /// A model or config file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A model file is not valid JSON for the program model.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Configuration is invalid.
    #[error("config error: {0}")]
    Config(String),

    /// A rewritten file could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Two modified files would be written to the same target path.
    #[error("{first} and {second} both map to {}", path.display())]
    TargetCollision {
        path: PathBuf,
        first: String,
        second: String,
    },

    /// A response could not be written to stdout.
    #[error("failed to write output: {0}")]
    Output(#[source] io::Error),
}

impl NullpropError {
    /// Returns true for errors that indicate an inconsistent graph or a broken
    /// pass rather than bad input.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            NullpropError::MissingDeclaration { .. }
                | NullpropError::DuplicateDeclaration { .. }
                | NullpropError::DuplicateEntity { .. }
                | NullpropError::DuplicateFile { .. }
                | NullpropError::MissingSymbol { .. }
                | NullpropError::NonMonotonicRewrite { .. }
                | NullpropError::IdentityChanged { .. }
        )
    }

    /// Stable error kind string for JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            NullpropError::EntityNotFound { .. } => "entity_not_found",
            NullpropError::FileNotFound { .. } => "file_not_found",
            NullpropError::MissingDeclaration { .. } => "missing_declaration",
            NullpropError::DuplicateDeclaration { .. } => "duplicate_declaration",
            NullpropError::ExternalEntity { .. } => "external_entity",
            NullpropError::DuplicateEntity { .. } => "duplicate_entity",
            NullpropError::DuplicateFile { .. } => "duplicate_file",
            NullpropError::MissingSymbol { .. } => "missing_symbol",
            NullpropError::NonMonotonicRewrite { .. } => "non_monotonic_rewrite",
            NullpropError::IdentityChanged { .. } => "identity_changed",
            NullpropError::InvalidTypeSyntax { .. } => "invalid_type_syntax",
            NullpropError::Read { .. } => "read_error",
            NullpropError::Parse { .. } => "parse_error",
            NullpropError::Config(_) => "config_error",
            NullpropError::Persist { .. } => "persist_error",
            NullpropError::TargetCollision { .. } => "target_collision",
            NullpropError::Output(_) => "output_error",
        }
    }
}

impl From<&NullpropError> for OutputErrorCode {
    fn from(err: &NullpropError) -> Self {
        match err {
            NullpropError::EntityNotFound { .. } | NullpropError::FileNotFound { .. } => {
                OutputErrorCode::ResolutionError
            }
            NullpropError::InvalidTypeSyntax { .. }
            | NullpropError::Read { .. }
            | NullpropError::Parse { .. }
            | NullpropError::Config(_) => OutputErrorCode::InvalidInput,
            NullpropError::Persist { .. } | NullpropError::TargetCollision { .. } => {
                OutputErrorCode::PersistError
            }
            err if err.is_invariant_violation() => OutputErrorCode::InvariantViolation,
            _ => OutputErrorCode::InternalError,
        }
    }
}

impl From<NullpropError> for OutputErrorCode {
    fn from(err: NullpropError) -> Self {
        OutputErrorCode::from(&err)
    }
}

/// Result alias used throughout the crate.
pub type NullpropResult<T> = Result<T, NullpropError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invariant_violations_map_to_code_5() {
        let err = NullpropError::DuplicateDeclaration {
            file: "A.cs".to_string(),
            signature: EntityKey::new("M:C.F()"),
            count: 2,
        };
        assert!(err.is_invariant_violation());
        assert_eq!(OutputErrorCode::from(&err).code(), 5);
    }

    #[test]
    fn duplicate_files_are_invariant_violations() {
        let err = NullpropError::DuplicateFile {
            path: "A.cs".to_string(),
        };
        assert_eq!(err.kind(), "duplicate_file");
        assert_eq!(OutputErrorCode::from(&err).code(), 5);
    }

    #[test]
    fn resolution_errors_map_to_code_3() {
        let err = NullpropError::EntityNotFound {
            key: EntityKey::new("F:C.f"),
        };
        assert!(!err.is_invariant_violation());
        assert_eq!(OutputErrorCode::from(err), OutputErrorCode::ResolutionError);
    }

    #[test]
    fn output_errors_are_internal() {
        let err = NullpropError::Output(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
        assert_eq!(err.kind(), "output_error");
        assert_eq!(OutputErrorCode::from(&err), OutputErrorCode::InternalError);
    }

    #[test]
    fn persist_errors_carry_the_path() {
        let err = NullpropError::Persist {
            path: PathBuf::from("out/A.cs"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.to_string(), "failed to write out/A.cs: denied");
        assert_eq!(OutputErrorCode::from(&err).code(), 4);
    }

    #[test]
    fn target_collisions_are_persist_errors() {
        let err = NullpropError::TargetCollision {
            path: PathBuf::from("out/A.json"),
            first: "A.cs".to_string(),
            second: "A.vb".to_string(),
        };
        assert_eq!(err.to_string(), "A.cs and A.vb both map to out/A.json");
        assert_eq!(OutputErrorCode::from(&err).code(), 4);
    }
}
