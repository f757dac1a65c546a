//! JSON output types and serialization for CLI responses.
//!
//! Every response is a single JSON object on stdout with `status` first and a
//! `schema_version`. Logs go to stderr, so stdout stays machine readable.

use std::io::{self, Write};

use serde::Serialize;

use crate::driver::{MutationRecord, RunReport};
use crate::error::{NullpropError, OutputErrorCode};
use crate::graph::{Dependency, DependencyGraph};
use crate::persist::PersistedFile;
use crate::rewrite::Conflict;
use crate::signature::{EntityKey, EntityKind};

/// Current schema version for all responses.
pub const SCHEMA_VERSION: &str = "1";

/// Error information for JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    /// Numeric error code (also the process exit status).
    pub code: u8,
    /// Stable error kind.
    pub kind: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn from_error(err: &NullpropError) -> Self {
        ErrorInfo {
            code: OutputErrorCode::from(err).code(),
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Response for a failed command.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Status: "error".
    pub status: String,
    pub schema_version: String,
    pub error: ErrorInfo,
}

impl ErrorResponse {
    pub fn from_error(err: &NullpropError) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            error: ErrorInfo::from_error(err),
        }
    }
}

/// Counters from a propagation run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub entities_visited: usize,
    pub obligations_enqueued: usize,
    pub obligations_drained: usize,
    pub mutations: usize,
    pub conflicts: usize,
    pub files_modified: usize,
}

/// Response for `annotate`.
#[derive(Debug, Clone, Serialize)]
pub struct AnnotateResponse {
    /// Status: "ok".
    pub status: String,
    pub schema_version: String,
    pub dry_run: bool,
    pub summary: RunSummary,
    pub mutations: Vec<MutationRecord>,
    /// Contract conflicts, reported as warnings.
    pub warnings: Vec<Conflict>,
    pub files: Vec<PersistedFile>,
}

impl AnnotateResponse {
    pub fn new(report: RunReport, files: Vec<PersistedFile>, dry_run: bool) -> Self {
        AnnotateResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            dry_run,
            summary: RunSummary {
                entities_visited: report.visited,
                obligations_enqueued: report.obligations_enqueued,
                obligations_drained: report.drained,
                mutations: report.mutations.len(),
                conflicts: report.conflicts.len(),
                files_modified: files.len(),
            },
            mutations: report.mutations,
            warnings: report.conflicts,
            files,
        }
    }
}

/// One entity as listed by `graph`.
#[derive(Debug, Clone, Serialize)]
pub struct EntityInfo {
    pub key: EntityKey,
    pub kind: EntityKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Response for `graph`.
#[derive(Debug, Clone, Serialize)]
pub struct GraphResponse {
    /// Status: "ok".
    pub status: String,
    pub schema_version: String,
    pub entities: Vec<EntityInfo>,
    pub edges: Vec<Dependency>,
}

impl GraphResponse {
    pub fn from_graph(graph: &DependencyGraph) -> Self {
        let entities = graph
            .store()
            .entities()
            .map(|e| EntityInfo {
                key: e.key.clone(),
                kind: e.kind,
                file: e.location.as_ref().map(|l| l.file.clone()),
            })
            .collect();
        let mut edges = graph.edges().to_vec();
        edges.sort();
        GraphResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            entities,
            edges,
        }
    }
}

/// Emit a response as pretty-printed JSON followed by a newline.
pub fn emit_response<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}
