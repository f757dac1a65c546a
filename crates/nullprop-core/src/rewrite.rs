//! The rewrite pass contract.
//!
//! A [`RewritePass`] is one local analysis. The driver calls
//! [`RewritePass::rewrite`] with the entity and an owned copy of its live
//! declaration; the pass returns either [`Rewrite::Unchanged`] or an edited
//! declaration. Passes never touch neighbors directly. After a real
//! mutation the driver asks [`RewritePass::additional_rewrites`] which
//! neighbors must be re-examined, and with which [`RewriteCapability`].
//!
//! Slots that carry an explicit "never absent" contract are never
//! annotated. A pass that would have annotated one reports the clash through
//! [`PassContext::report_conflict`] and moves on.

use std::collections::HashSet;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Serialize, Serializer};
use tracing::warn;

use crate::error::NullpropResult;
use crate::graph::DependencyGraph;
use crate::oracle::SemanticOracle;
use crate::signature::{EntityKey, EntityKind};
use crate::store::{Entity, EntityStore};
use crate::syntax::Declaration;

// ============================================================================
// Capabilities and obligations
// ============================================================================

/// Which kind of change a re-examination is reacting to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RewriteCapability(u8);

impl RewriteCapability {
    pub const NONE: RewriteCapability = RewriteCapability(0);
    /// Something a parameter (or a value flowing into the entity) depends on changed.
    pub const PARAMETER_CHANGE: RewriteCapability = RewriteCapability(1);
    /// A return or member value the entity reads changed.
    pub const RETURN_VALUE_CHANGE: RewriteCapability = RewriteCapability(1 << 1);
    pub const ALL: RewriteCapability = RewriteCapability(0b11);

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: RewriteCapability) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: RewriteCapability) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for RewriteCapability {
    type Output = RewriteCapability;

    fn bitor(self, rhs: Self) -> Self::Output {
        RewriteCapability(self.0 | rhs.0)
    }
}

impl BitOrAssign for RewriteCapability {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for RewriteCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.contains(RewriteCapability::PARAMETER_CHANGE) {
            parts.push("parameter");
        }
        if self.contains(RewriteCapability::RETURN_VALUE_CHANGE) {
            parts.push("return");
        }
        if parts.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&parts.join("|"))
        }
    }
}

impl Serialize for RewriteCapability {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// A request to re-examine `entity` for changes of kind `capability`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Obligation {
    pub entity: EntityKey,
    pub capability: RewriteCapability,
}

impl Obligation {
    pub fn new(entity: impl Into<EntityKey>, capability: RewriteCapability) -> Self {
        Obligation {
            entity: entity.into(),
            capability,
        }
    }
}

// ============================================================================
// Rewrite results
// ============================================================================

/// Outcome of one pass on one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rewrite {
    Unchanged,
    Changed(Declaration),
}

impl Rewrite {
    /// `Changed(edited)` unless `edited` equals `original`.
    pub fn compare(original: &Declaration, edited: Declaration) -> Self {
        if *original == edited {
            Rewrite::Unchanged
        } else {
            Rewrite::Changed(edited)
        }
    }

    pub fn is_changed(&self) -> bool {
        matches!(self, Rewrite::Changed(_))
    }
}

// ============================================================================
// Conflicts
// ============================================================================

/// The slot a conflict is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "slot", rename_all = "snake_case")]
pub enum Slot {
    Parameter { index: usize, name: String },
    Return,
    Member,
    Local { name: String },
    Cast,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Parameter { index, name } => write!(f, "parameter {} ({})", index, name),
            Slot::Return => f.write_str("return value"),
            Slot::Member => f.write_str("member type"),
            Slot::Local { name } => write!(f, "local {}", name),
            Slot::Cast => f.write_str("cast target"),
        }
    }
}

/// A decision a pass declined to make because of an explicit contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub entity: EntityKey,
    pub slot: Slot,
    pub pass: String,
    pub reason: String,
}

/// Conflicts collected during a run, one per entity and slot.
#[derive(Debug, Default)]
pub struct ConflictLog {
    seen: HashSet<(EntityKey, Slot)>,
    conflicts: Vec<Conflict>,
}

impl ConflictLog {
    pub fn new() -> Self {
        ConflictLog::default()
    }

    /// Record a conflict; returns false if one was already recorded for the
    /// same entity and slot.
    pub fn report(&mut self, conflict: Conflict) -> bool {
        if !self
            .seen
            .insert((conflict.entity.clone(), conflict.slot.clone()))
        {
            return false;
        }
        warn!(
            entity = %conflict.entity,
            slot = %conflict.slot,
            pass = %conflict.pass,
            "{}",
            conflict.reason
        );
        self.conflicts.push(conflict);
        true
    }

    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    pub fn len(&self) -> usize {
        self.conflicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn into_vec(self) -> Vec<Conflict> {
        self.conflicts
    }
}

// ============================================================================
// Pass context and trait
// ============================================================================

/// What a pass can see while it runs.
pub struct PassContext<'a> {
    graph: &'a DependencyGraph,
    oracle: &'a dyn SemanticOracle,
    conflicts: &'a mut ConflictLog,
}

impl<'a> PassContext<'a> {
    pub fn new(
        graph: &'a DependencyGraph,
        oracle: &'a dyn SemanticOracle,
        conflicts: &'a mut ConflictLog,
    ) -> Self {
        PassContext {
            graph,
            oracle,
            conflicts,
        }
    }

    pub fn graph(&self) -> &'a DependencyGraph {
        self.graph
    }

    pub fn store(&self) -> &'a EntityStore {
        self.graph.store()
    }

    pub fn oracle(&self) -> &'a dyn SemanticOracle {
        self.oracle
    }

    /// Record that `pass` declined to annotate `slot` of `entity`.
    pub fn report_conflict(
        &mut self,
        entity: &EntityKey,
        slot: Slot,
        pass: &str,
        reason: impl Into<String>,
    ) {
        self.conflicts.report(Conflict {
            entity: entity.clone(),
            slot,
            pass: pass.to_string(),
            reason: reason.into(),
        });
    }
}

/// One local nullability analysis.
pub trait RewritePass {
    /// Stable name, used in logs, reports, and configuration.
    fn name(&self) -> &'static str;

    /// Capabilities that make this pass worth re-running during the drain.
    fn triggers(&self) -> RewriteCapability;

    /// Whether this pass applies to entities of `kind`.
    fn handles(&self, kind: EntityKind) -> bool;

    /// Examine `entity`, whose live declaration is `decl`.
    fn rewrite(
        &self,
        cx: &mut PassContext<'_>,
        entity: &Entity,
        decl: &Declaration,
    ) -> NullpropResult<Rewrite>;

    /// Neighbors to re-examine after this pass changed `entity`.
    fn additional_rewrites(&self, cx: &PassContext<'_>, entity: &Entity) -> Vec<Obligation>;
}
