//! Traversal and fixpoint driver.
//!
//! A run has two phases:
//!
//! 1. **Seed**: every entity, in traversal order, gets the full battery once.
//!    Traversal starts at entities with no children (callees, leaf bases)
//!    and walks towards parents, so callees are seen before their callers.
//! 2. **Drain**: obligations produced by mutations are popped in FIFO order
//!    and dispatched to the passes whose triggers intersect the obligation's
//!    capability.
//!
//! Every mutation only ever adds annotations and every obligation follows a
//! mutation, so the queue always drains.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;
use tracing::{debug, info, trace};

use crate::error::NullpropResult;
use crate::graph::DependencyGraph;
use crate::oracle::{ModelOracle, SemanticOracle};
use crate::passes::default_passes;
use crate::rewrite::{
    Conflict, ConflictLog, Obligation, PassContext, Rewrite, RewriteCapability, RewritePass,
};
use crate::signature::EntityKey;

// ============================================================================
// Traversal
// ============================================================================

/// Seed order over a graph.
pub struct Traversal;

impl Traversal {
    /// Every entity key exactly once: a depth-first walk along parents from
    /// each entity without children, then entities only reachable through a
    /// leafless cycle, each used as a further root in key order.
    pub fn seed_order(graph: &DependencyGraph) -> Vec<EntityKey> {
        let mut visited: HashSet<EntityKey> = HashSet::new();
        let mut order = Vec::new();

        let leaves: Vec<EntityKey> = graph
            .nodes_without_children()
            .into_iter()
            .map(|e| e.key.clone())
            .collect();
        for root in leaves {
            Self::walk(graph, root, &mut visited, &mut order);
        }

        let rest: Vec<EntityKey> = graph
            .store()
            .entities()
            .filter(|e| !visited.contains(&e.key))
            .map(|e| e.key.clone())
            .collect();
        for root in rest {
            if !visited.contains(&root) {
                trace!(%root, "seeding from cycle");
                Self::walk(graph, root, &mut visited, &mut order);
            }
        }
        order
    }

    /// Iterative pre-order walk with an explicit frame stack. `on_path` holds
    /// the keys of the open frames; reaching one of them closes a cycle and
    /// is cut. `visited` keeps a key from being ordered twice per traversal.
    fn walk(
        graph: &DependencyGraph,
        root: EntityKey,
        visited: &mut HashSet<EntityKey>,
        order: &mut Vec<EntityKey>,
    ) {
        if !visited.insert(root.clone()) {
            return;
        }
        order.push(root.clone());
        let mut on_path: HashSet<EntityKey> = HashSet::new();
        on_path.insert(root.clone());
        let mut stack: Vec<Frame> = vec![Frame::open(graph, root)];

        while let Some(frame) = stack.last_mut() {
            let Some(parent) = frame.parents.get(frame.next).cloned() else {
                if let Some(done) = stack.pop() {
                    on_path.remove(&done.key);
                }
                continue;
            };
            frame.next += 1;
            if on_path.contains(&parent) {
                trace!(%parent, "cycle cut");
                continue;
            }
            if visited.insert(parent.clone()) {
                order.push(parent.clone());
                on_path.insert(parent.clone());
                stack.push(Frame::open(graph, parent));
            }
        }
    }

    fn parent_keys(graph: &DependencyGraph, key: &EntityKey) -> Vec<EntityKey> {
        graph
            .parents(key, None)
            .into_iter()
            .map(|e| e.key.clone())
            .collect()
    }
}

/// One open node of the seed walk.
struct Frame {
    key: EntityKey,
    parents: Vec<EntityKey>,
    next: usize,
}

impl Frame {
    fn open(graph: &DependencyGraph, key: EntityKey) -> Self {
        let parents = Traversal::parent_keys(graph, &key);
        Frame {
            key,
            parents,
            next: 0,
        }
    }
}

// ============================================================================
// Work queue
// ============================================================================

/// FIFO of obligations with at most one entry per entity.
///
/// Pushing an obligation for an entity that is already waiting widens the
/// waiting entry's capability instead of adding a second entry.
#[derive(Debug, Default)]
pub struct WorkQueue {
    order: VecDeque<EntityKey>,
    pending: HashMap<EntityKey, RewriteCapability>,
}

impl WorkQueue {
    pub fn new() -> Self {
        WorkQueue::default()
    }

    /// Enqueue `obligation`; returns true if it created a new entry.
    pub fn push(&mut self, obligation: Obligation) -> bool {
        if obligation.capability.is_empty() {
            return false;
        }
        if let Some(capability) = self.pending.get_mut(&obligation.entity) {
            *capability |= obligation.capability;
            return false;
        }
        self.order.push_back(obligation.entity.clone());
        self.pending.insert(obligation.entity, obligation.capability);
        true
    }

    pub fn pop(&mut self) -> Option<Obligation> {
        let entity = self.order.pop_front()?;
        let capability = self
            .pending
            .remove(&entity)
            .unwrap_or(RewriteCapability::NONE);
        Some(Obligation { entity, capability })
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// ============================================================================
// Driver
// ============================================================================

/// One applied mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationRecord {
    pub entity: EntityKey,
    pub pass: String,
}

/// Outcome of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Entities seeded with the full battery.
    pub visited: usize,
    /// Obligations offered to the queue, coalesced or not.
    pub obligations_enqueued: usize,
    /// Queue entries popped during the drain.
    pub drained: usize,
    pub mutations: Vec<MutationRecord>,
    pub conflicts: Vec<Conflict>,
}

impl RunReport {
    pub fn mutation_count(&self) -> usize {
        self.mutations.len()
    }
}

/// Runs a pass battery over a graph until no obligation remains.
pub struct FixpointDriver {
    passes: Vec<Box<dyn RewritePass>>,
    oracle: Box<dyn SemanticOracle>,
}

impl FixpointDriver {
    pub fn new(passes: Vec<Box<dyn RewritePass>>, oracle: Box<dyn SemanticOracle>) -> Self {
        FixpointDriver { passes, oracle }
    }

    /// The full battery over a [`ModelOracle`].
    pub fn with_default_passes() -> Self {
        FixpointDriver::new(default_passes(), Box::new(ModelOracle::new()))
    }

    pub fn oracle(&self) -> &dyn SemanticOracle {
        self.oracle.as_ref()
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Seed, then drain. Fatal store errors abort the run; conflicts do not.
    pub fn run(&self, graph: &mut DependencyGraph) -> NullpropResult<RunReport> {
        let mut report = RunReport::default();
        let mut conflicts = ConflictLog::new();
        let mut queue = WorkQueue::new();

        let order = Traversal::seed_order(graph);
        for key in &order {
            let kind = graph.entity(key)?.kind;
            if !kind.is_local() {
                continue;
            }
            report.visited += 1;
            for pass in self.passes.iter().filter(|p| p.handles(kind)) {
                let pass = pass.as_ref();
                self.run_pass(graph, pass, key, &mut conflicts, &mut queue, &mut report)?;
            }
        }
        info!(
            passes = self.pass_count(),
            visited = report.visited,
            mutations = report.mutations.len(),
            queued = queue.len(),
            "seed phase complete"
        );

        while let Some(obligation) = queue.pop() {
            report.drained += 1;
            let kind = graph.entity(&obligation.entity)?.kind;
            if !kind.is_local() {
                continue;
            }
            trace!(
                entity = %obligation.entity,
                capability = %obligation.capability,
                "draining obligation"
            );
            for pass in self
                .passes
                .iter()
                .filter(|p| p.handles(kind) && p.triggers().intersects(obligation.capability))
            {
                self.run_pass(
                    graph,
                    pass.as_ref(),
                    &obligation.entity,
                    &mut conflicts,
                    &mut queue,
                    &mut report,
                )?;
            }
        }

        report.conflicts = conflicts.into_vec();
        info!(
            drained = report.drained,
            mutations = report.mutations.len(),
            conflicts = report.conflicts.len(),
            "fixpoint reached"
        );
        Ok(report)
    }

    /// Run one pass on one entity, apply its rewrite, and enqueue fan-out.
    fn run_pass(
        &self,
        graph: &mut DependencyGraph,
        pass: &dyn RewritePass,
        key: &EntityKey,
        conflicts: &mut ConflictLog,
        queue: &mut WorkQueue,
        report: &mut RunReport,
    ) -> NullpropResult<()> {
        let entity = graph.entity(key)?.clone();
        let decl = graph.store().current_declaration(&entity)?;
        let rewrite = {
            let mut cx = PassContext::new(graph, self.oracle.as_ref(), conflicts);
            pass.rewrite(&mut cx, &entity, &decl)?
        };
        let Rewrite::Changed(edited) = rewrite else {
            trace!(entity = %key, pass = pass.name(), "no change");
            return Ok(());
        };
        if !graph.store_mut().apply_mutation(&entity, edited)? {
            return Ok(());
        }
        report.mutations.push(MutationRecord {
            entity: key.clone(),
            pass: pass.name().to_string(),
        });

        let obligations = {
            let cx = PassContext::new(graph, self.oracle.as_ref(), conflicts);
            pass.additional_rewrites(&cx, &entity)
        };
        debug!(
            entity = %key,
            pass = pass.name(),
            obligations = obligations.len(),
            "mutation fan-out"
        );
        for obligation in obligations {
            report.obligations_enqueued += 1;
            queue.push(obligation);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use crate::program::{ExternalSymbol, Program, SourceFile};
    use crate::syntax::{Declaration, Expr, MethodDecl, Stmt};

    fn call(from: &str, to: &str) -> Declaration {
        Declaration::Method(
            MethodDecl::new("C", from).with_body(vec![Stmt::expr(Expr::call(to, vec![]))]),
        )
    }

    fn graph(decls: Vec<Declaration>) -> DependencyGraph {
        let program = Program::new()
            .with_file(SourceFile::new("C.cs", decls))
            .with_external(ExternalSymbol::new("M:Lib.Log()"));
        GraphBuilder::new(&ModelOracle::new()).build(program).unwrap()
    }

    fn names(keys: &[EntityKey]) -> Vec<&str> {
        keys.iter().map(|k| k.as_str()).collect()
    }

    #[test]
    fn callees_are_seeded_before_callers() {
        let graph = graph(vec![
            call("Top", "M:C.Mid()"),
            call("Mid", "M:Lib.Log()"),
        ]);
        let order = Traversal::seed_order(&graph);
        assert_eq!(names(&order), vec!["M:Lib.Log()", "M:C.Mid()", "M:C.Top()"]);
    }

    #[test]
    fn leafless_cycles_are_still_seeded() {
        let graph = graph(vec![call("Ping", "M:C.Pong()"), call("Pong", "M:C.Ping()")]);
        let order = Traversal::seed_order(&graph);
        assert_eq!(order.len(), 3);
        assert!(names(&order).contains(&"M:C.Ping()"));
        assert!(names(&order).contains(&"M:C.Pong()"));
    }

    #[test]
    fn cycles_above_a_leaf_are_cut_on_the_path() {
        let ping = Declaration::Method(MethodDecl::new("C", "Ping").with_body(vec![
            Stmt::expr(Expr::call("M:Lib.Log()", vec![])),
            Stmt::expr(Expr::call("M:C.Pong()", vec![])),
        ]));
        let graph = graph(vec![ping, call("Pong", "M:C.Ping()")]);
        let order = Traversal::seed_order(&graph);
        assert_eq!(names(&order), vec!["M:Lib.Log()", "M:C.Ping()", "M:C.Pong()"]);
    }

    #[test]
    fn default_driver_carries_the_full_battery() {
        assert_eq!(FixpointDriver::with_default_passes().pass_count(), 12);
    }

    #[test]
    fn queue_coalesces_by_entity() {
        let mut queue = WorkQueue::new();
        assert!(queue.push(Obligation::new("M:C.A()", RewriteCapability::PARAMETER_CHANGE)));
        assert!(queue.push(Obligation::new("M:C.B()", RewriteCapability::PARAMETER_CHANGE)));
        assert!(!queue.push(Obligation::new(
            "M:C.A()",
            RewriteCapability::RETURN_VALUE_CHANGE
        )));
        assert!(!queue.push(Obligation::new("M:C.C()", RewriteCapability::NONE)));
        assert_eq!(queue.len(), 2);

        let first = queue.pop().unwrap();
        assert_eq!(first.entity.as_str(), "M:C.A()");
        assert_eq!(first.capability, RewriteCapability::ALL);
        assert_eq!(queue.pop().unwrap().entity.as_str(), "M:C.B()");
        assert!(queue.pop().is_none());
    }

    #[test]
    fn run_over_an_unannotated_program_is_quiet() {
        let mut graph = graph(vec![call("Top", "M:C.Mid()"), call("Mid", "M:Lib.Log()")]);
        let report = FixpointDriver::with_default_passes().run(&mut graph).unwrap();
        assert_eq!(report.visited, 2);
        assert!(report.mutations.is_empty());
        assert_eq!(report.drained, 0);
    }
}
