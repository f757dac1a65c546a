//! Dependency graph over program entities.
//!
//! Edges are stored by identity key and indexed by both endpoints. Endpoints
//! are resolved through the [`EntityStore`] on every query; an edge whose
//! endpoint never got registered is silently left out of neighbor queries
//! (logged at `trace`), which keeps partially built graphs usable.
//!
//! Direction:
//!
//! - `Usage`: `from`'s body references `to` (call, construction,
//!   constructor chain, member read or write). Children of a method are
//!   its callees; parents are its callers.
//! - `Inheritance`: `to` overrides or implements `from`. Children of a base
//!   member are its overriders; parents are its bases.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use serde::Serialize;
use tracing::trace;

use crate::error::NullpropResult;
use crate::signature::EntityKey;
use crate::store::{Entity, EntityStore};

/// Kind of relationship an edge records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    Usage,
    Inheritance,
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyKind::Usage => f.write_str("usage"),
            DependencyKind::Inheritance => f.write_str("inheritance"),
        }
    }
}

/// A directed edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Dependency {
    pub from: EntityKey,
    pub to: EntityKey,
    pub kind: DependencyKind,
}

/// Typed directed multigraph over the entities of one store.
#[derive(Debug)]
pub struct DependencyGraph {
    store: EntityStore,
    edges: Vec<Dependency>,
    edge_set: HashSet<Dependency>,
    by_from: HashMap<EntityKey, Vec<usize>>,
    by_to: HashMap<EntityKey, Vec<usize>>,
}

impl DependencyGraph {
    pub fn new(store: EntityStore) -> Self {
        DependencyGraph {
            store,
            edges: Vec::new(),
            edge_set: HashSet::new(),
            by_from: HashMap::new(),
            by_to: HashMap::new(),
        }
    }

    /// Register an entity with a local declaration.
    pub fn add_entity(&mut self, entity: Entity) -> NullpropResult<()> {
        self.store.register(entity)
    }

    /// Register a callee with no local declaration.
    pub fn add_external_entity(&mut self, key: impl Into<EntityKey>) -> NullpropResult<()> {
        self.store.register(Entity::external(key))
    }

    /// Record an edge. Identical triples are stored once; returns whether the
    /// edge is new. Endpoints need not be registered.
    pub fn add_dependency(
        &mut self,
        from: impl Into<EntityKey>,
        to: impl Into<EntityKey>,
        kind: DependencyKind,
    ) -> bool {
        let edge = Dependency {
            from: from.into(),
            to: to.into(),
            kind,
        };
        if self.edge_set.contains(&edge) {
            return false;
        }
        let index = self.edges.len();
        self.by_from.entry(edge.from.clone()).or_default().push(index);
        self.by_to.entry(edge.to.clone()).or_default().push(index);
        self.edge_set.insert(edge.clone());
        self.edges.push(edge);
        true
    }

    /// Resolved entities `key` points at, optionally restricted to one kind.
    pub fn children(&self, key: &EntityKey, kind: Option<DependencyKind>) -> Vec<&Entity> {
        self.neighbors(&self.by_from, key, kind, |edge| &edge.to)
    }

    /// Resolved entities pointing at `key`, optionally restricted to one kind.
    pub fn parents(&self, key: &EntityKey, kind: Option<DependencyKind>) -> Vec<&Entity> {
        self.neighbors(&self.by_to, key, kind, |edge| &edge.from)
    }

    fn neighbors<'g>(
        &'g self,
        index: &'g HashMap<EntityKey, Vec<usize>>,
        key: &EntityKey,
        kind: Option<DependencyKind>,
        endpoint: fn(&Dependency) -> &EntityKey,
    ) -> Vec<&'g Entity> {
        let Some(edges) = index.get(key) else {
            return Vec::new();
        };
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for edge in edges.iter().map(|&i| &self.edges[i]) {
            if kind.is_some_and(|k| k != edge.kind) {
                continue;
            }
            let other = endpoint(edge);
            match self.store.try_resolve(other) {
                Some(entity) => {
                    if seen.insert(other) {
                        out.push(entity);
                    }
                }
                None => trace!(
                    from = %edge.from,
                    to = %edge.to,
                    kind = %edge.kind,
                    "skipping edge with unresolved endpoint"
                ),
            }
        }
        out
    }

    /// Entities with no resolved children, in key order.
    pub fn nodes_without_children(&self) -> Vec<&Entity> {
        self.store
            .entities()
            .filter(|e| self.children(&e.key, None).is_empty())
            .collect()
    }

    /// Entities with no resolved parents, in key order.
    pub fn nodes_without_parents(&self) -> Vec<&Entity> {
        self.store
            .entities()
            .filter(|e| self.parents(&e.key, None).is_empty())
            .collect()
    }

    /// Apply `action` to every entity matching `predicate`, in key order.
    pub fn for_each_entity<P, A>(&self, mut predicate: P, mut action: A)
    where
        P: FnMut(&Entity) -> bool,
        A: FnMut(&Entity),
    {
        for entity in self.store.entities() {
            if predicate(entity) {
                action(entity);
            }
        }
    }

    /// Resolve `key` to its entity.
    pub fn entity(&self, key: &EntityKey) -> NullpropResult<&Entity> {
        self.store.resolve(key)
    }

    /// Every stored edge in insertion order, resolved or not.
    pub fn edges(&self) -> &[Dependency] {
        &self.edges
    }

    pub fn entity_count(&self) -> usize {
        self.store.entity_count()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut EntityStore {
        &mut self.store
    }

    pub fn into_store(self) -> EntityStore {
        self.store
    }
}
