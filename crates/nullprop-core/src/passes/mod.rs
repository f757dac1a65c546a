//! The rule set: twelve local nullability analyses.
//!
//! Each pass decides one kind of slot from one kind of evidence:
//!
//! | Pass | Entities | Evidence |
//! |------|----------|----------|
//! | `declared-base` | methods, properties | base member's declared signature is annotated |
//! | `default-parameter` | methods | parameter default may be absent |
//! | `argument` | methods, constructors | some call site passes a value that may be absent |
//! | `assigned-parameter` | methods | parameter reassigned a value that may be absent |
//! | `inheritance-parameter` | methods | base parameter is annotated |
//! | `local-declaration` | methods, properties | local initialized or assigned a value that may be absent |
//! | `cast-target` | methods, properties, fields | cast operand may be absent |
//! | `return` | methods | some return value may be absent |
//! | `property-return` | properties with getters | getter returns a value that may be absent |
//! | `inheritance-return` | methods, properties | some overrider's value is annotated |
//! | `uninitialized-member` | fields, auto-properties, events | not definitely initialized to a value that is never absent |
//! | `member-assignment` | fields, properties, events | some user assigns a value that may be absent |
//!
//! Parameter information flows from call sites to callees and from bases to
//! overriders. Return information flows from overriders to bases and from
//! callees to callers. `declared-base` is the one exception: it reads only
//! the signatures as they were loaded, so it reconciles an overrider with an
//! annotation its base already had and never with one produced during the
//! run.

mod arguments;
mod cast;
mod inheritance;
mod locals;
mod members;
mod parameters;
mod reconcile;
mod returns;

pub use arguments::ArgumentPass;
pub use cast::CastTargetPass;
pub use inheritance::{InheritanceParameterPass, InheritanceReturnPass};
pub use locals::LocalDeclarationPass;
pub use members::{MemberAssignmentPass, UninitializedMemberPass};
pub use parameters::{AssignedParameterPass, DefaultParameterPass};
pub use reconcile::DeclaredBasePass;
pub use returns::{PropertyReturnPass, ReturnPass};

use crate::error::{NullpropError, NullpropResult};
use crate::graph::{DependencyGraph, DependencyKind};
use crate::rewrite::{Obligation, PassContext, RewriteCapability, RewritePass, Slot};
use crate::signature::EntityKey;
use crate::store::Entity;
use crate::syntax::NullContract;
use crate::types::TypeSyntax;

/// Every pass in battery order.
pub fn default_passes() -> Vec<Box<dyn RewritePass>> {
    vec![
        Box::new(DeclaredBasePass),
        Box::new(DefaultParameterPass),
        Box::new(ArgumentPass),
        Box::new(AssignedParameterPass),
        Box::new(InheritanceParameterPass),
        Box::new(LocalDeclarationPass),
        Box::new(CastTargetPass),
        Box::new(ReturnPass),
        Box::new(PropertyReturnPass),
        Box::new(InheritanceReturnPass),
        Box::new(UninitializedMemberPass),
        Box::new(MemberAssignmentPass),
    ]
}

/// Names of every pass in battery order.
pub fn pass_names() -> Vec<&'static str> {
    default_passes().iter().map(|p| p.name()).collect()
}

/// The default battery minus the passes named in `disabled`.
///
/// An unknown name is a configuration error.
pub fn passes_without(disabled: &[String]) -> NullpropResult<Vec<Box<dyn RewritePass>>> {
    let known = pass_names();
    if let Some(unknown) = disabled.iter().find(|name| !known.contains(&name.as_str())) {
        return Err(NullpropError::Config(format!(
            "unknown pass '{}' (known passes: {})",
            unknown,
            known.join(", ")
        )));
    }
    Ok(default_passes()
        .into_iter()
        .filter(|p| !disabled.iter().any(|name| name == p.name()))
        .collect())
}

/// Annotate `ty` unless `contract` forbids it, in which case the clash is
/// reported as a conflict. Returns whether `ty` was annotated.
pub(crate) fn annotate_slot(
    cx: &mut PassContext<'_>,
    pass: &str,
    entity: &EntityKey,
    slot: Slot,
    contract: NullContract,
    ty: &mut TypeSyntax,
) -> bool {
    if contract.is_not_null() {
        let reason = format!("{} may be absent but is declared never-absent", slot);
        cx.report_conflict(entity, slot, pass, reason);
        return false;
    }
    ty.nullable = true;
    true
}

// ============================================================================
// Fan-out
// ============================================================================

fn local_keys(entities: Vec<&Entity>) -> impl Iterator<Item = EntityKey> + '_ {
    entities
        .into_iter()
        .filter(|e| !e.is_external())
        .map(|e| e.key.clone())
}

fn push_all(
    out: &mut Vec<Obligation>,
    keys: impl Iterator<Item = EntityKey>,
    capability: RewriteCapability,
) {
    out.extend(keys.map(|key| Obligation::new(key, capability)));
}

/// Callees of `key`'s callers.
fn callees_of_callers<'g>(graph: &'g DependencyGraph, key: &EntityKey) -> Vec<&'g Entity> {
    graph
        .parents(key, Some(DependencyKind::Usage))
        .into_iter()
        .flat_map(|caller| graph.children(&caller.key, Some(DependencyKind::Usage)))
        .collect()
}

/// After a parameter changed: the entity itself, its callees, and its
/// overriders.
pub(crate) fn parameter_fan_out(graph: &DependencyGraph, entity: &Entity) -> Vec<Obligation> {
    let param = RewriteCapability::PARAMETER_CHANGE;
    let mut out = vec![Obligation::new(entity.key.clone(), param)];
    push_all(
        &mut out,
        local_keys(graph.children(&entity.key, Some(DependencyKind::Usage))),
        param,
    );
    push_all(
        &mut out,
        local_keys(graph.children(&entity.key, Some(DependencyKind::Inheritance))),
        param,
    );
    out
}

/// After a local or cast inside the entity changed: the entity's own return
/// and the arguments it passes.
pub(crate) fn value_fan_out(graph: &DependencyGraph, entity: &Entity) -> Vec<Obligation> {
    let mut out = vec![Obligation::new(
        entity.key.clone(),
        RewriteCapability::RETURN_VALUE_CHANGE,
    )];
    push_all(
        &mut out,
        local_keys(graph.children(&entity.key, Some(DependencyKind::Usage))),
        RewriteCapability::PARAMETER_CHANGE,
    );
    out
}

/// After a return or member value changed: readers and bases see a new
/// value, and whatever the readers pass it on to sees a new argument.
pub(crate) fn return_fan_out(graph: &DependencyGraph, entity: &Entity) -> Vec<Obligation> {
    let ret = RewriteCapability::RETURN_VALUE_CHANGE;
    let mut out = Vec::new();
    push_all(
        &mut out,
        local_keys(graph.parents(&entity.key, Some(DependencyKind::Usage))),
        ret,
    );
    push_all(
        &mut out,
        local_keys(graph.parents(&entity.key, Some(DependencyKind::Inheritance))),
        ret,
    );
    push_all(
        &mut out,
        local_keys(callees_of_callers(graph, &entity.key)),
        RewriteCapability::PARAMETER_CHANGE,
    );
    out
}

/// After a base adopted an overrider's annotation: callers may now pass the
/// value on and may now receive it.
pub(crate) fn inheritance_return_fan_out(
    graph: &DependencyGraph,
    entity: &Entity,
) -> Vec<Obligation> {
    let mut out = Vec::new();
    push_all(
        &mut out,
        local_keys(graph.parents(&entity.key, Some(DependencyKind::Usage))),
        RewriteCapability::PARAMETER_CHANGE | RewriteCapability::RETURN_VALUE_CHANGE,
    );
    push_all(
        &mut out,
        local_keys(graph.parents(&entity.key, Some(DependencyKind::Inheritance))),
        RewriteCapability::RETURN_VALUE_CHANGE,
    );
    push_all(
        &mut out,
        local_keys(callees_of_callers(graph, &entity.key)),
        RewriteCapability::PARAMETER_CHANGE,
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn battery_order_is_fixed() {
        assert_eq!(
            pass_names(),
            vec![
                "declared-base",
                "default-parameter",
                "argument",
                "assigned-parameter",
                "inheritance-parameter",
                "local-declaration",
                "cast-target",
                "return",
                "property-return",
                "inheritance-return",
                "uninitialized-member",
                "member-assignment",
            ]
        );
    }

    #[test]
    fn disabling_passes() {
        let passes = passes_without(&["cast-target".to_string()]).unwrap();
        assert_eq!(passes.len(), 11);
        assert!(passes.iter().all(|p| p.name() != "cast-target"));

        let err = passes_without(&["nope".to_string()]).err().unwrap();
        assert!(err.to_string().contains("unknown pass 'nope'"));
    }
}
