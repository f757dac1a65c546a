//! Fields, properties and events.

use std::collections::BTreeSet;

use super::{annotate_slot, return_fan_out};
use crate::error::NullpropResult;
use crate::graph::DependencyKind;
use crate::oracle::{can_annotate, SemanticOracle};
use crate::rewrite::{Obligation, PassContext, Rewrite, RewriteCapability, RewritePass, Slot};
use crate::semantic::SemanticContext;
use crate::signature::{EntityKey, EntityKind};
use crate::store::{Entity, EntityStore};
use crate::syntax::{AssignTarget, ChainKind, Declaration, Stmt};

fn annotate_member(
    cx: &mut PassContext<'_>,
    pass: &str,
    entity: &Entity,
    decl: &Declaration,
) -> Rewrite {
    let mut edited = decl.clone();
    let contract = edited.value_contract();
    if let Some(ty) = edited.value_type_mut() {
        annotate_slot(cx, pass, &entity.key, Slot::Member, contract, ty);
    }
    Rewrite::compare(decl, edited)
}

/// Annotates a member that is not guaranteed to hold a value once
/// construction finishes.
///
/// A member with an initializer is decided by the initializer alone.
/// Otherwise every constructor of the member's type (static constructors for
/// static members) must assign it a value that is never absent on every path,
/// where a `this(...)` chain runs the chained constructor first. A type with
/// no constructor has an implicit empty one, which assigns nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct UninitializedMemberPass;

impl RewritePass for UninitializedMemberPass {
    fn name(&self) -> &'static str {
        "uninitialized-member"
    }

    fn triggers(&self) -> RewriteCapability {
        RewriteCapability::ALL
    }

    fn handles(&self, kind: EntityKind) -> bool {
        matches!(
            kind,
            EntityKind::Field | EntityKind::Property | EntityKind::Event
        )
    }

    fn rewrite(
        &self,
        cx: &mut PassContext<'_>,
        entity: &Entity,
        decl: &Declaration,
    ) -> NullpropResult<Rewrite> {
        let stores_value = match decl {
            Declaration::Field(_) | Declaration::Event(_) => true,
            Declaration::Property(p) => p.is_auto(),
            Declaration::Method(_) => false,
        };
        let Some(ty) = decl.value_type().filter(|_| stores_value) else {
            return Ok(Rewrite::Unchanged);
        };
        let store = cx.store();
        let oracle = cx.oracle();
        let own = store.current_context(entity)?;
        if !can_annotate(oracle, ty, &own) {
            return Ok(Rewrite::Unchanged);
        }

        let may_be_absent = match decl.initializer() {
            Some(init) => oracle.may_be_absent(init, &own),
            None => {
                let container = decl.container();
                !definitely_initialized(store, oracle, &entity.key, container, decl.is_static())?
            }
        };
        if !may_be_absent {
            return Ok(Rewrite::Unchanged);
        }
        Ok(annotate_member(cx, self.name(), entity, decl))
    }

    fn additional_rewrites(&self, cx: &PassContext<'_>, entity: &Entity) -> Vec<Obligation> {
        return_fan_out(cx.graph(), entity)
    }
}

/// Whether every constructor of `container` leaves `member` holding a value
/// that is never absent.
fn definitely_initialized(
    store: &EntityStore,
    oracle: &dyn SemanticOracle,
    member: &EntityKey,
    container: &str,
    is_static: bool,
) -> NullpropResult<bool> {
    let ctors = store.constructors_of(container, is_static);
    if ctors.is_empty() {
        return Ok(false);
    }
    for ctor in ctors {
        let mut chain = BTreeSet::new();
        if !constructor_assigns(store, oracle, ctor, member, &mut chain)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Whether running `ctor` (its `this(...)` chain first, then its body)
/// leaves `member` assigned a value that is never absent.
///
/// A chain that revisits a constructor assigns nothing.
fn constructor_assigns(
    store: &EntityStore,
    oracle: &dyn SemanticOracle,
    ctor: &Entity,
    member: &EntityKey,
    chain: &mut BTreeSet<EntityKey>,
) -> NullpropResult<bool> {
    if !chain.insert(ctor.key.clone()) {
        return Ok(false);
    }
    let Some(method) = store.declaration(ctor)?.as_method() else {
        return Ok(false);
    };

    let mut entry = false;
    if let Some(init) = &method.initializer {
        if init.kind == ChainKind::This {
            if let Some(target) = store.try_resolve(&init.target) {
                entry = constructor_assigns(store, oracle, target, member, chain)?;
            }
        }
    }

    let body = method.body.as_deref().unwrap_or_default();
    let cx = store.current_context(ctor)?;
    let flow = assignment_flow(oracle, &cx, body, member, entry);
    Ok(flow.returned && flow.fallthrough.unwrap_or(true))
}

/// Definite assignment state after a block.
struct Flow {
    /// Every path that left through `return` had the member assigned.
    returned: bool,
    /// State on fall-through, `None` when every path returned.
    fallthrough: Option<bool>,
}

fn assignment_flow(
    oracle: &dyn SemanticOracle,
    cx: &SemanticContext<'_>,
    stmts: &[Stmt],
    member: &EntityKey,
    entry: bool,
) -> Flow {
    let mut returned = true;
    let mut state = entry;
    for stmt in stmts {
        match stmt {
            Stmt::Assign {
                target: AssignTarget::Member { member: target },
                value,
            } if target == member => {
                state = !oracle.may_be_absent(value, cx);
            }
            Stmt::Return { .. } => {
                return Flow {
                    returned: returned && state,
                    fallthrough: None,
                };
            }
            Stmt::If {
                then, otherwise, ..
            } => {
                let then = assignment_flow(oracle, cx, then, member, state);
                let otherwise = assignment_flow(oracle, cx, otherwise, member, state);
                returned = returned && then.returned && otherwise.returned;
                match (then.fallthrough, otherwise.fallthrough) {
                    (None, None) => {
                        return Flow {
                            returned,
                            fallthrough: None,
                        };
                    }
                    (a, b) => state = a.unwrap_or(true) && b.unwrap_or(true),
                }
            }
            _ => {}
        }
    }
    Flow {
        returned,
        fallthrough: Some(state),
    }
}

/// Annotates a member that some user assigns a value that may be absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemberAssignmentPass;

impl RewritePass for MemberAssignmentPass {
    fn name(&self) -> &'static str {
        "member-assignment"
    }

    fn triggers(&self) -> RewriteCapability {
        RewriteCapability::ALL
    }

    fn handles(&self, kind: EntityKind) -> bool {
        matches!(
            kind,
            EntityKind::Field | EntityKind::Property | EntityKind::Event
        )
    }

    fn rewrite(
        &self,
        cx: &mut PassContext<'_>,
        entity: &Entity,
        decl: &Declaration,
    ) -> NullpropResult<Rewrite> {
        let Some(ty) = decl.value_type() else {
            return Ok(Rewrite::Unchanged);
        };
        let store = cx.store();
        let oracle = cx.oracle();
        if !can_annotate(oracle, ty, &store.current_context(entity)?) {
            return Ok(Rewrite::Unchanged);
        }

        let mut assigned_absent = false;
        for user in cx.graph().parents(&entity.key, Some(DependencyKind::Usage)) {
            if user.is_external() {
                continue;
            }
            let user_decl = store.declaration(user)?;
            let values = user_decl.assignments_to(&entity.key);
            if values.is_empty() {
                continue;
            }
            let user_cx = store.current_context(user)?;
            if values.iter().any(|value| oracle.may_be_absent(value, &user_cx)) {
                assigned_absent = true;
                break;
            }
        }
        if !assigned_absent {
            return Ok(Rewrite::Unchanged);
        }
        Ok(annotate_member(cx, self.name(), entity, decl))
    }

    fn additional_rewrites(&self, cx: &PassContext<'_>, entity: &Entity) -> Vec<Obligation> {
        return_fan_out(cx.graph(), entity)
    }
}
