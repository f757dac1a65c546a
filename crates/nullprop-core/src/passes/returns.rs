//! Return values of methods and property getters.

use super::{annotate_slot, return_fan_out};
use crate::error::NullpropResult;
use crate::oracle::{can_annotate, SemanticOracle};
use crate::rewrite::{Obligation, PassContext, Rewrite, RewriteCapability, RewritePass, Slot};
use crate::semantic::SemanticContext;
use crate::signature::EntityKind;
use crate::store::Entity;
use crate::syntax::{walk_stmts, Declaration, Stmt};

/// Whether any `return e;` in `body` may produce an absent value.
fn returns_absent(oracle: &dyn SemanticOracle, cx: &SemanticContext<'_>, body: &[Stmt]) -> bool {
    let mut absent = false;
    walk_stmts(body, &mut |stmt| {
        if let Stmt::Return { value: Some(value) } = stmt {
            absent = absent || oracle.may_be_absent(value, cx);
        }
    });
    absent
}

/// Shared body of both return passes: annotate the value slot when the
/// body can return absence.
fn annotate_return(
    cx: &mut PassContext<'_>,
    pass: &str,
    entity: &Entity,
    decl: &Declaration,
) -> NullpropResult<Rewrite> {
    let Some(body) = decl.body() else {
        return Ok(Rewrite::Unchanged);
    };
    let Some(ty) = decl.value_type() else {
        return Ok(Rewrite::Unchanged);
    };
    let own = cx.store().current_context(entity)?;
    let oracle = cx.oracle();
    if !can_annotate(oracle, ty, &own) || !returns_absent(oracle, &own, body) {
        return Ok(Rewrite::Unchanged);
    }

    let mut edited = decl.clone();
    let contract = edited.value_contract();
    if let Some(ty) = edited.value_type_mut() {
        annotate_slot(cx, pass, &entity.key, Slot::Return, contract, ty);
    }
    Ok(Rewrite::compare(decl, edited))
}

/// Annotates a method's return type when some `return e;` may be absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReturnPass;

impl RewritePass for ReturnPass {
    fn name(&self) -> &'static str {
        "return"
    }

    fn triggers(&self) -> RewriteCapability {
        RewriteCapability::ALL
    }

    fn handles(&self, kind: EntityKind) -> bool {
        kind == EntityKind::Method
    }

    fn rewrite(
        &self,
        cx: &mut PassContext<'_>,
        entity: &Entity,
        decl: &Declaration,
    ) -> NullpropResult<Rewrite> {
        match decl {
            Declaration::Method(m) if !m.is_constructor() => {
                annotate_return(cx, self.name(), entity, decl)
            }
            _ => Ok(Rewrite::Unchanged),
        }
    }

    fn additional_rewrites(&self, cx: &PassContext<'_>, entity: &Entity) -> Vec<Obligation> {
        return_fan_out(cx.graph(), entity)
    }
}

/// Annotates a property's type when its getter may return absence.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropertyReturnPass;

impl RewritePass for PropertyReturnPass {
    fn name(&self) -> &'static str {
        "property-return"
    }

    fn triggers(&self) -> RewriteCapability {
        RewriteCapability::RETURN_VALUE_CHANGE
    }

    fn handles(&self, kind: EntityKind) -> bool {
        kind == EntityKind::Property
    }

    fn rewrite(
        &self,
        cx: &mut PassContext<'_>,
        entity: &Entity,
        decl: &Declaration,
    ) -> NullpropResult<Rewrite> {
        match decl {
            Declaration::Property(p) if p.getter.is_some() => {
                annotate_return(cx, self.name(), entity, decl)
            }
            _ => Ok(Rewrite::Unchanged),
        }
    }

    fn additional_rewrites(&self, cx: &PassContext<'_>, entity: &Entity) -> Vec<Obligation> {
        return_fan_out(cx.graph(), entity)
    }
}
