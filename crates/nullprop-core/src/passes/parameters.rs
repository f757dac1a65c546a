//! Parameter analyses that only look at the method itself.

use super::{annotate_slot, parameter_fan_out};
use crate::error::NullpropResult;
use crate::oracle::can_annotate;
use crate::rewrite::{Obligation, PassContext, Rewrite, RewriteCapability, RewritePass, Slot};
use crate::semantic::SemanticContext;
use crate::signature::EntityKind;
use crate::store::Entity;
use crate::syntax::{walk_stmts, AssignTarget, Declaration, MethodDecl, Stmt};

/// Annotate every parameter flagged in `absent` that can take it.
fn annotate_params(
    cx: &mut PassContext<'_>,
    pass: &str,
    entity: &Entity,
    own: &SemanticContext<'_>,
    method: &mut MethodDecl,
    absent: &[bool],
) {
    let oracle = cx.oracle();
    for (index, param) in method.params.iter_mut().enumerate() {
        if !absent.get(index).copied().unwrap_or(false) || !can_annotate(oracle, &param.ty, own) {
            continue;
        }
        let slot = Slot::Parameter {
            index,
            name: param.name.clone(),
        };
        let contract = param.contract;
        annotate_slot(cx, pass, &entity.key, slot, contract, &mut param.ty);
    }
}

/// Annotates a parameter whose default value may be absent
/// (`void M(string s = null)`).
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultParameterPass;

impl RewritePass for DefaultParameterPass {
    fn name(&self) -> &'static str {
        "default-parameter"
    }

    fn triggers(&self) -> RewriteCapability {
        RewriteCapability::PARAMETER_CHANGE
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
        let Declaration::Method(method) = decl else {
            return Ok(Rewrite::Unchanged);
        };
        let own = cx.store().current_context(entity)?;
        let oracle = cx.oracle();
        let absent: Vec<bool> = method
            .params
            .iter()
            .map(|p| {
                p.default
                    .as_ref()
                    .is_some_and(|d| oracle.may_be_absent(d, &own))
            })
            .collect();
        if !absent.contains(&true) {
            return Ok(Rewrite::Unchanged);
        }

        let mut edited = method.clone();
        annotate_params(cx, self.name(), entity, &own, &mut edited, &absent);
        Ok(Rewrite::compare(decl, Declaration::Method(edited)))
    }

    fn additional_rewrites(&self, cx: &PassContext<'_>, entity: &Entity) -> Vec<Obligation> {
        parameter_fan_out(cx.graph(), entity)
    }
}

/// Annotates a parameter the body reassigns to a value that may be absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssignedParameterPass;

impl RewritePass for AssignedParameterPass {
    fn name(&self) -> &'static str {
        "assigned-parameter"
    }

    fn triggers(&self) -> RewriteCapability {
        RewriteCapability::PARAMETER_CHANGE
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
        let Declaration::Method(method) = decl else {
            return Ok(Rewrite::Unchanged);
        };
        let Some(body) = method.body.as_deref() else {
            return Ok(Rewrite::Unchanged);
        };

        let own = cx.store().current_context(entity)?;
        let oracle = cx.oracle();
        let mut absent = vec![false; method.params.len()];
        walk_stmts(body, &mut |stmt| {
            if let Stmt::Assign {
                target: AssignTarget::Param { name },
                value,
            } = stmt
            {
                if let Some(index) = method.param_index(name) {
                    if oracle.may_be_absent(value, &own) {
                        absent[index] = true;
                    }
                }
            }
        });
        if !absent.contains(&true) {
            return Ok(Rewrite::Unchanged);
        }

        let mut edited = method.clone();
        annotate_params(cx, self.name(), entity, &own, &mut edited, &absent);
        Ok(Rewrite::compare(decl, Declaration::Method(edited)))
    }

    fn additional_rewrites(&self, cx: &PassContext<'_>, entity: &Entity) -> Vec<Obligation> {
        parameter_fan_out(cx.graph(), entity)
    }
}
