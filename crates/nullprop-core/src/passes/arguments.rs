//! Call-site argument analysis.

use tracing::trace;

use super::{annotate_slot, parameter_fan_out};
use crate::error::NullpropResult;
use crate::graph::DependencyKind;
use crate::oracle::can_annotate;
use crate::rewrite::{Obligation, PassContext, Rewrite, RewriteCapability, RewritePass, Slot};
use crate::signature::EntityKind;
use crate::store::Entity;
use crate::syntax::Declaration;

/// Annotates parameter `i` when any caller passes an argument at position
/// `i` that may be absent.
///
/// Callers are the entity's `Usage` parents. Every call, object
/// construction, and `this(...)`/`base(...)` chain that targets the entity
/// counts as a call site.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArgumentPass;

impl RewritePass for ArgumentPass {
    fn name(&self) -> &'static str {
        "argument"
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
        if method.params.is_empty() {
            return Ok(Rewrite::Unchanged);
        }

        let store = cx.store();
        let oracle = cx.oracle();
        let mut absent = vec![false; method.params.len()];
        for caller in cx.graph().parents(&entity.key, Some(DependencyKind::Usage)) {
            if caller.is_external() {
                continue;
            }
            let caller_cx = store.current_context(caller)?;
            let caller_decl = store.declaration(caller)?;
            for args in caller_decl.argument_lists_for(&entity.key) {
                for (slot, arg) in absent.iter_mut().zip(args) {
                    if !*slot && oracle.may_be_absent(arg, &caller_cx) {
                        trace!(
                            callee = %entity.key,
                            caller = %caller.key,
                            "argument may be absent"
                        );
                        *slot = true;
                    }
                }
            }
        }
        if !absent.contains(&true) {
            return Ok(Rewrite::Unchanged);
        }

        let own = store.current_context(entity)?;
        let mut edited = decl.clone();
        if let Declaration::Method(m) = &mut edited {
            for (index, param) in m.params.iter_mut().enumerate() {
                if absent[index] && can_annotate(oracle, &param.ty, &own) {
                    let slot = Slot::Parameter {
                        index,
                        name: param.name.clone(),
                    };
                    let contract = param.contract;
                    annotate_slot(cx, self.name(), &entity.key, slot, contract, &mut param.ty);
                }
            }
        }
        Ok(Rewrite::compare(decl, edited))
    }

    fn additional_rewrites(&self, cx: &PassContext<'_>, entity: &Entity) -> Vec<Obligation> {
        parameter_fan_out(cx.graph(), entity)
    }
}
