//! Explicitly typed local variables.

use std::collections::BTreeSet;

use super::value_fan_out;
use crate::error::NullpropResult;
use crate::oracle::{can_annotate, SemanticOracle};
use crate::rewrite::{Obligation, PassContext, Rewrite, RewriteCapability, RewritePass};
use crate::semantic::SemanticContext;
use crate::signature::EntityKind;
use crate::store::Entity;
use crate::syntax::{walk_stmts, walk_stmts_mut, AssignTarget, Declaration, Expr, Stmt};

/// Annotates an explicitly typed local that is initialized or assigned a
/// value that may be absent, or that is neither initialized nor assigned.
///
/// Locals feed each other (`string a = null; string b = a;`), so the pass
/// iterates until no further local in the body changes. Locals are marked by
/// their position in walk order, so a branch-scoped local that reuses a name
/// is never annotated along with another.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalDeclarationPass;

impl RewritePass for LocalDeclarationPass {
    fn name(&self) -> &'static str {
        "local-declaration"
    }

    fn triggers(&self) -> RewriteCapability {
        RewriteCapability::ALL
    }

    fn handles(&self, kind: EntityKind) -> bool {
        matches!(kind, EntityKind::Method | EntityKind::Property)
    }

    fn rewrite(
        &self,
        cx: &mut PassContext<'_>,
        entity: &Entity,
        decl: &Declaration,
    ) -> NullpropResult<Rewrite> {
        if decl.body().is_none() {
            return Ok(Rewrite::Unchanged);
        }
        let base = cx.store().current_context(entity)?;
        let oracle = cx.oracle();

        let mut edited = decl.clone();
        loop {
            let pending = {
                let scoped = base.within(&edited);
                match edited.body() {
                    Some(body) => locals_to_annotate(oracle, &scoped, body),
                    None => BTreeSet::new(),
                }
            };
            if pending.is_empty() {
                break;
            }
            if let Some(body) = edited.body_mut() {
                let mut position = 0;
                walk_stmts_mut(body, &mut |stmt| {
                    if let Stmt::Local { ty, .. } = stmt {
                        if let Some(ty) = ty.as_mut().filter(|_| pending.contains(&position)) {
                            ty.nullable = true;
                        }
                        position += 1;
                    }
                });
            }
        }
        Ok(Rewrite::compare(decl, edited))
    }

    fn additional_rewrites(&self, cx: &PassContext<'_>, entity: &Entity) -> Vec<Obligation> {
        value_fan_out(cx.graph(), entity)
    }
}

/// Walk-order positions (among all local declarations) of annotatable
/// locals in `body` that must be annotated now.
fn locals_to_annotate(
    oracle: &dyn SemanticOracle,
    cx: &SemanticContext<'_>,
    body: &[Stmt],
) -> BTreeSet<usize> {
    let mut declared: Vec<(usize, &str, Option<&Expr>)> = Vec::new();
    let mut position = 0;
    walk_stmts(body, &mut |stmt| {
        if let Stmt::Local { name, ty, init } = stmt {
            if ty.as_ref().is_some_and(|ty| can_annotate(oracle, ty, cx)) {
                declared.push((position, name.as_str(), init.as_ref()));
            }
            position += 1;
        }
    });

    let mut pending = BTreeSet::new();
    for (position, name, init) in declared {
        let mut assigned = Vec::new();
        walk_stmts(body, &mut |stmt| {
            if let Stmt::Assign {
                target: AssignTarget::Local { name: target },
                value,
            } = stmt
            {
                if target == name {
                    assigned.push(value);
                }
            }
        });

        let never_set = init.is_none() && assigned.is_empty();
        let absent = init.is_some_and(|e| oracle.may_be_absent(e, cx))
            || assigned.iter().any(|e| oracle.may_be_absent(e, cx));
        if never_set || absent {
            pending.insert(position);
        }
    }
    pending
}
