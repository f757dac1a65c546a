//! Cast target types.

use std::collections::BTreeSet;

use super::value_fan_out;
use crate::error::NullpropResult;
use crate::oracle::{can_annotate, SemanticOracle};
use crate::rewrite::{Obligation, PassContext, Rewrite, RewriteCapability, RewritePass};
use crate::semantic::SemanticContext;
use crate::signature::EntityKind;
use crate::store::Entity;
use crate::syntax::{Declaration, Expr};

/// Annotates the target of `(T)operand` when the operand may be absent.
///
/// Casts are identified by their position in expression walk order, which a
/// rewrite never changes. Nested casts are resolved innermost-out by
/// iterating until nothing changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct CastTargetPass;

impl RewritePass for CastTargetPass {
    fn name(&self) -> &'static str {
        "cast-target"
    }

    fn triggers(&self) -> RewriteCapability {
        RewriteCapability::ALL
    }

    fn handles(&self, kind: EntityKind) -> bool {
        matches!(
            kind,
            EntityKind::Method | EntityKind::Property | EntityKind::Field
        )
    }

    fn rewrite(
        &self,
        cx: &mut PassContext<'_>,
        entity: &Entity,
        decl: &Declaration,
    ) -> NullpropResult<Rewrite> {
        let base = cx.store().current_context(entity)?;
        let oracle = cx.oracle();

        let mut edited = decl.clone();
        loop {
            let pending = casts_to_annotate(oracle, &base.within(&edited), &edited);
            if pending.is_empty() {
                break;
            }
            let mut position = 0;
            edited.for_each_expr_mut(&mut |expr| {
                if let Expr::Cast { target, .. } = expr {
                    if pending.contains(&position) {
                        target.nullable = true;
                    }
                    position += 1;
                }
            });
        }
        Ok(Rewrite::compare(decl, edited))
    }

    fn additional_rewrites(&self, cx: &PassContext<'_>, entity: &Entity) -> Vec<Obligation> {
        value_fan_out(cx.graph(), entity)
    }
}

/// Walk-order positions of casts whose target must be annotated now.
fn casts_to_annotate(
    oracle: &dyn SemanticOracle,
    cx: &SemanticContext<'_>,
    decl: &Declaration,
) -> BTreeSet<usize> {
    let mut pending = BTreeSet::new();
    let mut position = 0;
    decl.for_each_expr(&mut |expr| {
        if let Expr::Cast { target, operand } = expr {
            if can_annotate(oracle, target, cx) && oracle.may_be_absent(operand, cx) {
                pending.insert(position);
            }
            position += 1;
        }
    });
    pending
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use crate::oracle::ModelOracle;
    use crate::program::{Program, SourceFile};
    use crate::rewrite::ConflictLog;
    use crate::syntax::{FieldDecl, MethodDecl, ParamDecl, Stmt};
    use crate::types::TypeSyntax;

    fn ty(text: &str) -> TypeSyntax {
        TypeSyntax::parse(text).unwrap()
    }

    fn apply(decl: Declaration) -> Rewrite {
        let key = decl.key();
        let program = Program::new().with_file(SourceFile::new("C.cs", vec![decl]));
        let oracle = ModelOracle::new();
        let graph = GraphBuilder::new(&oracle).build(program).unwrap();
        let entity = graph.entity(&key).unwrap().clone();
        let decl = graph.store().current_declaration(&entity).unwrap();
        let mut conflicts = ConflictLog::new();
        let mut cx = PassContext::new(&graph, &oracle, &mut conflicts);
        CastTargetPass.rewrite(&mut cx, &entity, &decl).unwrap()
    }

    fn cast_targets(decl: &Declaration) -> Vec<String> {
        let mut out = Vec::new();
        decl.for_each_expr(&mut |expr| {
            if let Expr::Cast { target, .. } = expr {
                out.push(target.to_string());
            }
        });
        out
    }

    #[test]
    fn nested_casts_resolve_outward() {
        let method = MethodDecl::new("C", "M")
            .with_params(vec![ParamDecl::new("o", ty("object?"))])
            .with_body(vec![Stmt::expr(Expr::cast(
                ty("string"),
                Expr::cast(ty("object"), Expr::param("o")),
            ))]);
        let Rewrite::Changed(decl) = apply(Declaration::Method(method)) else {
            panic!("expected a change");
        };
        assert_eq!(cast_targets(&decl), vec!["string?", "object?"]);
    }

    #[test]
    fn value_type_casts_are_skipped() {
        let field = FieldDecl::new("C", "n", ty("object"))
            .with_initializer(Expr::cast(ty("int"), Expr::Null));
        assert_eq!(apply(Declaration::Field(field)), Rewrite::Unchanged);
    }
}
