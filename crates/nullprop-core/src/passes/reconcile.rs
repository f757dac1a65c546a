//! Reconciliation with base signatures as they were declared.

use super::{annotate_slot, parameter_fan_out, return_fan_out};
use crate::error::NullpropResult;
use crate::graph::DependencyKind;
use crate::oracle::{can_annotate, SymbolNullability};
use crate::rewrite::{Obligation, PassContext, Rewrite, RewriteCapability, RewritePass, Slot};
use crate::signature::EntityKind;
use crate::store::Entity;
use crate::syntax::Declaration;
use crate::types::TypeSyntax;

/// Brings an overrider in line with its base member's *declared* signature.
///
/// `abstract string? F()` overridden by `override string F()` leaves the
/// override out of step with its contract; this pass annotates the override.
/// Only declared signatures are consulted (the program as loaded, plus
/// external metadata), never annotations added during the run, so the
/// pass runs once per entity during seeding and has no drain triggers.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredBasePass;

impl RewritePass for DeclaredBasePass {
    fn name(&self) -> &'static str {
        "declared-base"
    }

    fn triggers(&self) -> RewriteCapability {
        RewriteCapability::NONE
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
        let store = cx.store();
        let oracle = cx.oracle();
        let bases = cx
            .graph()
            .parents(&entity.key, Some(DependencyKind::Inheritance));
        if bases.is_empty() {
            return Ok(Rewrite::Unchanged);
        }

        let param_count = decl.as_method().map_or(0, |m| m.params.len());
        let mut params = vec![false; param_count];
        let mut value = false;
        for base in bases {
            let Some(declared) = store.model().declared(&base.key) else {
                continue;
            };
            let annotated = |ty: &TypeSyntax| {
                oracle.declared_symbol_nullability(ty) == SymbolNullability::Annotated
            };
            value |= declared.ty.as_ref().is_some_and(annotated);
            for (slot, ty) in params.iter_mut().zip(&declared.params) {
                *slot |= annotated(ty);
            }
        }
        if !value && !params.contains(&true) {
            return Ok(Rewrite::Unchanged);
        }

        let own = store.current_context(entity)?;
        let mut edited = decl.clone();
        if let Declaration::Method(m) = &mut edited {
            for (index, param) in m.params.iter_mut().enumerate() {
                if params[index] && can_annotate(oracle, &param.ty, &own) {
                    let slot = Slot::Parameter {
                        index,
                        name: param.name.clone(),
                    };
                    let contract = param.contract;
                    annotate_slot(cx, self.name(), &entity.key, slot, contract, &mut param.ty);
                }
            }
        }
        if value {
            let contract = edited.value_contract();
            if let Some(ty) = edited.value_type_mut() {
                if can_annotate(oracle, ty, &own) {
                    annotate_slot(cx, self.name(), &entity.key, Slot::Return, contract, ty);
                }
            }
        }
        Ok(Rewrite::compare(decl, edited))
    }

    fn additional_rewrites(&self, cx: &PassContext<'_>, entity: &Entity) -> Vec<Obligation> {
        let mut out = parameter_fan_out(cx.graph(), entity);
        out.extend(return_fan_out(cx.graph(), entity));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use crate::oracle::ModelOracle;
    use crate::program::{ExternalSymbol, Program, SourceFile};
    use crate::rewrite::ConflictLog;
    use crate::signature::EntityKey;
    use crate::syntax::{MethodDecl, PropertyDecl};

    fn string() -> TypeSyntax {
        TypeSyntax::named("string")
    }

    fn apply(program: Program, key: &str) -> Rewrite {
        let oracle = ModelOracle::new();
        let graph = GraphBuilder::new(&oracle).build(program).unwrap();
        let entity = graph.entity(&EntityKey::new(key)).unwrap().clone();
        let decl = graph.store().current_declaration(&entity).unwrap();
        let mut conflicts = ConflictLog::new();
        let mut cx = PassContext::new(&graph, &oracle, &mut conflicts);
        DeclaredBasePass.rewrite(&mut cx, &entity, &decl).unwrap()
    }

    #[test]
    fn override_adopts_declared_annotated_return() {
        let program = Program::new().with_file(SourceFile::new(
            "A.cs",
            vec![
                Declaration::Method(
                    MethodDecl::new("A", "F")
                        .returning(string().annotated())
                        .abstract_member(),
                ),
                Declaration::Method(
                    MethodDecl::new("B", "F")
                        .returning(string())
                        .overriding("M:A.F()"),
                ),
            ],
        ));
        let Rewrite::Changed(Declaration::Method(m)) = apply(program, "M:B.F()") else {
            panic!("expected a change");
        };
        assert!(m.returns.unwrap().nullable);
    }

    #[test]
    fn implementer_adopts_external_interface_property() {
        let program = Program::new()
            .with_file(SourceFile::new(
                "Widget.cs",
                vec![Declaration::Property(
                    PropertyDecl::new("Widget", "Label", string())
                        .implementing("P:ILabeled.Label"),
                )],
            ))
            .with_external(
                ExternalSymbol::new("P:ILabeled.Label").returning(string().annotated()),
            );
        assert!(apply(program, "P:Widget.Label").is_changed());
    }
}
