//! Propagation along override and interface-implementation edges.
//!
//! Parameters flow down (a base parameter that accepts absence forces every
//! overrider to accept it too). Return values flow up (an overrider that may
//! return absence forces its bases to admit it).

use super::{annotate_slot, inheritance_return_fan_out, parameter_fan_out};
use crate::error::NullpropResult;
use crate::graph::DependencyKind;
use crate::oracle::can_annotate;
use crate::rewrite::{Obligation, PassContext, Rewrite, RewriteCapability, RewritePass, Slot};
use crate::signature::EntityKind;
use crate::store::Entity;
use crate::syntax::Declaration;

/// Annotates parameter `i` when a base or interface declaration's parameter
/// `i` is annotated.
#[derive(Debug, Clone, Copy, Default)]
pub struct InheritanceParameterPass;

impl RewritePass for InheritanceParameterPass {
    fn name(&self) -> &'static str {
        "inheritance-parameter"
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
        let store = cx.store();
        let mut absent = vec![false; method.params.len()];
        for base in cx
            .graph()
            .parents(&entity.key, Some(DependencyKind::Inheritance))
        {
            let Some(signature) = store.model().symbol(&base.key) else {
                continue;
            };
            for (slot, ty) in absent.iter_mut().zip(&signature.params) {
                *slot |= ty.nullable;
            }
        }
        if !absent.contains(&true) {
            return Ok(Rewrite::Unchanged);
        }

        let own = store.current_context(entity)?;
        let oracle = cx.oracle();
        let mut edited = method.clone();
        for (index, param) in edited.params.iter_mut().enumerate() {
            if absent[index] && can_annotate(oracle, &param.ty, &own) {
                let slot = Slot::Parameter {
                    index,
                    name: param.name.clone(),
                };
                let contract = param.contract;
                annotate_slot(cx, self.name(), &entity.key, slot, contract, &mut param.ty);
            }
        }
        Ok(Rewrite::compare(decl, Declaration::Method(edited)))
    }

    fn additional_rewrites(&self, cx: &PassContext<'_>, entity: &Entity) -> Vec<Obligation> {
        parameter_fan_out(cx.graph(), entity)
    }
}

/// Annotates a base or interface member's return (or property type) when
/// any overrider or implementer has it annotated.
#[derive(Debug, Clone, Copy, Default)]
pub struct InheritanceReturnPass;

impl RewritePass for InheritanceReturnPass {
    fn name(&self) -> &'static str {
        "inheritance-return"
    }

    fn triggers(&self) -> RewriteCapability {
        RewriteCapability::RETURN_VALUE_CHANGE
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
        let own = store.current_context(entity)?;
        let Some(ty) = decl.value_type() else {
            return Ok(Rewrite::Unchanged);
        };
        if !can_annotate(cx.oracle(), ty, &own) {
            return Ok(Rewrite::Unchanged);
        }

        let overridden_as_absent = cx
            .graph()
            .children(&entity.key, Some(DependencyKind::Inheritance))
            .into_iter()
            .filter_map(|derived| store.model().symbol(&derived.key))
            .any(|signature| signature.ty.as_ref().is_some_and(|t| t.nullable));
        if !overridden_as_absent {
            return Ok(Rewrite::Unchanged);
        }

        let mut edited = decl.clone();
        let contract = edited.value_contract();
        if let Some(ty) = edited.value_type_mut() {
            annotate_slot(cx, self.name(), &entity.key, Slot::Return, contract, ty);
        }
        Ok(Rewrite::compare(decl, edited))
    }

    fn additional_rewrites(&self, cx: &PassContext<'_>, entity: &Entity) -> Vec<Obligation> {
        inheritance_return_fan_out(cx.graph(), entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use crate::oracle::ModelOracle;
    use crate::program::{Program, SourceFile};
    use crate::rewrite::ConflictLog;
    use crate::signature::EntityKey;
    use crate::syntax::{MethodDecl, ParamDecl};
    use crate::types::TypeSyntax;

    fn string() -> TypeSyntax {
        TypeSyntax::named("string")
    }

    fn hierarchy(base_param: TypeSyntax, derived_return: TypeSyntax) -> Program {
        Program::new().with_file(SourceFile::new(
            "Shapes.cs",
            vec![
                Declaration::Method(
                    MethodDecl::new("Shape", "Describe")
                        .with_params(vec![ParamDecl::new("prefix", base_param)])
                        .returning(string())
                        .abstract_member(),
                ),
                Declaration::Method(
                    MethodDecl::new("Circle", "Describe")
                        .with_params(vec![ParamDecl::new("prefix", string())])
                        .returning(derived_return)
                        .overriding("M:Shape.Describe(string)"),
                ),
            ],
        ))
    }

    fn apply(pass: &dyn RewritePass, program: Program, key: &str) -> Rewrite {
        let oracle = ModelOracle::new();
        let graph = GraphBuilder::new(&oracle).build(program).unwrap();
        let entity = graph.entity(&EntityKey::new(key)).unwrap().clone();
        let decl = graph.store().current_declaration(&entity).unwrap();
        let mut conflicts = ConflictLog::new();
        let mut cx = PassContext::new(&graph, &oracle, &mut conflicts);
        pass.rewrite(&mut cx, &entity, &decl).unwrap()
    }

    #[test]
    fn base_parameter_flows_to_overrider() {
        let program = hierarchy(string().annotated(), string());
        let rewrite = apply(&InheritanceParameterPass, program, "M:Circle.Describe(string)");
        let Rewrite::Changed(Declaration::Method(m)) = rewrite else {
            panic!("expected a change");
        };
        assert!(m.params[0].ty.nullable);
    }

    #[test]
    fn overrider_parameter_does_not_flow_to_base() {
        let program = Program::new().with_file(SourceFile::new(
            "Shapes.cs",
            vec![
                Declaration::Method(
                    MethodDecl::new("Shape", "Scale")
                        .with_params(vec![ParamDecl::new("by", string())])
                        .abstract_member(),
                ),
                Declaration::Method(
                    MethodDecl::new("Circle", "Scale")
                        .with_params(vec![ParamDecl::new("by", string().annotated())])
                        .overriding("M:Shape.Scale(string)"),
                ),
            ],
        ));
        let rewrite = apply(&InheritanceParameterPass, program, "M:Shape.Scale(string)");
        assert_eq!(rewrite, Rewrite::Unchanged);
    }

    #[test]
    fn overrider_return_flows_to_base() {
        let program = hierarchy(string(), string().annotated());
        let rewrite = apply(&InheritanceReturnPass, program, "M:Shape.Describe(string)");
        let Rewrite::Changed(Declaration::Method(m)) = rewrite else {
            panic!("expected a change");
        };
        assert!(m.returns.unwrap().nullable);
    }

    #[test]
    fn base_return_does_not_flow_to_overrider() {
        let program = Program::new().with_file(SourceFile::new(
            "Shapes.cs",
            vec![
                Declaration::Method(
                    MethodDecl::new("Shape", "Name")
                        .returning(string().annotated())
                        .abstract_member(),
                ),
                Declaration::Method(
                    MethodDecl::new("Circle", "Name")
                        .returning(string())
                        .overriding("M:Shape.Name()"),
                ),
            ],
        ));
        let rewrite = apply(&InheritanceReturnPass, program, "M:Circle.Name()");
        assert_eq!(rewrite, Rewrite::Unchanged);
    }
}
