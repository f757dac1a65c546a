//! The semantic oracle contract and its model-backed implementation.
//!
//! Passes never decide "can this be absent" on their own; they ask a
//! [`SemanticOracle`]. A compiler front end can implement the trait
//! directly. [`ModelOracle`] implements it over the program model and the
//! [`SemanticModel`](crate::semantic::SemanticModel), reading the *current*
//! annotation of every referenced slot, so answers change as propagation
//! proceeds.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::semantic::SemanticContext;
use crate::signature::EntityKey;
use crate::syntax::{Declaration, Expr, TypeConstraint};
use crate::types::TypeSyntax;

/// Constraints that matter when deciding whether a type parameter can carry
/// the annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GenericConstraints {
    /// `where T : class`
    pub has_class_constraint: bool,
    /// `where T : SomeReferenceType`
    pub has_reference_type_constraint: bool,
    /// `where T : struct`
    pub has_value_type_constraint: bool,
}

impl GenericConstraints {
    /// Whether `T?` means "may be absent" for this type parameter.
    pub fn admits_annotation(&self) -> bool {
        self.has_class_constraint || self.has_reference_type_constraint
    }
}

/// Nullability of a compiled (declared) signature slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolNullability {
    Annotated,
    Unannotated,
}

/// Answers semantic questions on behalf of the passes.
pub trait SemanticOracle {
    /// Whether the value of `expr` may be absent.
    fn may_be_absent(&self, expr: &Expr, cx: &SemanticContext<'_>) -> bool;

    fn is_value_type(&self, ty: &TypeSyntax, cx: &SemanticContext<'_>) -> bool;

    fn is_reference_type(&self, ty: &TypeSyntax, cx: &SemanticContext<'_>) -> bool;

    /// The member `member` overrides, if any.
    fn declared_overrides(&self, member: &Declaration) -> Option<EntityKey>;

    /// Interface members `member` implements.
    fn implemented_interface_members(&self, member: &Declaration) -> BTreeSet<EntityKey>;

    /// Constraints of the type parameter `name`, or `None` if `name` is not a
    /// type parameter in scope.
    fn generic_parameter_constraints(
        &self,
        name: &str,
        cx: &SemanticContext<'_>,
    ) -> Option<GenericConstraints>;

    /// Nullability of a compiled signature slot.
    fn declared_symbol_nullability(&self, ty: &TypeSyntax) -> SymbolNullability;
}

/// Whether `ty` can take the "may be absent" annotation.
///
/// A slot qualifies when it is not already annotated, is not `void`, and is
/// either a type parameter with a class or reference-type constraint or a
/// reference type. Unconstrained type parameters never qualify: `T?` on an
/// unconstrained `T` does not mean "may be absent" for value-type arguments.
pub fn can_annotate(
    oracle: &dyn SemanticOracle,
    ty: &TypeSyntax,
    cx: &SemanticContext<'_>,
) -> bool {
    if ty.nullable || ty.is_void() {
        return false;
    }
    if let Some(constraints) = oracle.generic_parameter_constraints(&ty.name, cx) {
        return constraints.admits_annotation();
    }
    !oracle.is_value_type(ty, cx) && oracle.is_reference_type(ty, cx)
}

/// Bound on implicitly typed local chains (`var a = b; var b = a;`).
const MAX_LOCAL_DEPTH: usize = 32;

/// [`SemanticOracle`] over the program model.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelOracle;

impl ModelOracle {
    pub fn new() -> Self {
        ModelOracle
    }

    fn absent(&self, expr: &Expr, cx: &SemanticContext<'_>, depth: usize) -> bool {
        match expr {
            Expr::Null => true,
            Expr::Default { ty: None } => true,
            Expr::Default { ty: Some(ty) } => !self.is_value_type(ty, cx),
            Expr::Literal { .. } | Expr::New { .. } | Expr::Opaque => false,
            Expr::As { target, .. } => !self.is_value_type(target, cx),
            Expr::Param { name } => cx.param_type(name).is_some_and(|ty| ty.nullable),
            Expr::Local { name } => match cx.local(name) {
                Some(local) => match local.ty {
                    Some(ty) => ty.nullable,
                    None if depth < MAX_LOCAL_DEPTH => local
                        .init
                        .is_some_and(|init| self.absent(init, cx, depth + 1)),
                    None => false,
                },
                None => false,
            },
            Expr::Member { target } => cx
                .model()
                .symbol(target)
                .and_then(|sig| sig.ty.as_ref())
                .is_some_and(|ty| ty.nullable),
            Expr::Call { callee, .. } => cx
                .model()
                .symbol(callee)
                .and_then(|sig| sig.ty.as_ref())
                .is_some_and(|ty| ty.nullable),
            Expr::Cast { target, operand } => {
                if self.is_value_type(target, cx) {
                    false
                } else {
                    target.nullable || self.absent(operand, cx, depth)
                }
            }
            Expr::Conditional {
                when_true,
                when_false,
            } => self.absent(when_true, cx, depth) || self.absent(when_false, cx, depth),
            Expr::Coalesce { right, .. } => self.absent(right, cx, depth),
        }
    }
}

impl SemanticOracle for ModelOracle {
    fn may_be_absent(&self, expr: &Expr, cx: &SemanticContext<'_>) -> bool {
        self.absent(expr, cx, 0)
    }

    fn is_value_type(&self, ty: &TypeSyntax, cx: &SemanticContext<'_>) -> bool {
        if let Some(constraints) = self.generic_parameter_constraints(&ty.name, cx) {
            return constraints.has_value_type_constraint;
        }
        cx.model().is_value_type_name(&ty.name)
    }

    fn is_reference_type(&self, ty: &TypeSyntax, cx: &SemanticContext<'_>) -> bool {
        if ty.is_void() {
            return false;
        }
        if let Some(constraints) = self.generic_parameter_constraints(&ty.name, cx) {
            return constraints.admits_annotation();
        }
        !cx.model().is_value_type_name(&ty.name)
    }

    fn declared_overrides(&self, member: &Declaration) -> Option<EntityKey> {
        member.overrides().cloned()
    }

    fn implemented_interface_members(&self, member: &Declaration) -> BTreeSet<EntityKey> {
        member.implements().iter().cloned().collect()
    }

    fn generic_parameter_constraints(
        &self,
        name: &str,
        cx: &SemanticContext<'_>,
    ) -> Option<GenericConstraints> {
        let param = cx.type_param(name)?;
        let mut constraints = GenericConstraints::default();
        for constraint in &param.constraints {
            match constraint {
                TypeConstraint::Class => constraints.has_class_constraint = true,
                TypeConstraint::Struct => constraints.has_value_type_constraint = true,
                TypeConstraint::NotNull => {}
                TypeConstraint::Type(ty) => {
                    if cx.model().is_value_type_name(&ty.name) {
                        constraints.has_value_type_constraint = true;
                    } else {
                        constraints.has_reference_type_constraint = true;
                    }
                }
            }
        }
        Some(constraints)
    }

    fn declared_symbol_nullability(&self, ty: &TypeSyntax) -> SymbolNullability {
        if ty.nullable {
            SymbolNullability::Annotated
        } else {
            SymbolNullability::Unannotated
        }
    }
}
