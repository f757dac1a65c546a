//! Static graph construction from a loaded program.
//!
//! One entity per declaration, one external entity per external symbol, one
//! `Usage` edge per distinct reference, and one `Inheritance` edge from each
//! overridden or implemented member to the member that overrides or
//! implements it. Override and interface relationships come from the oracle.

use tracing::{debug, info};

use crate::error::NullpropResult;
use crate::graph::{DependencyGraph, DependencyKind};
use crate::oracle::SemanticOracle;
use crate::program::Program;
use crate::signature::EntityKey;
use crate::store::{Entity, EntityStore};

/// Builds a [`DependencyGraph`] for a program.
pub struct GraphBuilder<'o> {
    oracle: &'o dyn SemanticOracle,
}

impl<'o> GraphBuilder<'o> {
    pub fn new(oracle: &'o dyn SemanticOracle) -> Self {
        GraphBuilder { oracle }
    }

    /// Take ownership of `program` and build its graph.
    ///
    /// Fails with `DuplicateEntity` if two declarations, or a declaration and
    /// an external symbol, share an identity.
    pub fn build(&self, program: Program) -> NullpropResult<DependencyGraph> {
        let mut entities = Vec::new();
        let mut edges: Vec<(EntityKey, EntityKey, DependencyKind)> = Vec::new();

        for (path, decl) in program.declarations() {
            let key = decl.key();
            for target in decl.referenced_keys() {
                edges.push((key.clone(), target, DependencyKind::Usage));
            }
            if let Some(base) = self.oracle.declared_overrides(decl) {
                edges.push((base, key.clone(), DependencyKind::Inheritance));
            }
            for member in self.oracle.implemented_interface_members(decl) {
                edges.push((member, key.clone(), DependencyKind::Inheritance));
            }
            entities.push(Entity::declared(path, decl));
        }
        let externals: Vec<EntityKey> =
            program.externals().iter().map(|e| e.key.clone()).collect();

        let mut graph = DependencyGraph::new(EntityStore::new(program));
        for entity in entities {
            graph.add_entity(entity)?;
        }
        for key in externals {
            graph.add_external_entity(key)?;
        }
        for (from, to, kind) in edges {
            if !graph.add_dependency(from.clone(), to.clone(), kind) {
                debug!(%from, %to, %kind, "duplicate edge");
            }
        }

        info!(
            entities = graph.entity_count(),
            edges = graph.edge_count(),
            "built dependency graph"
        );
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NullpropError;
    use crate::oracle::ModelOracle;
    use crate::program::{ExternalSymbol, SourceFile};
    use crate::syntax::{Declaration, Expr, FieldDecl, MethodDecl, ParamDecl, Stmt};
    use crate::types::TypeSyntax;

    fn string() -> TypeSyntax {
        TypeSyntax::named("string")
    }

    fn program() -> Program {
        Program::new()
            .with_file(SourceFile::new(
                "Base.cs",
                vec![Declaration::Method(
                    MethodDecl::new("Base", "Get").returning(string()).abstract_member(),
                )],
            ))
            .with_file(SourceFile::new(
                "Impl.cs",
                vec![
                    Declaration::Field(FieldDecl::new("Impl", "cache", string())),
                    Declaration::Method(
                        MethodDecl::new("Impl", "Get")
                            .returning(string())
                            .overriding("M:Base.Get()")
                            .with_body(vec![
                                Stmt::assign_member(
                                    "F:Impl.cache",
                                    Expr::call("M:Lib.Read()", vec![]),
                                ),
                                Stmt::expr(Expr::call("M:Impl.Log(string)", vec![Expr::Null])),
                                Stmt::expr(Expr::call("M:Impl.Log(string)", vec![Expr::Null])),
                                Stmt::ret(Expr::member("F:Impl.cache")),
                            ]),
                    ),
                    Declaration::Method(
                        MethodDecl::new("Impl", "Log")
                            .with_params(vec![ParamDecl::new("message", string())]),
                    ),
                ],
            ))
            .with_external(ExternalSymbol::new("M:Lib.Read()").returning(string()))
    }

    #[test]
    fn builds_entities_and_edges() {
        let oracle = ModelOracle::new();
        let graph = GraphBuilder::new(&oracle).build(program()).unwrap();
        assert_eq!(graph.entity_count(), 5);

        let get = EntityKey::new("M:Impl.Get()");
        let callees: Vec<String> = graph
            .children(&get, Some(DependencyKind::Usage))
            .into_iter()
            .map(|e| e.key.to_string())
            .collect();
        assert_eq!(
            callees,
            vec!["M:Lib.Read()", "M:Impl.Log(string)", "F:Impl.cache"]
        );

        let bases = graph.parents(&get, Some(DependencyKind::Inheritance));
        assert_eq!(bases.len(), 1);
        assert_eq!(bases[0].key.as_str(), "M:Base.Get()");

        let external = graph.entity(&EntityKey::new("M:Lib.Read()")).unwrap();
        assert!(external.is_external());
    }

    #[test]
    fn duplicate_declarations_are_fatal() {
        let decl = Declaration::Method(MethodDecl::new("C", "M"));
        let program = Program::new().with_file(SourceFile::new("C.cs", vec![decl.clone(), decl]));
        let oracle = ModelOracle::new();
        let err = GraphBuilder::new(&oracle).build(program).unwrap_err();
        assert!(matches!(err, NullpropError::DuplicateEntity { .. }));
    }
}
