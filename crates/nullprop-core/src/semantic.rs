//! Semantic model: the derived, whole-program symbol view.
//!
//! The [`SemanticModel`] is what the oracle reads. It is derived from the
//! [`Program`] and must be recomputed after every mutation that changes
//! content; the store does this in `apply_mutation`. Each rebuild bumps
//! [`SemanticModel::generation`].
//!
//! Two signature tables are kept:
//! - **current**: signatures as the program reads right now
//! - **declared**: signatures as first loaded, plus external metadata
//!
//! The declared table never changes after the first build and is shared
//! between generations.
//!
//! Type parameters of generic containers are indexed by container name: the
//! names spelled in the container (`Box<T>`), with constraints from the
//! program's generic type table.

use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use crate::program::{Program, SourceFile};
use crate::signature::{EntityKey, EntityKind};
use crate::syntax::{walk_stmts, Declaration, Expr, MethodDecl, Stmt, TypeParam};
use crate::types::TypeSyntax;

/// Built-in value type names.
pub const BUILTIN_VALUE_TYPES: &[&str] = &[
    "bool", "byte", "sbyte", "char", "decimal", "double", "float", "int", "uint", "long",
    "ulong", "short", "ushort", "nint", "nuint", "Guid", "DateTime", "TimeSpan",
];

/// Signature of one symbol as seen by the semantic model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolSignature {
    pub kind: EntityKind,
    /// Return type (methods) or declared type (fields, properties, events).
    pub ty: Option<TypeSyntax>,
    pub params: Vec<TypeSyntax>,
}

impl SymbolSignature {
    fn of(decl: &Declaration) -> Self {
        let params = match decl {
            Declaration::Method(m) => m.params.iter().map(|p| p.ty.clone()).collect(),
            _ => Vec::new(),
        };
        SymbolSignature {
            kind: decl.kind(),
            ty: decl.value_type().cloned(),
            params,
        }
    }
}

/// Whole-program symbol table.
#[derive(Debug, Clone)]
pub struct SemanticModel {
    generation: u64,
    symbols: HashMap<EntityKey, SymbolSignature>,
    declared: Rc<HashMap<EntityKey, SymbolSignature>>,
    value_types: BTreeSet<String>,
    container_type_params: Rc<HashMap<String, Vec<TypeParam>>>,
}

impl SemanticModel {
    /// Build the first generation; current and declared tables start equal.
    pub fn build(program: &Program) -> Self {
        let symbols = collect_symbols(program);
        SemanticModel {
            generation: 0,
            declared: Rc::new(symbols.clone()),
            symbols,
            value_types: collect_value_types(program),
            container_type_params: Rc::new(collect_container_type_params(program)),
        }
    }

    /// Rebuild after a mutation, keeping the declared table.
    pub fn rebuild(&self, program: &Program) -> Self {
        SemanticModel {
            generation: self.generation + 1,
            symbols: collect_symbols(program),
            declared: Rc::clone(&self.declared),
            value_types: collect_value_types(program),
            container_type_params: Rc::clone(&self.container_type_params),
        }
    }

    /// Number of rebuilds since the first build.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Current signature of a symbol.
    pub fn symbol(&self, key: &EntityKey) -> Option<&SymbolSignature> {
        self.symbols.get(key)
    }

    /// Declared (as-loaded or metadata) signature of a symbol.
    pub fn declared(&self, key: &EntityKey) -> Option<&SymbolSignature> {
        self.declared.get(key)
    }

    /// Whether `name` names a value type.
    pub fn is_value_type_name(&self, name: &str) -> bool {
        self.value_types.contains(name)
    }

    /// Type parameters declared by a containing type.
    pub fn container_type_params(&self, container: &str) -> &[TypeParam] {
        self.container_type_params
            .get(container)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

fn collect_symbols(program: &Program) -> HashMap<EntityKey, SymbolSignature> {
    let mut symbols = HashMap::new();
    for external in program.externals() {
        symbols.insert(
            external.key.clone(),
            SymbolSignature {
                kind: EntityKind::ExternalMethod,
                ty: external.returns.clone(),
                params: external.params.clone(),
            },
        );
    }
    for (_, decl) in program.declarations() {
        symbols.insert(decl.key(), SymbolSignature::of(decl));
    }
    symbols
}

fn collect_value_types(program: &Program) -> BTreeSet<String> {
    BUILTIN_VALUE_TYPES
        .iter()
        .map(|s| s.to_string())
        .chain(program.value_types().iter().cloned())
        .collect()
}

fn collect_container_type_params(program: &Program) -> HashMap<String, Vec<TypeParam>> {
    let mut table: HashMap<String, Vec<TypeParam>> = HashMap::new();
    for (_, decl) in program.declarations() {
        let container = decl.container();
        if table.contains_key(container) {
            continue;
        }
        let spelled: Vec<TypeParam> = spelled_type_params(container)
            .into_iter()
            .map(TypeParam::new)
            .collect();
        if !spelled.is_empty() {
            table.insert(container.to_string(), spelled);
        }
    }
    for generic in program.generic_types() {
        let params = table.entry(generic.name.clone()).or_default();
        for declared in &generic.type_params {
            match params.iter_mut().find(|p| p.name == declared.name) {
                Some(existing) => *existing = declared.clone(),
                None => params.push(declared.clone()),
            }
        }
    }
    table
}

/// Type parameter names spelled in a container name: `Box<T>` declares `T`
/// and `Outer<K>.Inner<V>` declares `K` and `V`. Arguments that are not plain
/// identifiers are ignored.
fn spelled_type_params(container: &str) -> Vec<String> {
    fn flush(current: &mut String, nested: &mut bool, names: &mut Vec<String>) {
        let name = current.trim();
        let plain = !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_');
        if plain && !*nested {
            names.push(name.to_string());
        }
        current.clear();
        *nested = false;
    }

    let mut names = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    let mut nested = false;
    for ch in container.chars() {
        match ch {
            '<' => {
                depth += 1;
                if depth > 1 {
                    nested = true;
                }
            }
            '>' => {
                if depth == 1 {
                    flush(&mut current, &mut nested, &mut names);
                }
                depth = depth.saturating_sub(1);
            }
            ',' if depth == 1 => flush(&mut current, &mut nested, &mut names),
            _ if depth == 1 => current.push(ch),
            _ => {}
        }
    }
    names
}

// ============================================================================
// Semantic Context
// ============================================================================

/// What the oracle knows about a local variable.
#[derive(Debug, Clone, Copy)]
pub struct LocalInfo<'a> {
    /// Declared type; `None` for implicitly typed locals.
    pub ty: Option<&'a TypeSyntax>,
    pub init: Option<&'a Expr>,
}

/// Semantic view of one file, optionally scoped to one declaration.
///
/// A context borrows the store, so it can never outlive a mutation.
#[derive(Debug, Clone, Copy)]
pub struct SemanticContext<'a> {
    model: &'a SemanticModel,
    file: &'a SourceFile,
    scope: Option<&'a Declaration>,
}

impl<'a> SemanticContext<'a> {
    pub fn new(model: &'a SemanticModel, file: &'a SourceFile) -> Self {
        SemanticContext {
            model,
            file,
            scope: None,
        }
    }

    /// The same view with locals and parameters resolved against `decl`.
    pub fn within(self, decl: &'a Declaration) -> Self {
        SemanticContext {
            scope: Some(decl),
            ..self
        }
    }

    pub fn model(&self) -> &'a SemanticModel {
        self.model
    }

    pub fn file(&self) -> &'a SourceFile {
        self.file
    }

    pub fn scope(&self) -> Option<&'a Declaration> {
        self.scope
    }

    fn scope_method(&self) -> Option<&'a MethodDecl> {
        self.scope.and_then(Declaration::as_method)
    }

    /// Parameter type in the current scope.
    pub fn param_type(&self, name: &str) -> Option<&'a TypeSyntax> {
        self.scope_method()
            .and_then(|m| m.params.iter().find(|p| p.name == name))
            .map(|p| &p.ty)
    }

    /// First local declaration with `name` in the current scope.
    pub fn local(&self, name: &str) -> Option<LocalInfo<'a>> {
        let body = self.scope?.body()?;
        let mut found = None;
        walk_stmts(body, &mut |stmt| {
            if found.is_some() {
                return;
            }
            if let Stmt::Local {
                name: local_name,
                ty,
                init,
            } = stmt
            {
                if local_name == name {
                    found = Some(LocalInfo {
                        ty: ty.as_ref(),
                        init: init.as_ref(),
                    });
                }
            }
        });
        found
    }

    /// Generic type parameter in the current scope: the method's own, then
    /// those of the containing type.
    pub fn type_param(&self, name: &str) -> Option<&'a TypeParam> {
        let scope = self.scope?;
        let own = scope
            .as_method()
            .and_then(|m| m.type_params.iter().find(|tp| tp.name == name));
        own.or_else(|| {
            self.model
                .container_type_params(scope.container())
                .iter()
                .find(|tp| tp.name == name)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{ExternalSymbol, GenericType};
    use crate::syntax::{FieldDecl, ParamDecl, TypeConstraint};

    fn program() -> Program {
        Program::new()
            .with_file(SourceFile::new(
                "C.cs",
                vec![
                    Declaration::Field(FieldDecl::new("C", "f", TypeSyntax::named("string"))),
                    Declaration::Method(
                        MethodDecl::new("C", "F")
                            .with_params(vec![ParamDecl::new("s", TypeSyntax::named("string"))])
                            .with_body(vec![Stmt::local(
                                "x",
                                TypeSyntax::named("string").annotated(),
                                Some(Expr::Null),
                            )]),
                    ),
                ],
            ))
            .with_external(
                ExternalSymbol::new("M:Lib.Get()").returning(TypeSyntax::named("string").annotated()),
            )
    }

    #[test]
    fn build_indexes_locals_and_externals() {
        let model = SemanticModel::build(&program());
        assert_eq!(model.generation(), 0);
        let field = model.symbol(&EntityKey::new("F:C.f")).unwrap();
        assert_eq!(field.kind, EntityKind::Field);
        let external = model.symbol(&EntityKey::new("M:Lib.Get()")).unwrap();
        assert!(external.ty.as_ref().unwrap().nullable);
        assert!(model.is_value_type_name("int"));
        assert!(!model.is_value_type_name("string"));
    }

    #[test]
    fn rebuild_keeps_declared_signatures() {
        let mut program = program();
        let model = SemanticModel::build(&program);

        let file = program.file_mut("C.cs").unwrap();
        if let Declaration::Field(f) = &mut file.declarations[0] {
            f.ty.nullable = true;
        }
        let rebuilt = model.rebuild(&program);
        let key = EntityKey::new("F:C.f");
        assert_eq!(rebuilt.generation(), 1);
        assert!(rebuilt.symbol(&key).unwrap().ty.as_ref().unwrap().nullable);
        assert!(!rebuilt.declared(&key).unwrap().ty.as_ref().unwrap().nullable);
    }

    #[test]
    fn scoped_context_resolves_params_and_locals() {
        let program = program();
        let model = SemanticModel::build(&program);
        let file = program.file("C.cs").unwrap();
        let method = &file.declarations[1];
        let cx = SemanticContext::new(&model, file).within(method);

        assert_eq!(cx.param_type("s").unwrap().name, "string");
        let local = cx.local("x").unwrap();
        assert!(local.ty.unwrap().nullable);
        assert_eq!(local.init, Some(&Expr::Null));
        assert!(cx.local("missing").is_none());
    }

    #[test]
    fn container_names_spell_their_type_params() {
        assert_eq!(spelled_type_params("Box<T>"), vec!["T"]);
        assert_eq!(spelled_type_params("Map<K, V>"), vec!["K", "V"]);
        assert_eq!(spelled_type_params("Outer<K>.Inner<V>"), vec!["K", "V"]);
        assert_eq!(spelled_type_params("Wrap<List<T>>"), Vec::<String>::new());
        assert!(spelled_type_params("Plain").is_empty());
    }

    #[test]
    fn members_see_the_type_params_of_their_container() {
        let program = Program::new()
            .with_file(SourceFile::new(
                "Box.cs",
                vec![
                    Declaration::Field(FieldDecl::new("Box<T>", "value", TypeSyntax::named("T"))),
                    Declaration::Field(FieldDecl::new("Pair", "left", TypeSyntax::named("L"))),
                ],
            ))
            .with_generic_type(GenericType::new(
                "Pair",
                vec![TypeParam::new("L").with_constraint(TypeConstraint::Class)],
            ));
        let model = SemanticModel::build(&program);
        let file = program.file("Box.cs").unwrap();

        let boxed = SemanticContext::new(&model, file).within(&file.declarations[0]);
        assert!(boxed.type_param("T").unwrap().constraints.is_empty());
        assert!(boxed.type_param("L").is_none());

        let pair = SemanticContext::new(&model, file).within(&file.declarations[1]);
        assert_eq!(pair.type_param("L").unwrap().constraints, vec![TypeConstraint::Class]);
    }
}
