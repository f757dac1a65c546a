//! Program model: declarations, statements, and expressions.
//!
//! This is the language-neutral syntax the engine rewrites. It stands in for
//! a compiler front end's syntax trees and is small on purpose: it models
//! only what nullability propagation reads (values flowing into slots) and
//! writes (the `nullable` flag on [`TypeSyntax`]).
//!
//! References between declarations are always by [`EntityKey`], never by
//! pointer, so that any declaration can be replaced without invalidating the
//! others.
//!
//! # Walking
//!
//! [`Declaration::for_each_expr`] visits every expression a declaration owns
//! (bodies, initializers, parameter defaults, constructor-chain arguments),
//! including nested sub-expressions. [`Declaration::for_each_type`] visits
//! every annotatable slot in a fixed order; the store uses it to check that a
//! rewrite only ever adds annotations.

use serde::{Deserialize, Serialize};

use crate::signature::{EntityKey, EntityKind};
use crate::types::TypeSyntax;

// ============================================================================
// Expressions
// ============================================================================

/// An expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "expr", rename_all = "snake_case")]
pub enum Expr {
    /// The literal "absent" value (`null`).
    Null,
    /// `default` or `default(T)`.
    Default {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ty: Option<TypeSyntax>,
    },
    /// A non-absent literal (string, number, boolean).
    Literal { value: String },
    /// A local variable read.
    Local { name: String },
    /// A parameter read.
    Param { name: String },
    /// A field, property, or event read.
    Member { target: EntityKey },
    /// A method call.
    Call {
        callee: EntityKey,
        #[serde(default)]
        args: Vec<Expr>,
    },
    /// Object construction through a constructor.
    New {
        ctor: EntityKey,
        #[serde(default)]
        args: Vec<Expr>,
    },
    /// `(T)operand`.
    Cast {
        target: TypeSyntax,
        operand: Box<Expr>,
    },
    /// `operand as T`.
    As {
        target: TypeSyntax,
        operand: Box<Expr>,
    },
    /// `cond ? when_true : when_false` (condition omitted).
    Conditional {
        when_true: Box<Expr>,
        when_false: Box<Expr>,
    },
    /// `left ?? right`.
    Coalesce { left: Box<Expr>, right: Box<Expr> },
    /// Anything the model does not look into. Never absent.
    Opaque,
}

impl Expr {
    /// String literal helper.
    pub fn literal(value: impl Into<String>) -> Self {
        Expr::Literal {
            value: value.into(),
        }
    }

    /// Local read helper.
    pub fn local(name: impl Into<String>) -> Self {
        Expr::Local { name: name.into() }
    }

    /// Parameter read helper.
    pub fn param(name: impl Into<String>) -> Self {
        Expr::Param { name: name.into() }
    }

    /// Member read helper.
    pub fn member(target: impl Into<EntityKey>) -> Self {
        Expr::Member {
            target: target.into(),
        }
    }

    /// Call helper.
    pub fn call(callee: impl Into<EntityKey>, args: Vec<Expr>) -> Self {
        Expr::Call {
            callee: callee.into(),
            args,
        }
    }

    /// Construction helper.
    pub fn new_object(ctor: impl Into<EntityKey>, args: Vec<Expr>) -> Self {
        Expr::New {
            ctor: ctor.into(),
            args,
        }
    }

    /// Cast helper.
    pub fn cast(target: TypeSyntax, operand: Expr) -> Self {
        Expr::Cast {
            target,
            operand: Box::new(operand),
        }
    }

    /// Visit this expression and all sub-expressions, parents first.
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a Expr)) {
        f(self);
        match self {
            Expr::Call { args, .. } | Expr::New { args, .. } => {
                for arg in args {
                    arg.walk(f);
                }
            }
            Expr::Cast { operand, .. } | Expr::As { operand, .. } => operand.walk(f),
            Expr::Conditional {
                when_true,
                when_false,
            } => {
                when_true.walk(f);
                when_false.walk(f);
            }
            Expr::Coalesce { left, right } => {
                left.walk(f);
                right.walk(f);
            }
            Expr::Null
            | Expr::Default { .. }
            | Expr::Literal { .. }
            | Expr::Local { .. }
            | Expr::Param { .. }
            | Expr::Member { .. }
            | Expr::Opaque => {}
        }
    }

    /// Mutable variant of [`Expr::walk`].
    pub fn walk_mut(&mut self, f: &mut dyn FnMut(&mut Expr)) {
        f(self);
        match self {
            Expr::Call { args, .. } | Expr::New { args, .. } => {
                for arg in args {
                    arg.walk_mut(f);
                }
            }
            Expr::Cast { operand, .. } | Expr::As { operand, .. } => operand.walk_mut(f),
            Expr::Conditional {
                when_true,
                when_false,
            } => {
                when_true.walk_mut(f);
                when_false.walk_mut(f);
            }
            Expr::Coalesce { left, right } => {
                left.walk_mut(f);
                right.walk_mut(f);
            }
            Expr::Null
            | Expr::Default { .. }
            | Expr::Literal { .. }
            | Expr::Local { .. }
            | Expr::Param { .. }
            | Expr::Member { .. }
            | Expr::Opaque => {}
        }
    }

    /// Every cast or `default(T)` target type nested in this expression.
    fn for_each_type<'a>(&'a self, f: &mut dyn FnMut(&'a TypeSyntax)) {
        self.walk(&mut |expr| match expr {
            Expr::Cast { target, .. } | Expr::As { target, .. } => target.for_each(f),
            Expr::Default { ty: Some(ty) } => ty.for_each(f),
            _ => {}
        });
    }
}

// ============================================================================
// Statements
// ============================================================================

/// Target of an assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum AssignTarget {
    Local { name: String },
    Param { name: String },
    Member { member: EntityKey },
}

/// A statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stmt", rename_all = "snake_case")]
pub enum Stmt {
    /// Local declaration. `ty: None` is an implicitly typed (`var`) local.
    Local {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ty: Option<TypeSyntax>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        init: Option<Expr>,
    },
    Assign { target: AssignTarget, value: Expr },
    Return {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Expr>,
    },
    Expr { expr: Expr },
    If {
        condition: Expr,
        #[serde(default)]
        then: Vec<Stmt>,
        #[serde(default)]
        otherwise: Vec<Stmt>,
    },
}

impl Stmt {
    /// Explicitly typed local declaration.
    pub fn local(name: impl Into<String>, ty: TypeSyntax, init: Option<Expr>) -> Self {
        Stmt::Local {
            name: name.into(),
            ty: Some(ty),
            init,
        }
    }

    /// `return value;`
    pub fn ret(value: Expr) -> Self {
        Stmt::Return { value: Some(value) }
    }

    /// Expression statement.
    pub fn expr(expr: Expr) -> Self {
        Stmt::Expr { expr }
    }

    /// Assignment to a member.
    pub fn assign_member(member: impl Into<EntityKey>, value: Expr) -> Self {
        Stmt::Assign {
            target: AssignTarget::Member {
                member: member.into(),
            },
            value,
        }
    }

    /// Assignment to a local.
    pub fn assign_local(name: impl Into<String>, value: Expr) -> Self {
        Stmt::Assign {
            target: AssignTarget::Local { name: name.into() },
            value,
        }
    }
}

/// Visit every statement in `stmts`, recursing into branches.
pub fn walk_stmts<'a>(stmts: &'a [Stmt], f: &mut dyn FnMut(&'a Stmt)) {
    for stmt in stmts {
        f(stmt);
        if let Stmt::If {
            then, otherwise, ..
        } = stmt
        {
            walk_stmts(then, f);
            walk_stmts(otherwise, f);
        }
    }
}

/// Mutable variant of [`walk_stmts`].
pub fn walk_stmts_mut(stmts: &mut [Stmt], f: &mut dyn FnMut(&mut Stmt)) {
    for stmt in stmts.iter_mut() {
        f(stmt);
        if let Stmt::If {
            then, otherwise, ..
        } = stmt
        {
            walk_stmts_mut(then, f);
            walk_stmts_mut(otherwise, f);
        }
    }
}

/// Visit every expression (including sub-expressions) in `stmts`.
pub fn walk_stmt_exprs<'a>(stmts: &'a [Stmt], f: &mut dyn FnMut(&'a Expr)) {
    walk_stmts(stmts, &mut |stmt| match stmt {
        Stmt::Local { init: Some(e), .. }
        | Stmt::Assign { value: e, .. }
        | Stmt::Return { value: Some(e) }
        | Stmt::Expr { expr: e }
        | Stmt::If { condition: e, .. } => e.walk(f),
        Stmt::Local { init: None, .. } | Stmt::Return { value: None } => {}
    });
}

/// Mutable variant of [`walk_stmt_exprs`].
pub fn walk_stmt_exprs_mut(stmts: &mut [Stmt], f: &mut dyn FnMut(&mut Expr)) {
    walk_stmts_mut(stmts, &mut |stmt| match stmt {
        Stmt::Local { init: Some(e), .. }
        | Stmt::Assign { value: e, .. }
        | Stmt::Return { value: Some(e) }
        | Stmt::Expr { expr: e }
        | Stmt::If { condition: e, .. } => e.walk_mut(f),
        Stmt::Local { init: None, .. } | Stmt::Return { value: None } => {}
    });
}

// ============================================================================
// Declarations
// ============================================================================

/// Explicit nullability contract on a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullContract {
    /// No explicit contract.
    #[default]
    None,
    /// Explicitly "never absent" (e.g. a `[NotNull]`/`[DisallowNull]` attribute).
    NotNull,
}

impl NullContract {
    pub fn is_not_null(&self) -> bool {
        matches!(self, NullContract::NotNull)
    }
}

/// Generic type-parameter constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeConstraint {
    /// `where T : class`
    Class,
    /// `where T : struct`
    Struct,
    /// `where T : notnull`
    NotNull,
    /// `where T : SomeType`
    Type(TypeSyntax),
}

/// Generic type parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeParam {
    pub name: String,
    #[serde(default)]
    pub constraints: Vec<TypeConstraint>,
}

impl TypeParam {
    pub fn new(name: impl Into<String>) -> Self {
        TypeParam {
            name: name.into(),
            constraints: Vec::new(),
        }
    }

    pub fn with_constraint(mut self, constraint: TypeConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }
}

/// Method parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamDecl {
    pub name: String,
    pub ty: TypeSyntax,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Expr>,
    #[serde(default)]
    pub contract: NullContract,
}

impl ParamDecl {
    pub fn new(name: impl Into<String>, ty: TypeSyntax) -> Self {
        ParamDecl {
            name: name.into(),
            ty,
            default: None,
            contract: NullContract::None,
        }
    }

    pub fn with_default(mut self, default: Expr) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_contract(mut self, contract: NullContract) -> Self {
        self.contract = contract;
        self
    }
}

/// Ordinary method or constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    #[default]
    Ordinary,
    Constructor,
}

/// Member modifiers that matter to propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Modifiers {
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub is_virtual: bool,
    #[serde(default)]
    pub is_override: bool,
}

/// `: this(...)` or `: base(...)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainKind {
    This,
    Base,
}

/// Constructor initializer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtorInitializer {
    pub kind: ChainKind,
    pub target: EntityKey,
    #[serde(default)]
    pub args: Vec<Expr>,
}

/// Method or constructor declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDecl {
    pub container: String,
    pub name: String,
    #[serde(default)]
    pub kind: MethodKind,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_params: Vec<TypeParam>,
    #[serde(default)]
    pub params: Vec<ParamDecl>,
    /// Return type; `None` for constructors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<TypeSyntax>,
    #[serde(default)]
    pub return_contract: NullContract,
    /// Body; `None` for abstract and interface members.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Vec<Stmt>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initializer: Option<CtorInitializer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<EntityKey>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub implements: Vec<EntityKey>,
}

impl MethodDecl {
    /// New ordinary method returning `void` with an empty body.
    pub fn new(container: impl Into<String>, name: impl Into<String>) -> Self {
        MethodDecl {
            container: container.into(),
            name: name.into(),
            kind: MethodKind::Ordinary,
            modifiers: Modifiers::default(),
            type_params: Vec::new(),
            params: Vec::new(),
            returns: Some(TypeSyntax::void()),
            return_contract: NullContract::None,
            body: Some(Vec::new()),
            initializer: None,
            overrides: None,
            implements: Vec::new(),
        }
    }

    /// New constructor of `container` with an empty body.
    pub fn constructor(container: impl Into<String>) -> Self {
        let container = container.into();
        let name = container
            .rsplit('.')
            .next()
            .unwrap_or(container.as_str())
            .to_string();
        MethodDecl {
            kind: MethodKind::Constructor,
            returns: None,
            ..MethodDecl::new(container, name)
        }
    }

    pub fn with_params(mut self, params: Vec<ParamDecl>) -> Self {
        self.params = params;
        self
    }

    pub fn returning(mut self, ty: TypeSyntax) -> Self {
        self.returns = Some(ty);
        self
    }

    pub fn with_body(mut self, body: Vec<Stmt>) -> Self {
        self.body = Some(body);
        self
    }

    /// Drop the body and mark abstract.
    pub fn abstract_member(mut self) -> Self {
        self.body = None;
        self.modifiers.is_abstract = true;
        self
    }

    pub fn with_type_params(mut self, type_params: Vec<TypeParam>) -> Self {
        self.type_params = type_params;
        self
    }

    pub fn with_initializer(mut self, initializer: CtorInitializer) -> Self {
        self.initializer = Some(initializer);
        self
    }

    pub fn overriding(mut self, base: impl Into<EntityKey>) -> Self {
        self.overrides = Some(base.into());
        self.modifiers.is_override = true;
        self
    }

    pub fn implementing(mut self, member: impl Into<EntityKey>) -> Self {
        self.implements.push(member.into());
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn is_constructor(&self) -> bool {
        self.kind == MethodKind::Constructor
    }

    /// Identity key (`M:Container.Name(params)`).
    pub fn key(&self) -> EntityKey {
        let params: Vec<TypeSyntax> = self.params.iter().map(|p| p.ty.clone()).collect();
        EntityKey::method(&self.container, &self.name, &params)
    }

    /// Index of a parameter by name.
    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }
}

/// Field declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub container: String,
    pub name: String,
    pub ty: TypeSyntax,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initializer: Option<Expr>,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub contract: NullContract,
}

impl FieldDecl {
    pub fn new(container: impl Into<String>, name: impl Into<String>, ty: TypeSyntax) -> Self {
        FieldDecl {
            container: container.into(),
            name: name.into(),
            ty,
            initializer: None,
            is_static: false,
            contract: NullContract::None,
        }
    }

    pub fn with_initializer(mut self, init: Expr) -> Self {
        self.initializer = Some(init);
        self
    }

    pub fn with_contract(mut self, contract: NullContract) -> Self {
        self.contract = contract;
        self
    }
}

/// Property declaration. `getter: None` is an auto-property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDecl {
    pub container: String,
    pub name: String,
    pub ty: TypeSyntax,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub getter: Option<Vec<Stmt>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initializer: Option<Expr>,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(default)]
    pub contract: NullContract,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<EntityKey>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub implements: Vec<EntityKey>,
}

impl PropertyDecl {
    pub fn new(container: impl Into<String>, name: impl Into<String>, ty: TypeSyntax) -> Self {
        PropertyDecl {
            container: container.into(),
            name: name.into(),
            ty,
            getter: None,
            initializer: None,
            modifiers: Modifiers::default(),
            contract: NullContract::None,
            overrides: None,
            implements: Vec::new(),
        }
    }

    pub fn with_getter(mut self, getter: Vec<Stmt>) -> Self {
        self.getter = Some(getter);
        self
    }

    pub fn with_initializer(mut self, init: Expr) -> Self {
        self.initializer = Some(init);
        self
    }

    pub fn overriding(mut self, base: impl Into<EntityKey>) -> Self {
        self.overrides = Some(base.into());
        self.modifiers.is_override = true;
        self
    }

    pub fn implementing(mut self, member: impl Into<EntityKey>) -> Self {
        self.implements.push(member.into());
        self
    }

    pub fn abstract_member(mut self) -> Self {
        self.modifiers.is_abstract = true;
        self
    }

    /// Whether the property stores its value in a compiler-generated slot.
    pub fn is_auto(&self) -> bool {
        self.getter.is_none() && !self.modifiers.is_abstract
    }
}

/// Field-like event declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDecl {
    pub container: String,
    pub name: String,
    pub ty: TypeSyntax,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initializer: Option<Expr>,
    #[serde(default)]
    pub is_static: bool,
}

impl EventDecl {
    pub fn new(container: impl Into<String>, name: impl Into<String>, ty: TypeSyntax) -> Self {
        EventDecl {
            container: container.into(),
            name: name.into(),
            ty,
            initializer: None,
            is_static: false,
        }
    }
}

/// A declaration owned by a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decl", rename_all = "snake_case")]
pub enum Declaration {
    Method(MethodDecl),
    Field(FieldDecl),
    Property(PropertyDecl),
    Event(EventDecl),
}

impl Declaration {
    /// Identity key.
    pub fn key(&self) -> EntityKey {
        match self {
            Declaration::Method(m) => m.key(),
            Declaration::Field(f) => EntityKey::field(&f.container, &f.name),
            Declaration::Property(p) => EntityKey::property(&p.container, &p.name),
            Declaration::Event(e) => EntityKey::event(&e.container, &e.name),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Declaration::Method(_) => EntityKind::Method,
            Declaration::Field(_) => EntityKind::Field,
            Declaration::Property(_) => EntityKind::Property,
            Declaration::Event(_) => EntityKind::Event,
        }
    }

    pub fn container(&self) -> &str {
        match self {
            Declaration::Method(m) => &m.container,
            Declaration::Field(f) => &f.container,
            Declaration::Property(p) => &p.container,
            Declaration::Event(e) => &e.container,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Declaration::Method(m) => &m.name,
            Declaration::Field(f) => &f.name,
            Declaration::Property(p) => &p.name,
            Declaration::Event(e) => &e.name,
        }
    }

    pub fn is_static(&self) -> bool {
        match self {
            Declaration::Method(m) => m.modifiers.is_static,
            Declaration::Field(f) => f.is_static,
            Declaration::Property(p) => p.modifiers.is_static,
            Declaration::Event(e) => e.is_static,
        }
    }

    pub fn as_method(&self) -> Option<&MethodDecl> {
        match self {
            Declaration::Method(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_property(&self) -> Option<&PropertyDecl> {
        match self {
            Declaration::Property(p) => Some(p),
            _ => None,
        }
    }

    /// The value type of this member: return type for methods, declared type
    /// for fields, properties and events.
    pub fn value_type(&self) -> Option<&TypeSyntax> {
        match self {
            Declaration::Method(m) => m.returns.as_ref(),
            Declaration::Field(f) => Some(&f.ty),
            Declaration::Property(p) => Some(&p.ty),
            Declaration::Event(e) => Some(&e.ty),
        }
    }

    /// Mutable access to the value type.
    pub fn value_type_mut(&mut self) -> Option<&mut TypeSyntax> {
        match self {
            Declaration::Method(m) => m.returns.as_mut(),
            Declaration::Field(f) => Some(&mut f.ty),
            Declaration::Property(p) => Some(&mut p.ty),
            Declaration::Event(e) => Some(&mut e.ty),
        }
    }

    /// Explicit contract on the value slot.
    pub fn value_contract(&self) -> NullContract {
        match self {
            Declaration::Method(m) => m.return_contract,
            Declaration::Field(f) => f.contract,
            Declaration::Property(p) => p.contract,
            Declaration::Event(_) => NullContract::None,
        }
    }

    /// Member initializer (fields, properties, events).
    pub fn initializer(&self) -> Option<&Expr> {
        match self {
            Declaration::Method(_) => None,
            Declaration::Field(f) => f.initializer.as_ref(),
            Declaration::Property(p) => p.initializer.as_ref(),
            Declaration::Event(e) => e.initializer.as_ref(),
        }
    }

    /// Statement body: method body or property getter.
    pub fn body(&self) -> Option<&[Stmt]> {
        match self {
            Declaration::Method(m) => m.body.as_deref(),
            Declaration::Property(p) => p.getter.as_deref(),
            Declaration::Field(_) | Declaration::Event(_) => None,
        }
    }

    /// Mutable statement body.
    pub fn body_mut(&mut self) -> Option<&mut Vec<Stmt>> {
        match self {
            Declaration::Method(m) => m.body.as_mut(),
            Declaration::Property(p) => p.getter.as_mut(),
            Declaration::Field(_) | Declaration::Event(_) => None,
        }
    }

    /// Declared override target.
    pub fn overrides(&self) -> Option<&EntityKey> {
        match self {
            Declaration::Method(m) => m.overrides.as_ref(),
            Declaration::Property(p) => p.overrides.as_ref(),
            Declaration::Field(_) | Declaration::Event(_) => None,
        }
    }

    /// Declared interface members this member implements.
    pub fn implements(&self) -> &[EntityKey] {
        match self {
            Declaration::Method(m) => &m.implements,
            Declaration::Property(p) => &p.implements,
            Declaration::Field(_) | Declaration::Event(_) => &[],
        }
    }

    /// Visit every expression owned by this declaration.
    pub fn for_each_expr<'a>(&'a self, f: &mut dyn FnMut(&'a Expr)) {
        match self {
            Declaration::Method(m) => {
                for param in &m.params {
                    if let Some(default) = &param.default {
                        default.walk(f);
                    }
                }
                if let Some(init) = &m.initializer {
                    for arg in &init.args {
                        arg.walk(f);
                    }
                }
                if let Some(body) = &m.body {
                    walk_stmt_exprs(body, f);
                }
            }
            Declaration::Property(p) => {
                if let Some(init) = &p.initializer {
                    init.walk(f);
                }
                if let Some(getter) = &p.getter {
                    walk_stmt_exprs(getter, f);
                }
            }
            Declaration::Field(FieldDecl { initializer, .. })
            | Declaration::Event(EventDecl { initializer, .. }) => {
                if let Some(init) = initializer {
                    init.walk(f);
                }
            }
        }
    }

    /// Mutable variant of [`Declaration::for_each_expr`].
    pub fn for_each_expr_mut(&mut self, f: &mut dyn FnMut(&mut Expr)) {
        match self {
            Declaration::Method(m) => {
                for param in m.params.iter_mut() {
                    if let Some(default) = param.default.as_mut() {
                        default.walk_mut(f);
                    }
                }
                if let Some(init) = m.initializer.as_mut() {
                    for arg in init.args.iter_mut() {
                        arg.walk_mut(f);
                    }
                }
                if let Some(body) = m.body.as_mut() {
                    walk_stmt_exprs_mut(body, f);
                }
            }
            Declaration::Property(p) => {
                if let Some(init) = p.initializer.as_mut() {
                    init.walk_mut(f);
                }
                if let Some(getter) = p.getter.as_mut() {
                    walk_stmt_exprs_mut(getter, f);
                }
            }
            Declaration::Field(FieldDecl { initializer, .. })
            | Declaration::Event(EventDecl { initializer, .. }) => {
                if let Some(init) = initializer.as_mut() {
                    init.walk_mut(f);
                }
            }
        }
    }

    /// Argument lists of every call, construction, or constructor chain in
    /// this declaration that targets `callee`.
    pub fn argument_lists_for<'a>(&'a self, callee: &EntityKey) -> Vec<&'a [Expr]> {
        let mut lists: Vec<&'a [Expr]> = Vec::new();
        if let Declaration::Method(m) = self {
            if let Some(init) = &m.initializer {
                if &init.target == callee {
                    lists.push(&init.args);
                }
            }
        }
        self.for_each_expr(&mut |expr| match expr {
            Expr::Call { callee: c, args } | Expr::New { ctor: c, args } if c == callee => {
                lists.push(args);
            }
            _ => {}
        });
        lists
    }

    /// Every entity key this declaration references.
    pub fn referenced_keys(&self) -> Vec<EntityKey> {
        let mut keys = Vec::new();
        if let Declaration::Method(m) = self {
            if let Some(init) = &m.initializer {
                keys.push(init.target.clone());
            }
        }
        self.for_each_expr(&mut |expr| match expr {
            Expr::Call { callee: key, .. }
            | Expr::New { ctor: key, .. }
            | Expr::Member { target: key } => keys.push(key.clone()),
            _ => {}
        });
        if let Some(body) = self.body() {
            walk_stmts(body, &mut |stmt| {
                if let Stmt::Assign {
                    target: AssignTarget::Member { member },
                    ..
                } = stmt
                {
                    keys.push(member.clone());
                }
            });
        }
        keys
    }

    /// Every value assigned to `member` in this declaration's body.
    pub fn assignments_to<'a>(&'a self, member: &EntityKey) -> Vec<&'a Expr> {
        let mut values = Vec::new();
        if let Some(body) = self.body() {
            walk_stmts(body, &mut |stmt| {
                if let Stmt::Assign {
                    target: AssignTarget::Member { member: m },
                    value,
                } = stmt
                {
                    if m == member {
                        values.push(value);
                    }
                }
            });
        }
        values
    }

    /// Visit every annotatable slot in a fixed order.
    ///
    /// The order is stable across rewrites that only flip annotations, which
    /// lets two versions of the same declaration be compared slot by slot.
    pub fn for_each_type<'a>(&'a self, f: &mut dyn FnMut(&'a TypeSyntax)) {
        match self {
            Declaration::Method(m) => {
                for param in &m.params {
                    param.ty.for_each(f);
                }
                if let Some(ret) = &m.returns {
                    ret.for_each(f);
                }
            }
            Declaration::Field(FieldDecl { ty, .. })
            | Declaration::Property(PropertyDecl { ty, .. })
            | Declaration::Event(EventDecl { ty, .. }) => ty.for_each(f),
        }
        if let Some(body) = self.body() {
            walk_stmts(body, &mut |stmt| {
                if let Stmt::Local { ty: Some(ty), .. } = stmt {
                    ty.for_each(f);
                }
            });
        }
        self.for_each_expr(&mut |expr| expr.for_each_type(f));
    }
}
