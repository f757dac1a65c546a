//! C#-style source rendering of program files.
//!
//! Rendering is for people reviewing a run's result: declarations are grouped
//! by containing type in the order they first appear, and every annotation the
//! run added shows up as a `?` suffix. The output is not meant to be parsed
//! back; the JSON model is the round-trippable form.

use crate::program::SourceFile;
use crate::syntax::{
    AssignTarget, ChainKind, Declaration, EventDecl, Expr, FieldDecl, MethodDecl, Modifiers,
    NullContract, ParamDecl, PropertyDecl, Stmt, TypeConstraint, TypeParam,
};

const INDENT: &str = "    ";

/// Render `file` as C#-style source text.
pub fn render_file(file: &SourceFile) -> String {
    let mut containers: Vec<(&str, Vec<&Declaration>)> = Vec::new();
    for decl in &file.declarations {
        match containers.iter_mut().find(|(name, _)| *name == decl.container()) {
            Some((_, decls)) => decls.push(decl),
            None => containers.push((decl.container(), vec![decl])),
        }
    }

    let mut out = String::new();
    out.push_str(&format!("// {}\n", file.path));
    for (container, decls) in containers {
        out.push('\n');
        out.push_str(&format!("class {}\n{{\n", simple_name(container)));
        for (i, decl) in decls.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            render_declaration(&mut out, decl);
        }
        out.push_str("}\n");
    }
    out
}

fn simple_name(container: &str) -> &str {
    container.rsplit('.').next().unwrap_or(container)
}

fn line(out: &mut String, depth: usize, text: &str) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
    out.push_str(text);
    out.push('\n');
}

fn contract_prefix(contract: NullContract) -> &'static str {
    match contract {
        NullContract::NotNull => "[NotNull] ",
        NullContract::None => "",
    }
}

fn render_declaration(out: &mut String, decl: &Declaration) {
    match decl {
        Declaration::Method(m) => render_method(out, m),
        Declaration::Field(f) => render_field(out, f),
        Declaration::Property(p) => render_property(out, p),
        Declaration::Event(e) => render_event(out, e),
    }
}

fn render_field(out: &mut String, field: &FieldDecl) {
    let mut text = String::from(contract_prefix(field.contract));
    if field.is_static {
        text.push_str("static ");
    }
    text.push_str(&format!("{} {}", field.ty, field.name));
    if let Some(init) = &field.initializer {
        text.push_str(&format!(" = {}", expr(init)));
    }
    text.push(';');
    line(out, 1, &text);
}

fn render_event(out: &mut String, event: &EventDecl) {
    let mut text = String::new();
    if event.is_static {
        text.push_str("static ");
    }
    text.push_str(&format!("event {} {}", event.ty, event.name));
    if let Some(init) = &event.initializer {
        text.push_str(&format!(" = {}", expr(init)));
    }
    text.push(';');
    line(out, 1, &text);
}

fn render_property(out: &mut String, property: &PropertyDecl) {
    let mut head = String::from(contract_prefix(property.contract));
    head.push_str(&modifiers(&property.modifiers));
    head.push_str(&format!("{} {}", property.ty, property.name));

    match &property.getter {
        Some(getter) => {
            line(out, 1, &head);
            line(out, 1, "{");
            line(out, 2, "get");
            render_block(out, 2, getter);
            line(out, 1, "}");
        }
        None => {
            head.push_str(" { get; set; }");
            if let Some(init) = &property.initializer {
                head.push_str(&format!(" = {};", expr(init)));
            }
            line(out, 1, &head);
        }
    }
}

fn render_method(out: &mut String, method: &MethodDecl) {
    let mut head = String::from(contract_prefix(method.return_contract));
    head.push_str(&modifiers(&method.modifiers));
    if !method.is_constructor() {
        if let Some(returns) = &method.returns {
            head.push_str(&format!("{} ", returns));
        }
    }
    head.push_str(&method.name);
    if !method.type_params.is_empty() {
        let names: Vec<&str> = method.type_params.iter().map(|t| t.name.as_str()).collect();
        head.push_str(&format!("<{}>", names.join(", ")));
    }
    let params: Vec<String> = method.params.iter().map(param).collect();
    head.push_str(&format!("({})", params.join(", ")));
    if let Some(init) = &method.initializer {
        let keyword = match init.kind {
            ChainKind::This => "this",
            ChainKind::Base => "base",
        };
        head.push_str(&format!(" : {}({})", keyword, args(&init.args)));
    }
    for clause in method.type_params.iter().filter_map(where_clause) {
        head.push_str(&format!(" {}", clause));
    }

    match &method.body {
        Some(body) => {
            line(out, 1, &head);
            render_block(out, 1, body);
        }
        None => {
            head.push(';');
            line(out, 1, &head);
        }
    }
}

fn modifiers(modifiers: &Modifiers) -> String {
    let mut text = String::new();
    for (set, word) in [
        (modifiers.is_static, "static "),
        (modifiers.is_abstract, "abstract "),
        (modifiers.is_virtual, "virtual "),
        (modifiers.is_override, "override "),
    ] {
        if set {
            text.push_str(word);
        }
    }
    text
}

fn where_clause(param: &TypeParam) -> Option<String> {
    if param.constraints.is_empty() {
        return None;
    }
    let constraints: Vec<String> = param
        .constraints
        .iter()
        .map(|c| match c {
            TypeConstraint::Class => "class".to_string(),
            TypeConstraint::Struct => "struct".to_string(),
            TypeConstraint::NotNull => "notnull".to_string(),
            TypeConstraint::Type(ty) => ty.to_string(),
        })
        .collect();
    Some(format!("where {} : {}", param.name, constraints.join(", ")))
}

fn param(param: &ParamDecl) -> String {
    let mut text = format!("{}{} {}", contract_prefix(param.contract), param.ty, param.name);
    if let Some(default) = &param.default {
        text.push_str(&format!(" = {}", expr(default)));
    }
    text
}

fn render_block(out: &mut String, depth: usize, stmts: &[Stmt]) {
    line(out, depth, "{");
    for stmt in stmts {
        render_stmt(out, depth + 1, stmt);
    }
    line(out, depth, "}");
}

fn render_stmt(out: &mut String, depth: usize, stmt: &Stmt) {
    match stmt {
        Stmt::Local { name, ty, init } => {
            let ty = ty.as_ref().map_or_else(|| "var".to_string(), |t| t.to_string());
            let text = match init {
                Some(init) => format!("{} {} = {};", ty, name, expr(init)),
                None => format!("{} {};", ty, name),
            };
            line(out, depth, &text);
        }
        Stmt::Assign { target, value } => {
            let target = match target {
                AssignTarget::Local { name } | AssignTarget::Param { name } => name.as_str(),
                AssignTarget::Member { member } => member.member_name(),
            };
            line(out, depth, &format!("{} = {};", target, expr(value)));
        }
        Stmt::Return { value: Some(value) } => {
            line(out, depth, &format!("return {};", expr(value)));
        }
        Stmt::Return { value: None } => line(out, depth, "return;"),
        Stmt::Expr { expr: e } => line(out, depth, &format!("{};", expr(e))),
        Stmt::If {
            condition,
            then,
            otherwise,
        } => {
            line(out, depth, &format!("if ({})", expr(condition)));
            render_block(out, depth, then);
            if !otherwise.is_empty() {
                line(out, depth, "else");
                render_block(out, depth, otherwise);
            }
        }
    }
}

fn args(args: &[Expr]) -> String {
    let rendered: Vec<String> = args.iter().map(expr).collect();
    rendered.join(", ")
}

fn literal(value: &str) -> String {
    let bare = value == "true" || value == "false" || value.parse::<f64>().is_ok();
    if bare {
        value.to_string()
    } else {
        format!("{:?}", value)
    }
}

fn expr(e: &Expr) -> String {
    match e {
        Expr::Null => "null".to_string(),
        Expr::Default { ty: None } => "default".to_string(),
        Expr::Default { ty: Some(ty) } => format!("default({})", ty),
        Expr::Literal { value } => literal(value),
        Expr::Local { name } | Expr::Param { name } => name.clone(),
        Expr::Member { target } => target.member_name().to_string(),
        Expr::Call { callee, args: a } => format!("{}({})", callee.member_name(), args(a)),
        Expr::New { ctor, args: a } => {
            let ty = ctor.container().map_or("object", simple_name);
            format!("new {}({})", ty, args(a))
        }
        Expr::Cast { target, operand } => format!("({}){}", target, expr(operand)),
        Expr::As { target, operand } => format!("{} as {}", expr(operand), target),
        Expr::Conditional {
            when_true,
            when_false,
        } => format!("condition ? {} : {}", expr(when_true), expr(when_false)),
        Expr::Coalesce { left, right } => format!("{} ?? {}", expr(left), expr(right)),
        Expr::Opaque => "/* ... */".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::EntityKey;
    use crate::syntax::CtorInitializer;
    use crate::types::TypeSyntax;

    fn ty(text: &str) -> TypeSyntax {
        TypeSyntax::parse(text).unwrap()
    }

    #[test]
    fn renders_members_grouped_by_type() {
        let file = SourceFile::new(
            "Widget.cs",
            vec![
                Declaration::Field(FieldDecl::new("App.Widget", "label", ty("string?"))),
                Declaration::Method(
                    MethodDecl::constructor("App.Widget")
                        .with_params(vec![ParamDecl::new("s", ty("string"))])
                        .with_body(vec![Stmt::assign_member(
                            "F:App.Widget.label",
                            Expr::param("s"),
                        )]),
                ),
                Declaration::Method(
                    MethodDecl::constructor("App.Widget").with_initializer(CtorInitializer {
                        kind: ChainKind::This,
                        target: EntityKey::new("M:App.Widget.Widget(string)"),
                        args: vec![Expr::Null],
                    }),
                ),
            ],
        );
        let text = render_file(&file);
        assert!(text.starts_with("// Widget.cs\n"));
        assert!(text.contains("class Widget\n{\n"));
        assert!(text.contains("    string? label;\n"));
        assert!(text.contains("    Widget(string s)\n    {\n        label = s;\n    }\n"));
        assert!(text.contains("    Widget() : this(null)\n    {\n    }\n"));
    }

    #[test]
    fn renders_statements_and_expressions() {
        let method = MethodDecl::new("C", "Find")
            .with_type_params(vec![TypeParam::new("T").with_constraint(TypeConstraint::Class)])
            .with_params(vec![ParamDecl::new("o", ty("object")).with_default(Expr::Null)])
            .returning(ty("T?"))
            .with_body(vec![
                Stmt::If {
                    condition: Expr::Opaque,
                    then: vec![Stmt::ret(Expr::Default { ty: None })],
                    otherwise: vec![],
                },
                Stmt::local("n", ty("int"), Some(Expr::literal("3"))),
                Stmt::ret(Expr::cast(ty("T"), Expr::param("o"))),
            ]);
        let text = render_file(&SourceFile::new("C.cs", vec![Declaration::Method(method)]));
        assert!(text.contains("T? Find<T>(object o = null) where T : class\n"));
        assert!(text.contains("        if (/* ... */)\n"));
        assert!(text.contains("            return default;\n"));
        assert!(text.contains("        int n = 3;\n"));
        assert!(text.contains("        return (T)o;\n"));
    }

    #[test]
    fn string_literals_are_quoted() {
        assert_eq!(literal("x"), "\"x\"");
        assert_eq!(literal("42"), "42");
        assert_eq!(literal("true"), "true");
    }
}
