//! Whole-run properties: termination, idempotence, monotonicity, and the
//! failure modes of building and mutating.

mod common;

use common::{
    annotation_flags, build, decl, mutated, param_annotated, program, run, run_with, string,
    value_annotated,
};
use nullprop_core::builder::GraphBuilder;
use nullprop_core::error::NullpropError;
use nullprop_core::graph::DependencyGraph;
use nullprop_core::oracle::ModelOracle;
use nullprop_core::passes::{default_passes, passes_without};
use nullprop_core::rewrite::{ConflictLog, PassContext, Rewrite, RewritePass};
use nullprop_core::signature::EntityKey;
use nullprop_core::syntax::{Declaration, Expr, FieldDecl, MethodDecl, ParamDecl, Stmt};
use nullprop_core::types::TypeSyntax;

fn caller_passing_null() -> Vec<Declaration> {
    vec![
        Declaration::Method(MethodDecl::new("C", "M").with_params(vec![ParamDecl::new(
            "s",
            string(),
        )])),
        Declaration::Method(
            MethodDecl::new("C", "Caller")
                .with_body(vec![Stmt::expr(Expr::call("M:C.M(string)", vec![Expr::Null]))]),
        ),
    ]
}

fn ping_pong() -> Vec<Declaration> {
    vec![
        Declaration::Method(
            MethodDecl::new("Game", "Ping")
                .returning(string())
                .with_params(vec![ParamDecl::new("ball", string())])
                .with_body(vec![
                    Stmt::If {
                        condition: Expr::Opaque,
                        then: vec![Stmt::ret(Expr::Null)],
                        otherwise: vec![],
                    },
                    Stmt::ret(Expr::call("M:Game.Pong(string)", vec![Expr::param("ball")])),
                ]),
        ),
        Declaration::Method(
            MethodDecl::new("Game", "Pong")
                .returning(string())
                .with_params(vec![ParamDecl::new("ball", string())])
                .with_body(vec![Stmt::ret(Expr::call(
                    "M:Game.Ping(string)",
                    vec![Expr::param("ball")],
                ))]),
        ),
        Declaration::Method(MethodDecl::new("Game", "Serve").with_body(vec![Stmt::expr(
            Expr::call("M:Game.Ping(string)", vec![Expr::Null]),
        )])),
    ]
}

/// Something for every pass to act on.
fn every_rule() -> Vec<Declaration> {
    let mut decls = ping_pong();
    decls.extend(caller_passing_null());
    decls.extend([
        Declaration::Field(FieldDecl::new("C", "f", string())),
        Declaration::Method(
            MethodDecl::new("Base", "Name")
                .returning(TypeSyntax::parse("string?").unwrap())
                .abstract_member(),
        ),
        Declaration::Method(
            MethodDecl::new("Derived", "Name")
                .returning(string())
                .overriding("M:Base.Name()")
                .with_body(vec![Stmt::ret(Expr::literal("d"))]),
        ),
        Declaration::Method(
            MethodDecl::new("C", "Locals")
                .with_params(vec![ParamDecl::new("p", TypeSyntax::parse("string?").unwrap())])
                .with_body(vec![
                    Stmt::local("a", string(), Some(Expr::Null)),
                    Stmt::local("b", string(), Some(Expr::cast(string(), Expr::param("p")))),
                    Stmt::assign_member("F:C.f", Expr::local("a")),
                ]),
        ),
    ]);
    decls
}

/// Run `pass` once on `key` against the live graph.
fn rewrite_once(graph: &DependencyGraph, pass: &dyn RewritePass, key: &EntityKey) -> Rewrite {
    let entity = graph.entity(key).unwrap().clone();
    let decl = graph.store().current_declaration(&entity).unwrap();
    let oracle = ModelOracle::new();
    let mut conflicts = ConflictLog::new();
    let mut cx = PassContext::new(graph, &oracle, &mut conflicts);
    pass.rewrite(&mut cx, &entity, &decl).unwrap()
}

/// Local entity keys `pass` handles.
fn handled_keys(graph: &DependencyGraph, pass: &dyn RewritePass) -> Vec<EntityKey> {
    graph
        .store()
        .entities()
        .filter(|e| e.kind.is_local() && pass.handles(e.kind))
        .map(|e| e.key.clone())
        .collect()
}

#[test]
fn mutual_recursion_terminates_with_everything_annotated() {
    let input = program(ping_pong());
    let slots = annotation_flags(&input).len();
    let (graph, report) = run(input);
    assert!(value_annotated(&graph, "M:Game.Ping(string)"));
    assert!(value_annotated(&graph, "M:Game.Pong(string)"));
    assert!(param_annotated(&graph, "M:Game.Ping(string)", 0));
    assert!(param_annotated(&graph, "M:Game.Pong(string)", 0));
    assert_eq!(report.mutation_count(), 4);

    // Each slot is annotated at most once, and each entity can be owed at
    // most one obligation per capability per annotation.
    assert!(report.mutation_count() <= slots);
    assert!(report.drained <= report.obligations_enqueued);
    assert!(report.drained <= graph.entity_count() * 2 * slots);
}

#[test]
fn applying_any_pass_twice_equals_applying_it_once() {
    for pass in default_passes() {
        let pass = pass.as_ref();
        let mut graph = build(program(every_rule()));
        for key in handled_keys(&graph, pass) {
            if let Rewrite::Changed(edited) = rewrite_once(&graph, pass, &key) {
                let entity = graph.entity(&key).unwrap().clone();
                graph.store_mut().apply_mutation(&entity, edited).unwrap();
            }
            assert_eq!(
                rewrite_once(&graph, pass, &key),
                Rewrite::Unchanged,
                "{} changed {} a second time",
                pass.name(),
                key
            );
        }
    }
}

#[test]
fn a_converged_program_is_a_fixpoint_of_every_pass() {
    let (graph, report) = run(program(every_rule()));
    assert!(!report.mutations.is_empty());
    for pass in default_passes() {
        let pass = pass.as_ref();
        for key in handled_keys(&graph, pass) {
            assert_eq!(
                rewrite_once(&graph, pass, &key),
                Rewrite::Unchanged,
                "{} still changes {}",
                pass.name(),
                key
            );
        }
    }
}

#[test]
fn rerunning_on_the_output_changes_nothing() {
    let (graph, first) = run(program(ping_pong()));
    assert!(!first.mutations.is_empty());
    let output = graph.into_store().into_program();

    let (_, second) = run(output);
    assert!(second.mutations.is_empty());
    assert!(second.conflicts.is_empty());
}

#[test]
fn annotations_are_never_removed() {
    let mut input = ping_pong();
    let score = FieldDecl::new("Game", "score", TypeSyntax::parse("string?").unwrap());
    input.push(Declaration::Field(score));
    let before = program(input);
    let before_flags = annotation_flags(&before);

    let (graph, _) = run(before);
    let after_flags = annotation_flags(graph.store().program());
    assert_eq!(before_flags.len(), after_flags.len());
    for (before, after) in before_flags.iter().zip(&after_flags) {
        assert!(!before || *after);
    }
}

#[test]
fn only_modified_files_report_a_new_version() {
    let (graph, _) = run(program(caller_passing_null()));
    let output = graph.into_store().into_program();
    let modified: Vec<&str> = output.modified_files().map(|f| f.path.as_str()).collect();
    assert_eq!(modified, vec!["Program.cs"]);

    let (graph, _) = run(program(vec![Declaration::Method(MethodDecl::new("C", "Quiet"))]));
    assert_eq!(graph.store().program().modified_files().count(), 0);
}

#[test]
fn disabled_pass_does_not_run() {
    let passes = passes_without(&["argument".to_string()]).unwrap();
    let (graph, report) = run_with(program(caller_passing_null()), passes);
    assert!(!param_annotated(&graph, "M:C.M(string)", 0));
    assert!(report.mutations.is_empty());
}

#[test]
fn references_to_unknown_members_are_skipped() {
    let (graph, report) = run(program(vec![
        Declaration::Method(
            MethodDecl::new("C", "Name")
                .returning(string())
                .with_body(vec![Stmt::ret(Expr::call("M:Missing.Find()", vec![]))]),
        ),
        Declaration::Method(
            MethodDecl::new("C", "Other")
                .returning(string())
                .with_body(vec![Stmt::ret(Expr::Null)]),
        ),
    ]));
    assert!(graph.entity(&EntityKey::new("M:Missing.Find()")).is_err());
    assert!(!value_annotated(&graph, "M:C.Name()"));
    assert_eq!(mutated(&report), vec!["M:C.Other()"]);
}

#[test]
fn duplicate_declarations_fail_the_build() {
    let method = Declaration::Method(MethodDecl::new("C", "Twice"));
    let oracle = ModelOracle::new();
    let err = GraphBuilder::new(&oracle)
        .build(program(vec![method.clone(), method]))
        .err()
        .unwrap();
    assert!(matches!(err, NullpropError::DuplicateEntity { .. }));
    assert!(err.is_invariant_violation());
}

#[test]
fn identical_rewrite_does_not_bump_the_generation() {
    let mut graph = build(program(caller_passing_null()));
    let key = EntityKey::new("M:C.Caller()");
    let entity = graph.entity(&key).unwrap().clone();
    let generation = graph.store().model().generation();

    let same = decl(&graph, "M:C.Caller()");
    let applied = graph.store_mut().apply_mutation(&entity, same).unwrap();
    assert!(!applied);
    assert_eq!(graph.store().model().generation(), generation);
    assert_eq!(graph.store().mutation_count(), 0);
}

#[test]
fn removing_an_annotation_is_rejected() {
    let mut graph = build(program(vec![Declaration::Field(FieldDecl::new(
        "C",
        "f",
        TypeSyntax::parse("string?").unwrap(),
    ))]));
    let entity = graph.entity(&EntityKey::new("F:C.f")).unwrap().clone();
    let stripped = Declaration::Field(FieldDecl::new("C", "f", string()));

    let err = graph
        .store_mut()
        .apply_mutation(&entity, stripped)
        .unwrap_err();
    assert!(matches!(err, NullpropError::NonMonotonicRewrite { .. }));
    assert!(value_annotated(&graph, "F:C.f"));
}
