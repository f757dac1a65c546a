//! Shared helpers for propagation integration tests.

#![allow(dead_code)]

use nullprop_core::builder::GraphBuilder;
use nullprop_core::driver::{FixpointDriver, RunReport};
use nullprop_core::graph::DependencyGraph;
use nullprop_core::oracle::ModelOracle;
use nullprop_core::passes::default_passes;
use nullprop_core::program::{Program, SourceFile};
use nullprop_core::rewrite::RewritePass;
use nullprop_core::signature::EntityKey;
use nullprop_core::syntax::Declaration;
use nullprop_core::types::TypeSyntax;

pub fn string() -> TypeSyntax {
    TypeSyntax::named("string")
}

pub fn ty(text: &str) -> TypeSyntax {
    TypeSyntax::parse(text).unwrap()
}

/// A program with one file holding `decls`.
pub fn program(decls: Vec<Declaration>) -> Program {
    Program::new().with_file(SourceFile::new("Program.cs", decls))
}

pub fn build(program: Program) -> DependencyGraph {
    GraphBuilder::new(&ModelOracle::new()).build(program).unwrap()
}

/// Build and run the full battery.
pub fn run(program: Program) -> (DependencyGraph, RunReport) {
    run_with(program, default_passes())
}

pub fn run_with(
    program: Program,
    passes: Vec<Box<dyn RewritePass>>,
) -> (DependencyGraph, RunReport) {
    let mut graph = build(program);
    let driver = FixpointDriver::new(passes, Box::new(ModelOracle::new()));
    let report = driver.run(&mut graph).unwrap();
    (graph, report)
}

/// The live declaration of `key`.
pub fn decl(graph: &DependencyGraph, key: &str) -> Declaration {
    let entity = graph.entity(&EntityKey::new(key)).unwrap();
    graph.store().current_declaration(entity).unwrap()
}

/// Whether the value slot (return type or member type) of `key` is annotated.
pub fn value_annotated(graph: &DependencyGraph, key: &str) -> bool {
    decl(graph, key).value_type().unwrap().nullable
}

/// Whether parameter `index` of method `key` is annotated.
pub fn param_annotated(graph: &DependencyGraph, key: &str, index: usize) -> bool {
    decl(graph, key).as_method().unwrap().params[index].ty.nullable
}

/// Every annotation flag in the program, in declaration and slot order.
pub fn annotation_flags(program: &Program) -> Vec<bool> {
    let mut flags = Vec::new();
    for (_, decl) in program.declarations() {
        decl.for_each_type(&mut |ty| flags.push(ty.nullable));
    }
    flags
}

/// Keys of mutated entities in application order.
pub fn mutated(report: &RunReport) -> Vec<&str> {
    report.mutations.iter().map(|m| m.entity.as_str()).collect()
}
