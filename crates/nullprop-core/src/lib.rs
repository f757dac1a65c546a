//! Core engine for nullprop.
//!
//! This crate infers where reference-typed slots of a C#-like program may hold
//! an absent value and annotates them:
//! - Program model, type syntax, and model-file loading
//! - Semantic model and the oracle passes consult
//! - Entity store with monotonic, identity-preserving mutation
//! - Dependency graph and its static builder
//! - Rewrite pass contract and the twelve-pass rule set
//! - Traversal and fixpoint driver
//! - Configuration, rendering, persistence, and JSON output types

pub mod builder;
pub mod config;
pub mod driver;
pub mod error;
pub mod graph;
pub mod oracle;
pub mod output;
pub mod passes;
pub mod persist;
pub mod program;
pub mod render;
pub mod rewrite;
pub mod semantic;
pub mod signature;
pub mod store;
pub mod syntax;
pub mod types;
