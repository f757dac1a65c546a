//! nullprop: whole-program nullability annotation propagation
//!
//! Infers which reference-typed slots of a C#-like program may hold an absent
//! value, annotates them, and keeps going until no rule can add another
//! annotation.

// Engine - re-exported from nullprop-core
pub use nullprop_core::builder;
pub use nullprop_core::config;
pub use nullprop_core::driver;
pub use nullprop_core::error;
pub use nullprop_core::output;
pub use nullprop_core::passes;
pub use nullprop_core::program;

// Front door
pub mod cli;
