//! Statecraft Runtime - Method registry, state graph and execution
//!
//! This crate contains the method registry, the editable state graph, the
//! evaluator for bound method calls, the tick-driven machine and the codec
//! for the persisted graph form.

// Lets `#[module]` expansions inside this crate resolve `::statecraft_runtime`.
extern crate self as statecraft_runtime;

pub use statecraft_macros::module;
pub use statecraft_types;

mod codec;
mod evaluator;
mod graph;
mod machine;
mod model;
mod registry;

#[cfg(test)]
mod testing;

pub use codec::*;
pub use evaluator::*;
pub use graph::*;
pub use machine::*;
pub use model::*;
pub use registry::*;
