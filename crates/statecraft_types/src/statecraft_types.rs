//! Statecraft Types - Dynamic value model for the state-machine runtime
//!
//! This crate contains the pure data structures shared by the registry,
//! the graph model and the persisted form:
//!
//! - [`Value`] / [`ValueKind`] - tagged union over the supported scalar kinds
//!   plus identity references
//! - [`ValueCell`] - lazily-defaulted, type-checked storage slot
//! - [`Conversion`] - memoized convertibility rules and value coercion
//! - [`Typed`] - bridge between Rust types and values, used by generated
//!   method thunks

mod cell;
mod conversion;
mod ids;
mod kind;
mod value;

pub use cell::*;
pub use conversion::*;
pub use ids::*;
pub use kind::*;
pub use value::*;
