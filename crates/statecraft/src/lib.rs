//! Statecraft - Host application for tick-driven state graphs
//!
//! This crate provides the command line host around `statecraft_runtime`:
//! - Configuration loading (`statecraft.toml`)
//! - Demo modules exposing host capabilities to graphs
//! - Graph file storage and a sample graph
//! - Summaries for `statecraft check`

// Re-export core crates
pub use statecraft_runtime;

pub mod config;
pub mod modules;
pub mod sample;
pub mod store;
pub mod summary;
