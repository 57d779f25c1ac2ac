//! Builders to construct gate components from configuration.

pub mod gate_builder;

pub use gate_builder::{build_catalog, build_gate, load_catalog, load_gate};
