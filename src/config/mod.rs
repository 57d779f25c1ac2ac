//! Configuration models for the gate and the resource catalog.

pub mod gate;

pub use gate::{CatalogConfig, GateConfig, ProjectConfig};
