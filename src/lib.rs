//! # Shared Resources
//!
//! Lock admission and value allocation for build jobs contending over named
//! shared resources.
//!
//! A build declares the locks it needs, one per line, as `name` or
//! `name(read)` / `name(write)`. Resources are either *quoted* (a number of
//! anonymous slots, possibly unlimited) or *custom* (an enumerated set of
//! values such as hostnames or ports). An admission pass takes the resources
//! visible to a project, the locks held by running builds and the queue of
//! waiting builds, and decides in queue order which builds may start. Every
//! admitted build is told which slot or value it got for each lock.
//!
//! ## Guarantees
//!
//! - **All or nothing**: a build is admitted only if every lock it needs is
//!   available; a rejected build takes nothing.
//! - **Quota**: a finite quota is never exceeded.
//! - **Exclusive values**: no two holders of a custom resource share a value.
//! - **Determinism**: the same inputs (and affinity history) give the same
//!   outcomes.
//!
//! ## Example
//!
//! ```rust
//! use shared_resources::config::GateConfig;
//! use shared_resources::core::{Holder, SharedResourceGate};
//! use shared_resources::model::{Resource, ResourceMap};
//! use shared_resources::parser::parse_declarations;
//!
//! let db = Resource::quoted("r1", "project", "db", 2);
//! let resources = ResourceMap::from([(db.name().to_string(), db)]);
//!
//! let locks = parse_declarations("db(read)").locks;
//! let queue = vec![Holder::new(1, locks.clone()), Holder::new(2, locks)];
//!
//! let mut gate = SharedResourceGate::new(GateConfig::default());
//! let outcomes = gate.run_pass(&resources, &[], &queue).unwrap();
//! assert_eq!(outcomes[0].assigned[0].value(), Some("0"));
//! assert_eq!(outcomes[1].assigned[0].value(), Some("1"));
//! ```
//!
//! Resources are usually declared per project and inherited by subprojects;
//! see [`catalog::CatalogResolver`] for override resolution and
//! [`service::SharedGate`] for sharing one gate between threads.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Admission checks, value allocation and the admission pass.
pub mod core;
/// Configuration models for the gate and the resource catalog.
pub mod config;
/// Builders to construct gates and catalogs from configuration.
pub mod builders;
/// Project hierarchy and effective resource resolution.
pub mod catalog;
/// Locks and resources.
pub mod model;
/// Lock declaration grammar.
pub mod parser;
/// Thread-safe gate handle.
pub mod service;
/// Shared utilities.
pub mod util;
