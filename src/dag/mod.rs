// src/dag/mod.rs

//! Target graph and execution planning.
//!
//! - [`graph`] validates the declared target set once per invocation.
//! - [`planner`] turns requested entry targets into an ordered
//!   [`ExecutionPlan`].

pub mod graph;
pub mod planner;

pub use graph::TargetGraph;
pub use planner::{plan, ExecutionPlan, PlannedTarget};
