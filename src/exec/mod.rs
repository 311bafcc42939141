// src/exec/mod.rs

//! Target execution layer.
//!
//! - [`backend`] provides the `ExecutorBackend` trait and the concrete
//!   `RealExecutorBackend` the runtime uses in production, and which tests
//!   can replace with a fake implementation.
//! - [`runner`] runs one target: requirements, artifact contracts, body.
//! - [`command`] runs shell commands for command bodies and `cmd`
//!   requirements.

pub mod backend;
pub mod command;
pub mod runner;

pub use backend::{ExecutorBackend, RealExecutorBackend};
pub use runner::execute_target;
