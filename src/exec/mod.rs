// src/exec/mod.rs

//! Task execution layer.
//!
//! [`backend`] provides the `TaskBackend` trait and the concrete
//! `GraphBackend` that the runtime uses in production, and which tests can
//! replace with a fake implementation.

pub mod backend;

pub use backend::{GraphBackend, TaskBackend};
