// src/watch/mod.rs

//! File watching and change routing.
//!
//! This module is responsible for:
//! - Compiling per-task watch routes (globs with `!` negations).
//! - Wiring up a cross-platform filesystem watcher (`notify`) with one
//!   recursive watch per distinct root.
//! - Turning raw notify events into root-relative [`ChangeEvent`]s.
//!
//! It does **not** run tasks; the engine decides what to dispatch.
//!
//! [`ChangeEvent`]: crate::types::ChangeEvent

pub mod event_handler;
pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use patterns::{RouteTable, WatchRoute};
pub use watcher::{WatcherHandle, spawn_watcher};
