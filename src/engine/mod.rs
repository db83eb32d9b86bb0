// src/engine/mod.rs

//! Watch-phase dispatch engine.
//!
//! This module ties together:
//! - the route table (which task a changed path belongs to)
//! - pending re-run coalescing (what happens when a change arrives while the
//!   task is already running)
//! - the main runtime event loop that reacts to:
//!   - file-watch changes
//!   - task completion reports
//!   - shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use crate::task::TaskReport;
use crate::types::{ChangeEvent, TaskName};

/// Why a task was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// Manual trigger (tests, or an explicit rebuild request).
    Manual,
    /// Triggered due to a filesystem event.
    FileWatch,
}

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouterOptions {
    /// If true, exit the runtime once nothing is running and nothing is
    /// pending.
    pub exit_when_idle: bool,
}

/// Observable state of the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterState {
    /// No watchers registered yet.
    Idle,
    /// Watchers registered, nothing running.
    Armed,
    /// At least one task run in flight.
    Dispatching,
}

/// Events flowing into the runtime from the watcher and the backend.
#[derive(Debug, Clone)]
pub enum RouterEvent {
    /// A watched path changed.
    Change(ChangeEvent),
    /// A task should be run, bypassing route matching.
    TaskTriggered {
        task: TaskName,
        reason: TriggerReason,
    },
    /// A dispatched run returned.
    TaskFinished { report: TaskReport },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod queue;
pub mod runtime;

pub use core::RouterCore;
pub use event_handlers::{CoreCommand, CoreStep};
pub use queue::PendingRuns;
pub use runtime::Runtime;
