// src/engine/core.rs

//! Pure core router state machine.
//!
//! This module contains a synchronous, deterministic "core" that consumes
//! [`RouterEvent`]s and produces:
//! - an updated dispatch state
//! - a list of commands describing what the IO shell should do next
//!
//! The async shell (`engine::runtime::Runtime`) is responsible for reading
//! events from channels, handing tasks to the backend and sending
//! notifications. The core is unit tested without any Tokio, channels,
//! filesystem, or tasks.

use crate::engine::event_handlers::{
    CoreStep, DispatchState, handle_change, handle_shutdown, handle_task_finished,
    handle_task_trigger,
};
use crate::engine::{RouterEvent, RouterOptions, RouterState};
use crate::watch::patterns::RouteTable;

/// Pure core router state.
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct RouterCore {
    routes: RouteTable,
    state: DispatchState,
    options: RouterOptions,
    armed: bool,
}

impl RouterCore {
    pub fn new(routes: RouteTable, options: RouterOptions) -> Self {
        Self {
            routes,
            state: DispatchState::default(),
            options,
            armed: false,
        }
    }

    /// Mark watchers as registered.
    pub fn arm(&mut self) {
        self.armed = true;
    }

    pub fn state(&self) -> RouterState {
        if !self.state.in_flight.is_empty() {
            RouterState::Dispatching
        } else if self.armed {
            RouterState::Armed
        } else {
            RouterState::Idle
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn is_running(&self, task: &str) -> bool {
        self.state.in_flight.contains(task)
    }

    pub fn in_flight(&self) -> usize {
        self.state.in_flight.len()
    }

    pub fn has_pending(&self, task: &str) -> bool {
        self.state.pending.contains(task)
    }

    pub fn is_draining(&self) -> bool {
        self.state.draining
    }

    /// Handle a single event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RouterEvent) -> CoreStep {
        match event {
            RouterEvent::Change(change) => handle_change(&self.routes, &mut self.state, change),
            RouterEvent::TaskTriggered { task, reason } => {
                handle_task_trigger(&mut self.state, task, reason)
            }
            RouterEvent::TaskFinished { report } => {
                handle_task_finished(&mut self.state, &self.options, report)
            }
            RouterEvent::ShutdownRequested => handle_shutdown(&mut self.state),
        }
    }
}
