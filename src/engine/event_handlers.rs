// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::engine::queue::PendingRuns;
use crate::engine::{RouterOptions, TriggerReason};
use crate::task::TaskReport;
use crate::types::{ChangeEvent, ReloadKind, TaskName};
use crate::watch::patterns::RouteTable;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Start one run of this task.
    DispatchTask(TaskName),
    /// Tell connected browsers to reload.
    Notify(ReloadKind),
    /// Request that the runtime exits (drained, or idle with
    /// `exit_when_idle`).
    RequestExit,
}

/// Decision returned by the core after handling a single `RouterEvent`.
#[derive(Debug, Clone, Default)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn running(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

/// Mutable dispatch bookkeeping shared by the handlers.
#[derive(Debug, Default)]
pub struct DispatchState {
    pub in_flight: HashSet<TaskName>,
    pub pending: PendingRuns,
    pub draining: bool,
}

/// Route a change to every matching task.
///
/// Paths no route claims are ignored.
pub fn handle_change(
    routes: &RouteTable,
    state: &mut DispatchState,
    event: ChangeEvent,
) -> CoreStep {
    let targets = routes.targets(&event.path);
    if targets.is_empty() {
        debug!(path = %event.path, kind = %event.kind, "change matches no route");
        return CoreStep::running(Vec::new());
    }

    let mut commands = Vec::new();
    for task in targets {
        let routed = event.routed_to(&task);
        debug!(path = %routed.path, kind = %routed.kind, task = ?routed.origin, "change routed");
        commands.extend(trigger(state, task, TriggerReason::FileWatch));
    }
    CoreStep::running(commands)
}

/// Handle a direct task trigger.
pub fn handle_task_trigger(
    state: &mut DispatchState,
    task: TaskName,
    reason: TriggerReason,
) -> CoreStep {
    CoreStep::running(trigger(state, task, reason).into_iter().collect())
}

/// Either dispatch `task` now or remember a single re-run for later.
fn trigger(state: &mut DispatchState, task: TaskName, reason: TriggerReason) -> Option<CoreCommand> {
    if state.draining {
        debug!(task = %task, "shutting down; ignoring trigger");
        return None;
    }

    if state.in_flight.contains(&task) {
        state.pending.record(&task);
        return None;
    }

    info!(task = %task, ?reason, "dispatching task");
    state.in_flight.insert(task.clone());
    Some(CoreCommand::DispatchTask(task))
}

/// Handle a finished run: notify, then start the pending re-run if any.
pub fn handle_task_finished(
    state: &mut DispatchState,
    options: &RouterOptions,
    report: TaskReport,
) -> CoreStep {
    let mut commands = Vec::new();
    let task = report.task.clone();

    if !state.in_flight.remove(&task) {
        warn!(task = %task, "completion for a task that was not in flight");
    }

    if report.succeeded() {
        info!(task = %task, written = report.written.len(), "task finished");
    } else {
        // Stale output stays in place until the next successful run.
        for err in &report.errors {
            warn!(task = %task, error = %err, "task failed");
        }
    }

    if let Some(kind) = report.reload_kind() {
        commands.push(CoreCommand::Notify(kind));
    }

    if state.pending.take(&task) && !state.draining {
        info!(task = %task, "starting coalesced re-run");
        state.in_flight.insert(task.clone());
        commands.push(CoreCommand::DispatchTask(task));
    }

    let idle = state.in_flight.is_empty() && state.pending.is_empty();
    let exit = (state.draining && state.in_flight.is_empty()) || (options.exit_when_idle && idle);
    if exit {
        commands.push(CoreCommand::RequestExit);
    }

    CoreStep {
        commands,
        keep_running: !exit,
    }
}

/// Stop accepting new work; exit once in-flight runs have returned.
pub fn handle_shutdown(state: &mut DispatchState) -> CoreStep {
    state.draining = true;
    let dropped = state.pending.clear();
    info!(
        in_flight = state.in_flight.len(),
        dropped_pending = dropped,
        "shutdown requested; draining"
    );

    if state.in_flight.is_empty() {
        return CoreStep {
            commands: vec![CoreCommand::RequestExit],
            keep_running: false,
        };
    }
    CoreStep::running(Vec::new())
}
