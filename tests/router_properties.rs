// tests/router_properties.rs

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use assetpipe::engine::{CoreCommand, RouterCore, RouterEvent, RouterOptions, RouterState};
use assetpipe::task::{TaskError, TaskReport};
use assetpipe::types::{ChangeEvent, ChangeKind};
use assetpipe::watch::{RouteTable, WatchRoute};
use proptest::prelude::*;

const TASKS: [&str; 3] = ["css", "js", "html"];

fn core() -> RouterCore {
    let routes = TASKS
        .iter()
        .map(|t| WatchRoute::new(*t, &[format!("app/{t}/**/*")]).expect("route"))
        .collect();
    let mut core = RouterCore::new(RouteTable::new(routes), RouterOptions::default());
    core.arm();
    core
}

#[derive(Debug, Clone)]
enum Op {
    /// A file of task `i` changed.
    Change(usize),
    /// Task `i` finishes if running; `bool` decides success.
    Finish(usize, bool),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..TASKS.len()).prop_map(Op::Change),
        (0..TASKS.len(), any::<bool>()).prop_map(|(i, ok)| Op::Finish(i, ok)),
    ]
}

fn report(task: &str, ok: bool) -> TaskReport {
    if ok {
        let mut r = TaskReport::new(task);
        r.written.push(PathBuf::from(format!("build/{task}.out")));
        r
    } else {
        TaskReport::failed(task, TaskError::Resolve("boom".into()))
    }
}

proptest! {
    /// Each task has at most one run in flight, every change while running
    /// collapses into at most one extra run, and only successful runs
    /// notify.
    #[test]
    fn dispatch_matches_single_flight_model(ops in proptest::collection::vec(op_strategy(), 1..80)) {
        let mut core = core();
        let mut running: HashSet<&str> = HashSet::new();
        let mut pending: HashSet<&str> = HashSet::new();
        let mut runs: HashMap<&str, usize> = HashMap::new();

        for op in ops {
            match op {
                Op::Change(i) => {
                    let task = TASKS[i];
                    let step = core.step(RouterEvent::Change(ChangeEvent::new(
                        format!("app/{task}/file"),
                        ChangeKind::Modify,
                    )));
                    prop_assert!(step.keep_running);
                    if running.contains(task) {
                        prop_assert!(step.commands.is_empty());
                        pending.insert(task);
                    } else {
                        prop_assert_eq!(step.commands, vec![CoreCommand::DispatchTask(task.to_string())]);
                        running.insert(task);
                        *runs.entry(task).or_default() += 1;
                    }
                }
                Op::Finish(i, ok) => {
                    let task = TASKS[i];
                    if !running.contains(task) {
                        continue;
                    }
                    let step = core.step(RouterEvent::TaskFinished { report: report(task, ok) });
                    let notified = step.commands.iter().filter(|c| matches!(c, CoreCommand::Notify(_))).count();
                    prop_assert_eq!(notified, usize::from(ok));

                    let redispatched = step.commands.contains(&CoreCommand::DispatchTask(task.to_string()));
                    prop_assert_eq!(redispatched, pending.remove(task));
                    if redispatched {
                        *runs.entry(task).or_default() += 1;
                    } else {
                        running.remove(task);
                    }
                }
            }

            for task in TASKS {
                prop_assert_eq!(core.is_running(task), running.contains(task));
                prop_assert_eq!(core.has_pending(task), pending.contains(task));
            }
            let expected_state = if running.is_empty() { RouterState::Armed } else { RouterState::Dispatching };
            prop_assert_eq!(core.state(), expected_state);
        }

        // Drain: finishing everything leaves the router armed with no work.
        loop {
            let Some(task) = running.iter().next().copied() else { break };
            core.step(RouterEvent::TaskFinished { report: report(task, true) });
            if !pending.remove(task) {
                running.remove(task);
            }
        }
        prop_assert_eq!(core.state(), RouterState::Armed);
        prop_assert_eq!(core.in_flight(), 0);
    }
}
