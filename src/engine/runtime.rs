// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::Result;
use crate::exec::TaskBackend;
use crate::reload::ChangeNotifier;

use super::core::RouterCore;
use super::{CoreCommand, RouterEvent};

/// Drives the router core in response to `RouterEvent`s, delegates task
/// execution to a `TaskBackend` and forwards reload signals to the
/// `ChangeNotifier`.
///
/// This is a pure IO shell around `RouterCore`, which contains all the
/// dispatch semantics.
pub struct Runtime<B: TaskBackend> {
    core: RouterCore,
    event_rx: mpsc::Receiver<RouterEvent>,
    backend: B,
    notifier: ChangeNotifier,
}

impl<B: TaskBackend> fmt::Debug for Runtime<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<B: TaskBackend> Runtime<B> {
    pub fn new(
        core: RouterCore,
        event_rx: mpsc::Receiver<RouterEvent>,
        backend: B,
        notifier: ChangeNotifier,
    ) -> Self {
        Self {
            core,
            event_rx,
            backend,
            notifier,
        }
    }

    /// Main event loop.
    ///
    /// Returns once the core asks to stop (shutdown drained, or idle with
    /// `exit_when_idle`) or every event sender is gone.
    pub async fn run(mut self) -> Result<RouterCore> {
        info!(state = ?self.core.state(), "router started");

        loop {
            let Some(event) = self.event_rx.recv().await else {
                info!("router event channel closed; exiting");
                break;
            };

            debug!(?event, "router received event");

            let step = self.core.step(event);
            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                info!("router drained; stopping");
                break;
            }
        }

        Ok(self.core)
    }

    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::DispatchTask(task) => self.backend.dispatch(task).await?,
            CoreCommand::Notify(kind) => self.notifier.notify(kind),
            CoreCommand::RequestExit => debug!("core issued RequestExit command"),
        }
        Ok(())
    }
}
