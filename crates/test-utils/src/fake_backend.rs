use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assetpipe::engine::RouterEvent;
use assetpipe::errors::Result;
use assetpipe::exec::TaskBackend;
use assetpipe::task::{TaskError, TaskReport};
use assetpipe::types::TaskName;
use tokio::sync::mpsc;

/// A fake backend that:
/// - records which tasks were dispatched, in order
/// - reports `TaskFinished` for each one after `delay`
/// - fails the tasks named in `failing`, and otherwise reports one written
///   `build/<task>.css` file.
pub struct FakeBackend {
    runtime_tx: mpsc::Sender<RouterEvent>,
    dispatched: Arc<Mutex<Vec<TaskName>>>,
    delay: Duration,
    failing: HashSet<TaskName>,
}

impl FakeBackend {
    pub fn new(runtime_tx: mpsc::Sender<RouterEvent>) -> Self {
        Self {
            runtime_tx,
            dispatched: Arc::new(Mutex::new(Vec::new())),
            delay: Duration::ZERO,
            failing: HashSet::new(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, task: &str) -> Self {
        self.failing.insert(task.to_string());
        self
    }

    /// Shared log of dispatched task names.
    pub fn dispatched(&self) -> Arc<Mutex<Vec<TaskName>>> {
        Arc::clone(&self.dispatched)
    }
}

impl TaskBackend for FakeBackend {
    fn dispatch(&mut self, task: TaskName) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let delay = self.delay;
        let fail = self.failing.contains(&task);
        self.dispatched.lock().unwrap().push(task.clone());

        Box::pin(async move {
            tokio::spawn(async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let report = if fail {
                    TaskReport::failed(task, TaskError::Resolve("fake failure".to_string()))
                } else {
                    let mut report = TaskReport::new(task.clone());
                    report.written.push(PathBuf::from(format!("build/{task}.css")));
                    report
                };
                let _ = tx.send(RouterEvent::TaskFinished { report }).await;
            });
            Ok(())
        })
    }
}
