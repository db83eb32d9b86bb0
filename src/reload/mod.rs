// src/reload/mod.rs

//! Fire-and-forget change notifications for connected browsers.

use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::task::TaskReport;
use crate::types::ReloadKind;

pub const DEFAULT_CAPACITY: usize = 64;

/// Broadcasts [`ReloadKind`] signals to every subscriber.
///
/// Sending never blocks and never fails: with no subscribers the signal is
/// dropped, and a slow subscriber only lags (it skips old signals).
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<ReloadKind>,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadKind> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn notify(&self, kind: ReloadKind) {
        match self.tx.send(kind) {
            Ok(n) => debug!(?kind, subscribers = n, "reload signal sent"),
            Err(_) => trace!(?kind, "reload signal dropped, no subscribers"),
        }
    }

    /// Emit one signal for a finished run, if it warrants one.
    ///
    /// Failed runs and runs that wrote nothing stay silent.
    pub fn task_finished(&self, report: &TaskReport) {
        if let Some(kind) = report.reload_kind() {
            self.notify(kind);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn notify_without_subscribers_is_silent() {
        let n = ChangeNotifier::new(4);
        n.notify(ReloadKind::Other);
        assert_eq!(n.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn task_finished_sends_kind_for_successful_write() {
        let n = ChangeNotifier::new(4);
        let mut rx = n.subscribe();

        let mut report = TaskReport::new("css");
        report.written.push(PathBuf::from("build/app.css"));
        n.task_finished(&report);

        assert_eq!(rx.recv().await.unwrap(), ReloadKind::Stylesheet);
    }

    #[tokio::test]
    async fn empty_report_sends_nothing() {
        let n = ChangeNotifier::new(4);
        let mut rx = n.subscribe();
        n.task_finished(&TaskReport::new("noop"));
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
