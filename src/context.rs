// src/context.rs

//! Process-wide application context.
//!
//! [`AppContext`] owns everything a run needs: the validated config, the
//! task graph, the shared build environment and the change notifier. Once
//! the watch phase starts it also owns the router task, the filesystem
//! watcher and the dev server, and [`AppContext::shutdown`] tears them down
//! in order.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::model::ConfigFile;
use crate::engine::{RouterCore, RouterEvent, RouterOptions, Runtime};
use crate::errors::{PipelineError, Result};
use crate::exec::GraphBackend;
use crate::fs::FileSystem;
use crate::graph::{GraphReport, TaskGraph};
use crate::reload::ChangeNotifier;
use crate::server::{self, DevServerHandle};
use crate::transform::BuildEnv;
use crate::watch::{RouteTable, WatcherHandle, spawn_watcher};

/// Router event channel capacity.
const ROUTER_CHANNEL_CAPACITY: usize = 256;

/// Everything started by [`AppContext::start_watch_phase`].
#[derive(Debug)]
struct WatchPhase {
    router_tx: mpsc::Sender<RouterEvent>,
    router: Option<JoinHandle<Result<RouterCore>>>,
    watcher: WatcherHandle,
    server: DevServerHandle,
}

#[derive(Debug)]
pub struct AppContext {
    config: ConfigFile,
    graph: Arc<TaskGraph>,
    env: BuildEnv,
    notifier: ChangeNotifier,
    watch: Option<WatchPhase>,
}

impl AppContext {
    pub fn new(config: ConfigFile, root: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Result<Self> {
        let graph = Arc::new(TaskGraph::from_config(&config)?);
        Ok(Self {
            config,
            graph,
            env: BuildEnv::new(root, fs),
            notifier: ChangeNotifier::default(),
            watch: None,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn graph(&self) -> &Arc<TaskGraph> {
        &self.graph
    }

    pub fn env(&self) -> &BuildEnv {
        &self.env
    }

    pub fn root(&self) -> &Path {
        &self.env.root
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Fail if a mandatory source spec matches nothing.
    pub fn preflight(&self) -> Result<()> {
        self.graph.preflight(&self.env)
    }

    pub async fn build_all(&self) -> GraphReport {
        self.graph.run_all(&self.env, &self.notifier).await
    }

    pub async fn build_group(&self, name: &str) -> Result<GraphReport> {
        self.graph.run_group(name, &self.env, &self.notifier).await
    }

    /// Start the dev server, the router and the filesystem watcher.
    ///
    /// The server starts first: a port conflict aborts the watch phase
    /// before anything is watched.
    pub async fn start_watch_phase(&mut self) -> Result<()> {
        if self.watch.is_some() {
            return Err(PipelineError::ConfigError(
                "watch phase already started".to_string(),
            ));
        }

        let root = self.env.root.clone();
        let dest_root = PathBuf::from(&self.config.config.dest_root);
        let server = server::start(
            &self.config.server.host,
            self.config.server.port,
            root.join(&dest_root),
            self.notifier.clone(),
        )
        .await?;

        let routes = RouteTable::from_config(&self.config)?;
        if let Err(e) = routes.report_overlaps(self.env.fs.as_ref(), &root) {
            warn!("could not scan watch roots for overlapping routes: {e:#}");
        }

        let (router_tx, router_rx) = mpsc::channel(ROUTER_CHANNEL_CAPACITY);
        let watcher = spawn_watcher(&root, &routes.watch_roots(), &dest_root, router_tx.clone())?;

        let mut core = RouterCore::new(routes, RouterOptions::default());
        core.arm();
        let backend = GraphBackend::new(Arc::clone(&self.graph), self.env.clone(), router_tx.clone());
        let runtime = Runtime::new(core, router_rx, backend, self.notifier.clone());
        let router = tokio::spawn(runtime.run());

        info!(addr = %server.local_addr(), "watch phase started");
        self.watch = Some(WatchPhase {
            router_tx,
            router: Some(router),
            watcher,
            server,
        });
        Ok(())
    }

    /// Sender into the router, once the watch phase is running.
    pub fn router_sender(&self) -> Option<mpsc::Sender<RouterEvent>> {
        self.watch.as_ref().map(|w| w.router_tx.clone())
    }

    /// Directories the filesystem watcher actually registered. Roots that
    /// were missing at watch start are absent.
    pub fn watched_roots(&self) -> Option<&[PathBuf]> {
        self.watch.as_ref().map(|w| w.watcher.watched())
    }

    pub fn server_addr(&self) -> Option<SocketAddr> {
        self.watch.as_ref().map(|w| w.server.local_addr())
    }

    /// Block until Ctrl-C, or until the router stops on its own.
    pub async fn wait_for_exit(&mut self) -> Result<()> {
        let Some(router) = self.watch.as_mut().and_then(|w| w.router.as_mut()) else {
            return Ok(());
        };

        let finished = tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res?;
                info!("interrupt received; shutting down");
                None
            }
            res = router => Some(res),
        };

        if let Some(res) = finished {
            if let Some(w) = self.watch.as_mut() {
                w.router = None;
            }
            match res {
                Ok(Ok(_)) => info!("router stopped"),
                Ok(Err(e)) => error!("router failed: {e}"),
                Err(e) => error!("router task aborted: {e}"),
            }
        }
        Ok(())
    }

    /// Stop watching, let in-flight runs finish, then stop the dev server.
    pub async fn shutdown(self) -> Result<()> {
        let Some(phase) = self.watch else {
            return Ok(());
        };
        let WatchPhase {
            router_tx,
            router,
            watcher,
            server,
        } = phase;

        watcher.stop().await;

        if let Some(router) = router {
            // Send fails only if the router already stopped.
            let _ = router_tx.send(RouterEvent::ShutdownRequested).await;
            match router.await {
                Ok(Ok(core)) => info!(in_flight = core.in_flight(), "router drained"),
                Ok(Err(e)) => error!("router failed while draining: {e}"),
                Err(e) => error!("router task aborted: {e}"),
            }
        }

        server.shutdown().await
    }
}
