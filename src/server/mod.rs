// src/server/mod.rs

//! Development HTTP server.
//!
//! Serves the build output tree, injects the live-reload client into HTML
//! pages and relays [`ChangeNotifier`] signals to browsers over Server-Sent
//! Events.

pub mod assets;
pub mod sse;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::errors::{PipelineError, Result};
use crate::reload::ChangeNotifier;

/// SSE endpoint the client script connects to.
pub const EVENTS_PATH: &str = "/__assetpipe/events";
/// Live-reload client script.
pub const CLIENT_PATH: &str = "/__assetpipe/client.js";

/// Shared server state.
#[derive(Debug)]
pub struct ServerState {
    /// Directory served by the static fallback.
    pub root: PathBuf,
    pub notifier: ChangeNotifier,
    /// Flips to `true` once shutdown starts; open event streams end on it.
    pub shutdown: watch::Receiver<bool>,
}

pub type SharedState = Arc<ServerState>;

/// Running dev server.
#[derive(Debug)]
pub struct DevServerHandle {
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<std::io::Result<()>>,
}

impl DevServerHandle {
    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections, end event streams and wait for in-flight
    /// requests to finish.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown_tx.send(true);
        match self.join.await {
            Ok(Ok(())) => {
                info!("dev server stopped");
                Ok(())
            }
            Ok(Err(e)) => Err(PipelineError::DevServer(e.to_string())),
            Err(e) => Err(PipelineError::DevServer(format!("server task failed: {e}"))),
        }
    }
}

/// Build the axum router for `state`.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route(EVENTS_PATH, get(sse::events_handler))
        .route(CLIENT_PATH, get(assets::client_script))
        .fallback(assets::static_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `host:port` and start serving `root`.
///
/// Failing to bind is a [`PipelineError::DevServer`].
pub async fn start(
    host: &str,
    port: u16,
    root: impl Into<PathBuf>,
    notifier: ChangeNotifier,
) -> Result<DevServerHandle> {
    let listener = TcpListener::bind((host, port))
        .await
        .map_err(|e| PipelineError::DevServer(format!("cannot bind {host}:{port}: {e}")))?;
    let local_addr = listener.local_addr()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = Arc::new(ServerState {
        root: root.into(),
        notifier,
        shutdown: shutdown_rx.clone(),
    });
    let app = router(state);

    let mut signal = shutdown_rx;
    let join = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                if signal.wait_for(|stop| *stop).await.is_err() {
                    warn!("dev server shutdown sender dropped");
                }
            })
            .await
    });

    info!("dev server listening on http://{local_addr}");
    Ok(DevServerHandle {
        local_addr,
        shutdown_tx,
        join,
    })
}
