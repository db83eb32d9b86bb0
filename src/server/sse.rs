// src/server/sse.rs

//! Server-Sent Events endpoint relaying reload signals.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use crate::server::SharedState;
use crate::types::ReloadKind;

fn reload_event(kind: ReloadKind) -> Event {
    Event::default()
        .event(kind.event_name())
        .data(kind.event_name())
}

/// SSE handler: one event per reload signal until the server shuts down.
pub async fn events_handler(
    State(app): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut signals = app.notifier.subscribe();
    let mut shutdown = app.shutdown.clone();

    let stream = async_stream::stream! {
        // Lets clients (and tests) know the subscription is live.
        yield Ok(Event::default().comment("connected"));

        loop {
            if *shutdown.borrow() {
                break;
            }
            let next = tokio::select! {
                msg = signals.recv() => Some(msg),
                _ = shutdown.changed() => None,
            };
            let Some(msg) = next else { break };

            match msg {
                Ok(kind) => yield Ok(reload_event(kind)),
                Err(RecvError::Lagged(missed)) => {
                    debug!(missed, "event stream lagged; forcing full reload");
                    yield Ok(reload_event(ReloadKind::Other));
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("event stream closed");
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}
