use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::Sse;
use axum::response::sse::{Event, KeepAlive};
use bytes::Bytes;
use futures::stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::warn;

use crate::config::SSE_KEEPALIVE_SECS;
use crate::state::{AppState, LabelEvent};

pub async fn label_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Subscribe before reading the snapshot so no publish falls in between.
    let rx = state.event_tx.subscribe();
    let snapshot = state.orchestrator.current_events().await;
    let stream = async_stream::stream! {
        for event in snapshot {
            if let Some(event) = labels_event(&event) {
                yield Ok(event);
            }
        }

        let mut stream = BroadcastStream::new(rx);
        while let Some(result) = stream.next().await {
            match result {
                Ok(event) => {
                    if let Some(event) = labels_event(&event) {
                        yield Ok(event);
                    }
                }
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    // Each event replaces the previous labels, so the next one catches the client up.
                    warn!(
                        skipped_events = skipped,
                        "SSE client lagged behind broadcast buffer"
                    );
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(SSE_KEEPALIVE_SECS))
            .text("keep-alive"),
    )
}

fn labels_event(event: &LabelEvent) -> Option<Event> {
    let Some(payload) = event_payload(event.json.as_ref()) else {
        warn!(
            generation = event.generation,
            "label event payload is not valid utf-8; dropping SSE event"
        );
        return None;
    };
    Some(
        Event::default()
            .id(event.generation.to_string())
            .event("labels")
            .data(payload),
    )
}

fn event_payload(bytes: &Bytes) -> Option<&str> {
    std::str::from_utf8(bytes.as_ref()).ok()
}
