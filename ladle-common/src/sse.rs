//! Server-Sent Events (SSE) utilities
//!
//! Shared SSE stream construction for ladle services.

use crate::events::EventBus;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// Create an SSE stream forwarding all EventBus events to the client
///
/// Sends an initial `ConnectionStatus: connected` event, then one SSE
/// event per bus event (event name = `IngestEvent::event_type()`, data =
/// JSON body). Lagged subscribers skip the missed events and continue.
pub fn event_bus_sse_stream(
    service_name: &'static str,
    bus: &EventBus,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to {} events", service_name);
    let mut rx = bus.subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            match rx.recv().await {
                Ok(event) => {
                    let name = event.event_type().to_string();
                    match serde_json::to_string(&event) {
                        Ok(json) => {
                            yield Ok(Event::default().event(name).data(json));
                        }
                        Err(e) => {
                            debug!("SSE: failed to serialize {} event: {}", name, e);
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("SSE: {} subscriber lagged, skipped {} events", service_name, skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
