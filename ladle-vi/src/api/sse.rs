//! Server-Sent Events endpoint for ingestion progress
//!
//! Thin wrapper over the shared event-bus stream: every job event on
//! the bus reaches every connected client, no per-job filtering.
//! Clients watching a single job filter by the `job_id` field.

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use futures::stream::Stream;
use std::convert::Infallible;

use crate::AppState;

/// GET /ingest/events
pub async fn ingest_event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    ladle_common::sse::event_bus_sse_stream("ingest", &state.event_bus)
}
