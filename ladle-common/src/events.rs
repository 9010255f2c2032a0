//! Event types and broadcast bus for the ingest event system

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Ingest pipeline event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IngestEvent {
    /// Job moved to a new status
    JobStatusChanged {
        job_id: Uuid,
        status: String,
        timestamp: DateTime<Utc>,
    },

    /// Progress detail within a stage
    JobProgress {
        job_id: Uuid,
        stage: String,
        detail: String,
        timestamp: DateTime<Utc>,
    },

    /// Job reached COMPLETED with a persisted record
    JobCompleted {
        job_id: Uuid,
        recipe_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Job reached FAILED
    JobFailed {
        job_id: Uuid,
        error_code: String,
        timestamp: DateTime<Utc>,
    },
}

impl IngestEvent {
    /// Get event type as string for SSE event naming and filtering
    pub fn event_type(&self) -> &str {
        match self {
            IngestEvent::JobStatusChanged { .. } => "JobStatusChanged",
            IngestEvent::JobProgress { .. } => "JobProgress",
            IngestEvent::JobCompleted { .. } => "JobCompleted",
            IngestEvent::JobFailed { .. } => "JobFailed",
        }
    }

    /// Job this event belongs to
    pub fn job_id(&self) -> Uuid {
        match self {
            IngestEvent::JobStatusChanged { job_id, .. }
            | IngestEvent::JobProgress { job_id, .. }
            | IngestEvent::JobCompleted { job_id, .. }
            | IngestEvent::JobFailed { job_id, .. } => *job_id,
        }
    }
}

/// Broadcast event bus shared by the API layer and pipeline runs
///
/// Uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<IngestEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<IngestEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` when nobody is listening. Callers that don't care use `.ok()`.
    pub fn emit(
        &self,
        event: IngestEvent,
    ) -> std::result::Result<usize, broadcast::error::SendError<IngestEvent>> {
        self.tx.send(event)
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
