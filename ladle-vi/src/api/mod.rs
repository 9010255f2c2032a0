//! HTTP API handlers for ladle-vi
//!
//! REST endpoints for starting and observing ingestion runs, SSE event
//! streaming, and service settings.

pub mod health;
pub mod ingest;
pub mod settings;
pub mod sse;

pub use health::health_routes;
pub use ingest::ingest_routes;
pub use settings::settings_routes;
pub use sse::ingest_event_stream;
