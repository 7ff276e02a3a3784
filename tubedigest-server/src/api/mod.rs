//! HTTP API handlers for tubedigest-server
//!
//! JSON REST endpoints plus an SSE stream at `/events`.

pub mod channels;
pub mod export;
pub mod health;
pub mod settings;
pub mod sse;
pub mod summaries;
pub mod tasks;
pub mod videos;

pub use channels::channel_routes;
pub use export::export_routes;
pub use health::health_routes;
pub use settings::settings_routes;
pub use sse::event_stream;
pub use summaries::summary_routes;
pub use tasks::task_routes;
pub use videos::video_routes;
