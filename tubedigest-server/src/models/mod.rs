//! Domain models for the TubeDigest service

pub mod channel;
pub mod summary;
pub mod task;
pub mod video;

pub use channel::{Channel, PollFrequency};
pub use summary::{Summary, SummaryDraft, SummarySection};
pub use task::{BulkOutcome, TaskSnapshot};
pub use video::{NewVideo, Video, VideoListing};
