//! Services for tubedigest-server
//!
//! External clients sit behind traits (`ChannelDirectory`, `VideoCatalog`,
//! `TranscriptSource`, `Summarizer`) so the resolver, pipeline and poller
//! can be exercised against in-process fakes.

pub mod archive;
pub mod channel_resolver;
pub mod exporter;
pub mod markdown;
pub mod summarizer;
pub mod summary_pipeline;
pub mod task_registry;
pub mod transcript;
pub mod vault_client;
pub mod video_poller;
pub mod youtube_client;

pub use channel_resolver::{ChannelResolver, ChannelUrl, Resolution, ResolutionTier, ResolveError};
pub use markdown::ExportNote;
pub use summarizer::{LlmClient, SummarizeError, Summarizer, SummaryRequest};
pub use summary_pipeline::{PipelineOutcome, SummaryPipeline};
pub use task_registry::{TaskError, TaskHandle, TaskRegistry};
pub use transcript::{TimedTextClient, TranscriptError, TranscriptSource};
pub use vault_client::{VaultClient, VaultError};
pub use video_poller::{PollError, SweepReport, VideoPoller};
pub use youtube_client::{
    ChannelCandidate, ChannelDetails, ChannelDirectory, VideoCatalog, YouTubeClient, YouTubeError,
};
