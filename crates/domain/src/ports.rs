//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the domain and external systems.
//! Adapters implement these traits to connect to real infrastructure.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::model::{ApiEnvelope, ReplyPage, VideoView};

/// Error type for comment source operations
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Invalid response body: {0}")]
    Decode(String),
}

/// Port for the comment API (reached through the header-forging proxy)
#[async_trait]
pub trait CommentSource: Send + Sync {
    /// Resolve a public video identifier to the source's internal object ID
    async fn lookup_video(&self, video_id: &str) -> Result<ApiEnvelope<VideoView>, SourceError>;

    /// Fetch one page of comments, 1-based
    ///
    /// `video_id` is passed along so the proxy can forge a matching referer.
    async fn fetch_page(
        &self,
        object_id: u64,
        video_id: &str,
        page: u32,
    ) -> Result<ApiEnvelope<ReplyPage>, SourceError>;
}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
