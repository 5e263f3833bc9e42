//! Search/post transports.

pub mod twitter;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::pipeline::types::{PostedStatus, SearchCandidate};

pub use twitter::TwitterTransport;

/// Transport adapter: pure I/O, no decision logic.
///
/// Filtering, pacing and dedup live in `RunController`.
#[async_trait]
pub trait StatusTransport: Send + Sync {
    /// Transport name for logging (e.g. "twitter").
    fn name(&self) -> &str;

    /// Search recent statuses for `query`. Encoding is the transport's job.
    async fn search(&self, query: &str) -> Result<Vec<SearchCandidate>, TransportError>;

    /// Publish `text`, optionally as a reply to `in_reply_to`.
    async fn post(
        &self,
        text: &str,
        in_reply_to: Option<&str>,
    ) -> Result<PostedStatus, TransportError>;
}
