//! Streaming chat-completions client and the conversation loop.

pub mod client;
pub mod query;
pub mod sse;
pub mod vision;

pub use client::ApiClient;
pub use query::GlintProvider;
pub use sse::StreamParser;

use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Hard ceiling on one `execute_query` call, applied even without an
/// explicit cancellation so a hung request cannot block indefinitely.
pub(crate) const QUERY_DEADLINE: Duration = Duration::from_secs(300);

/// A transport or protocol failure. These are terminal for the call;
/// per-tool failures never surface here.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No API key is configured.
    #[error("no API key configured; set GLM_API_KEY or pass --api-key")]
    MissingApiKey,

    /// The request failed at the connection level after all retries.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-2xx status. Not retried except 429.
    #[error("API error {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// Still rate-limited after exhausting retries.
    #[error("rate limited after {attempts} attempts")]
    RateLimited {
        /// Attempts made.
        attempts: u32,
    },

    /// The call was cancelled or hit the hard deadline.
    #[error("query cancelled")]
    Cancelled,

    /// The conversation did not converge within the turn budget.
    #[error("turn limit of {turns} reached without completion")]
    TurnLimit {
        /// The configured limit.
        turns: usize,
    },

    /// An image block used a URL source; only inline base64 is supported.
    #[error("unsupported image source: only inline base64 images are supported")]
    UnsupportedImageSource,

    /// The image payload is not valid base64.
    #[error("invalid base64 image payload: {0}")]
    InvalidImagePayload(String),

    /// The server response had an unexpected shape.
    #[error("malformed API response: {0}")]
    MalformedResponse(String),
}

/// Combines the caller's cancellation token with a hard deadline into one
/// token observed at every suspension point. The watcher task exits as soon
/// as the token is cancelled; the conversation loop cancels the token when
/// it returns, so no watcher outlives its query.
pub(crate) fn deadline_token(
    user: &CancellationToken,
    deadline: Duration,
) -> (CancellationToken, tokio::task::JoinHandle<()>) {
    let combined = user.child_token();
    let watcher = combined.clone();
    let handle = tokio::spawn(async move {
        tokio::select! {
            () = watcher.cancelled() => {}
            () = tokio::time::sleep(deadline) => watcher.cancel(),
        }
    });
    (combined, handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deadline_token_fires_on_timeout() {
        let user = CancellationToken::new();
        let (combined, _watcher) = deadline_token(&user, Duration::from_millis(10));
        tokio::time::timeout(Duration::from_secs(1), combined.cancelled())
            .await
            .unwrap();
        assert!(!user.is_cancelled());
    }

    #[tokio::test]
    async fn test_deadline_token_follows_user_cancel() {
        let user = CancellationToken::new();
        let (combined, _watcher) = deadline_token(&user, Duration::from_secs(3600));
        user.cancel();
        tokio::time::timeout(Duration::from_secs(1), combined.cancelled())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_deadline_watcher_exits_once_token_is_cancelled() {
        let user = CancellationToken::new();
        let (combined, watcher) = deadline_token(&user, Duration::from_secs(3600));
        combined.cancel();
        tokio::time::timeout(Duration::from_secs(1), watcher)
            .await
            .unwrap()
            .unwrap();
    }
}
