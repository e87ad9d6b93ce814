//! One-shot image description through a vision-capable model.
//!
//! When the selected model cannot see images, the image blocks are described
//! once by the vision fallback model and the description is prepended to the
//! text prompt before the main loop starts. Only inline base64 sources are
//! accepted; URL sources are rejected as unsupported.

use base64::Engine;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::client::{ApiClient, ChatRequest};
use super::ApiError;
use crate::models::VISION_FALLBACK_MODEL;
use crate::types::{ContentBlock, ImageSource, Message, MessageContent};

const DESCRIBE_PROMPT: &str = "Describe the attached image(s) in detail, including any visible \
     text, so the description can stand in for the images in a follow-up \
     conversation.";

/// Describes the image blocks among `blocks` using the vision model.
///
/// # Errors
///
/// - [`ApiError::UnsupportedImageSource`] for URL-sourced images.
/// - [`ApiError::InvalidImagePayload`] when a base64 payload does not decode.
/// - Transport errors from the underlying request.
pub(crate) async fn describe_images(
    client: &ApiClient,
    blocks: &[ContentBlock],
    cancel: &CancellationToken,
) -> Result<String, ApiError> {
    let images: Vec<ContentBlock> = blocks
        .iter()
        .filter(|block| block.is_image())
        .cloned()
        .collect();
    debug_assert!(!images.is_empty());

    for block in &images {
        if let ContentBlock::Image { source } = block {
            validate_source(source)?;
        }
    }

    let mut content = vec![ContentBlock::text(DESCRIBE_PROMPT)];
    content.extend(images);
    let messages = vec![Message::user(MessageContent::Blocks(content))];

    debug!(model = VISION_FALLBACK_MODEL, "describing images");
    let request = ChatRequest::new(VISION_FALLBACK_MODEL, &messages, false);
    client.complete_chat(&request, cancel).await
}

fn validate_source(source: &ImageSource) -> Result<(), ApiError> {
    match source {
        ImageSource::Url { .. } => Err(ApiError::UnsupportedImageSource),
        ImageSource::Base64 { data, .. } => {
            base64::engine::general_purpose::STANDARD
                .decode(data)
                .map_err(|e| ApiError::InvalidImagePayload(e.to_string()))?;
            Ok(())
        }
    }
}
