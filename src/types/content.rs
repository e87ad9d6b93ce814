//! Content block types for multimodal prompts.
//!
//! Prompts can be plain text or an ordered list of content blocks, where a
//! block is either text or an inline image. Images are carried as base64
//! payloads; URL-style sources (including `file://`) are accepted at the type
//! level but rejected before any network call is made, since only inline
//! base64 sources may be forwarded to the vision model.

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// A single block of prompt content.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text {
        /// The text content.
        text: String,
    },

    /// An image, referenced by source.
    Image {
        /// Where the image bytes come from.
        source: ImageSource,
    },
}

/// The source of an image content block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    /// Inline base64-encoded image data.
    Base64 {
        /// MIME type, e.g. "image/png".
        media_type: String,
        /// Base64-encoded image bytes.
        data: String,
    },

    /// A URL reference. Never forwarded to the API; rejected as unsupported.
    Url {
        /// The URL value as supplied by the caller.
        url: String,
    },
}

impl ContentBlock {
    /// Creates a text block.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Creates an inline base64 image block.
    #[must_use]
    pub fn image_base64(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self::Image {
            source: ImageSource::Base64 {
                media_type: media_type.into(),
                data: data.into(),
            },
        }
    }

    /// Returns true if this is a text block.
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text { .. })
    }

    /// Returns true if this is an image block.
    #[must_use]
    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image { .. })
    }

    /// Extracts the text if this is a text block.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Image { .. } => None,
        }
    }
}

impl ImageSource {
    /// Returns the inline base64 payload, if this is a base64 source.
    #[must_use]
    pub fn as_base64(&self) -> Option<(&str, &str)> {
        match self {
            Self::Base64 { media_type, data } => Some((media_type, data)),
            Self::Url { .. } => None,
        }
    }

    /// Renders the source as a `data:` URI for the wire format.
    ///
    /// Returns `None` for URL sources, which are never sent.
    #[must_use]
    pub fn to_data_uri(&self) -> Option<String> {
        self.as_base64()
            .map(|(media_type, data)| format!("data:{media_type};base64,{data}"))
    }
}

// The wire format is the OpenAI-compatible content-part shape:
// {"type":"text","text":...} or {"type":"image_url","image_url":{"url":"data:..."}}.
// URL sources serialize with an empty url; callers must reject them first.
impl Serialize for ContentBlock {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text { text } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "text")?;
                map.serialize_entry("text", text)?;
                map.end()
            }
            Self::Image { source } => {
                let uri = source.to_data_uri().unwrap_or_default();
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "image_url")?;
                map.serialize_entry("image_url", &serde_json::json!({ "url": uri }))?;
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_block_accessors() {
        let block = ContentBlock::text("hello");
        assert!(block.is_text());
        assert!(!block.is_image());
        assert_eq!(block.as_text(), Some("hello"));
    }

    #[test]
    fn test_image_block_accessors() {
        let block = ContentBlock::image_base64("image/png", "aGVsbG8=");
        assert!(block.is_image());
        assert_eq!(block.as_text(), None);
    }

    #[test]
    fn test_base64_source_data_uri() {
        let source = ImageSource::Base64 {
            media_type: "image/png".to_string(),
            data: "aGVsbG8=".to_string(),
        };
        assert_eq!(
            source.to_data_uri(),
            Some("data:image/png;base64,aGVsbG8=".to_string())
        );
    }

    #[test]
    fn test_url_source_has_no_data_uri() {
        let source = ImageSource::Url {
            url: "file:///etc/passwd".to_string(),
        };
        assert!(source.as_base64().is_none());
        assert!(source.to_data_uri().is_none());
    }

    #[test]
    fn test_text_block_wire_serialization() {
        let block = ContentBlock::text("hi");
        let json = serde_json::to_value(&block).expect("serialize");
        assert_eq!(json["type"], "text");
        assert_eq!(json["text"], "hi");
    }

    #[test]
    fn test_image_block_wire_serialization() {
        let block = ContentBlock::image_base64("image/jpeg", "QUJD");
        let json = serde_json::to_value(&block).expect("serialize");
        assert_eq!(json["type"], "image_url");
        assert_eq!(json["image_url"]["url"], "data:image/jpeg;base64,QUJD");
    }
}
