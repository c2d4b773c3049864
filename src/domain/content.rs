//! Content blocks for multimodal messages and tool results

use serde::{Deserialize, Serialize};

/// A typed fragment of message or tool-result content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    /// Plain text
    Text { text: String },
    /// Inline image, base64-encoded
    Image { data: String, mime_type: String },
    /// Inline audio, base64-encoded
    Audio { data: String, mime_type: String },
    /// Reference to an external resource, optionally with inline text
    Resource {
        uri: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
}

impl ContentBlock {
    /// Create a text block
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create an image block
    pub fn image(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::Image {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Create a resource block
    pub fn resource(uri: impl Into<String>, text: Option<String>) -> Self {
        Self::Resource {
            uri: uri.into(),
            text,
        }
    }
}

/// Flatten a sequence of content blocks to plain text.
///
/// Non-text blocks render as placeholders so the result is always printable
/// and safe to hand to a text-only consumer.
pub fn flatten_blocks(blocks: &[ContentBlock]) -> String {
    let parts: Vec<String> = blocks
        .iter()
        .map(|block| match block {
            ContentBlock::Text { text } => text.clone(),
            ContentBlock::Image { mime_type, .. } => format!("[Image: {}]", mime_type),
            ContentBlock::Audio { mime_type, .. } => format!("[Audio: {}]", mime_type),
            ContentBlock::Resource { uri, text } => match text {
                Some(text) => text.clone(),
                None => format!("[Resource: {}]", uri),
            },
        })
        .collect();
    parts.join("\n")
}
