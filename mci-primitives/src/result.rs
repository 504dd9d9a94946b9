//! Normalised execution result envelope.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Typed content item returned by a tool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    /// Plain text.
    Text {
        /// Text payload.
        text: String,
    },
    /// Base64-encoded image.
    Image {
        /// Base64 payload.
        data: String,
        /// MIME type of the payload.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// Base64-encoded audio.
    Audio {
        /// Base64 payload.
        data: String,
        /// MIME type of the payload.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

impl ContentItem {
    /// Creates a text item.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Returns the text payload for text items.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Image { .. } | Self::Audio { .. } => None,
        }
    }
}

/// Result envelope shared by every executor.
///
/// An error result never carries content and always carries a non-empty
/// message; a successful result never carries an error message. Diagnostic
/// payloads of failed operations (response bodies, process output) travel in
/// the metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawExecutionResult")]
pub struct ExecutionResult {
    is_error: bool,
    #[serde(default)]
    content: Vec<ContentItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<Map<String, Value>>,
}

/// Wire form checked against the envelope invariants on the way in.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawExecutionResult {
    is_error: bool,
    #[serde(default)]
    content: Vec<ContentItem>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

impl TryFrom<RawExecutionResult> for ExecutionResult {
    type Error = String;

    fn try_from(raw: RawExecutionResult) -> Result<Self, Self::Error> {
        if raw.is_error {
            if !raw.content.is_empty() {
                return Err("error result must not carry content".to_owned());
            }
            if raw.error.as_deref().is_none_or(|message| message.trim().is_empty()) {
                return Err("error result requires a non-empty error message".to_owned());
            }
        } else if raw.error.is_some() {
            return Err("successful result must not carry an error message".to_owned());
        }
        Ok(Self {
            is_error: raw.is_error,
            content: raw.content,
            error: raw.error,
            metadata: raw.metadata,
        })
    }
}

impl ExecutionResult {
    /// Successful result with the supplied content items.
    #[must_use]
    pub fn success(content: Vec<ContentItem>) -> Self {
        Self {
            is_error: false,
            content,
            error: None,
            metadata: None,
        }
    }

    /// Successful result holding a single text item.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::success(vec![ContentItem::text(text)])
    }

    /// Error result with the supplied message.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = "execution failed".to_owned();
        }
        Self {
            is_error: true,
            content: Vec::new(),
            error: Some(message),
            metadata: None,
        }
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Returns true for error results.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.is_error
    }

    /// Content items; empty for error results.
    #[must_use]
    pub fn content(&self) -> &[ContentItem] {
        &self.content
    }

    /// Error message, present only for error results.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Optional diagnostic metadata.
    #[must_use]
    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        self.metadata.as_ref()
    }

    /// Looks up a single metadata entry.
    #[must_use]
    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.metadata.as_ref().and_then(|meta| meta.get(key))
    }

    /// Concatenates every text item.
    #[must_use]
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentItem::as_text)
            .collect()
    }
}
