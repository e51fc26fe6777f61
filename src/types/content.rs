//! Content part types for tenant-submitted request bodies.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Tenant-submitted user content: plain text or a sequence of typed parts.
///
/// Part kinds form a closed set; payloads with an unrecognized `type` tag
/// fail deserialization instead of being silently dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserContent {
    /// Plain text body
    Text(String),
    /// Mixed text and inline-image parts
    Parts(Vec<ContentPart>),
}

/// A content part within a message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text content
    Text {
        /// The text content
        text: String,
    },
    /// Inline image content
    Image {
        /// Image source
        source: ImageSource,
    },
}

/// Image source for image content parts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    /// Base64 encoded image
    Base64 {
        /// Media type (e.g., "image/png")
        media_type: String,
        /// Base64 encoded data
        data: String,
    },
}

impl ContentPart {
    /// Create a text content part
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    /// Create an inline base64 image part
    pub fn image(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        ContentPart::Image {
            source: ImageSource::Base64 {
                media_type: media_type.into(),
                data: data.into(),
            },
        }
    }

    /// Get text content if this is a text part
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text { text } => Some(text),
            ContentPart::Image { .. } => None,
        }
    }
}

impl From<&str> for UserContent {
    fn from(text: &str) -> Self {
        UserContent::Text(text.to_string())
    }
}

impl From<String> for UserContent {
    fn from(text: String) -> Self {
        UserContent::Text(text)
    }
}

impl UserContent {
    /// Check the content is usable before any billable work starts.
    pub fn validate(&self) -> Result<()> {
        match self {
            UserContent::Text(text) => {
                if text.trim().is_empty() {
                    return Err(Error::Validation("user content must not be empty".into()));
                }
            }
            UserContent::Parts(parts) => {
                if parts.is_empty() {
                    return Err(Error::Validation(
                        "user content must contain at least one part".into(),
                    ));
                }
                for part in parts {
                    if let ContentPart::Image {
                        source: ImageSource::Base64 { media_type, data },
                    } = part
                    {
                        if !media_type.starts_with("image/") {
                            return Err(Error::Validation(format!(
                                "unsupported image media type: {media_type}"
                            )));
                        }
                        if data.is_empty() {
                            return Err(Error::Validation("image data must not be empty".into()));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Normalize into content parts for the upstream message sequence.
    pub fn into_parts(self) -> Vec<ContentPart> {
        match self {
            UserContent::Text(text) => vec![ContentPart::Text { text }],
            UserContent::Parts(parts) => parts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_roundtrip() {
        let content: UserContent = serde_json::from_str("\"hello\"").unwrap();
        assert!(matches!(content, UserContent::Text(ref t) if t == "hello"));
    }

    #[test]
    fn test_typed_parts_roundtrip() {
        let json = r#"[
            {"type": "text", "text": "describe this"},
            {"type": "image", "source": {"type": "base64", "media_type": "image/png", "data": "aGk="}}
        ]"#;
        let content: UserContent = serde_json::from_str(json).unwrap();
        let parts = content.into_parts();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].as_text(), Some("describe this"));
    }

    #[test]
    fn test_unrecognized_part_kind_is_rejected() {
        let json = r#"[{"type": "video", "url": "https://example.com/clip"}]"#;
        assert!(serde_json::from_str::<UserContent>(json).is_err());
    }

    #[test]
    fn test_empty_text_fails_validation() {
        assert!(UserContent::Text("   ".into()).validate().is_err());
        assert!(UserContent::Parts(vec![]).validate().is_err());
    }

    #[test]
    fn test_non_image_media_type_fails_validation() {
        let content = UserContent::Parts(vec![ContentPart::image("application/pdf", "aGk=")]);
        assert!(content.validate().is_err());
    }
}
