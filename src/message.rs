//! Chat entries shown in the conversation pane
//!
//! A `Message` is a plain value: the controller builds one per user action or
//! remote reply and never mutates it afterwards.

use serde::{Deserialize, Serialize};

/// Placeholder text carried by typing rows. Never rendered as text.
pub const TYPING_TEXT: &str = "Typing...";

/// A single chat entry (text or image, sender side, typing flag)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub content: String,
    pub image_url: Option<String>,
    pub is_user_message: bool,
    pub is_typing: bool,
    pub is_image: bool,
}

impl Message {
    /// Text typed by the user
    pub fn user_text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            image_url: None,
            is_user_message: true,
            is_typing: false,
            is_image: false,
        }
    }

    /// Text reply from the assistant (or an inline error)
    pub fn reply_text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            image_url: None,
            is_user_message: false,
            is_typing: false,
            is_image: false,
        }
    }

    /// Photo supplied by the user, referenced by its cached file path
    pub fn user_image(image_url: impl Into<String>) -> Self {
        Self {
            content: String::new(),
            image_url: Some(image_url.into()),
            is_user_message: true,
            is_typing: false,
            is_image: true,
        }
    }

    /// Image produced by the generation endpoint
    pub fn generated_image(image_url: impl Into<String>) -> Self {
        Self {
            content: "Generated Image".to_string(),
            image_url: Some(image_url.into()),
            is_user_message: false,
            is_typing: false,
            is_image: true,
        }
    }

    pub fn typing() -> Self {
        Self {
            content: TYPING_TEXT.to_string(),
            image_url: None,
            is_user_message: false,
            is_typing: true,
            is_image: false,
        }
    }
}

/// Read-only copy of the conversation handed to the renderer
pub type Conversation = Vec<Message>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typing_placeholder_has_no_payload() {
        let msg = Message::typing();
        assert!(msg.is_typing);
        assert!(!msg.is_image);
        assert!(msg.image_url.is_none());
        assert!(!msg.is_user_message);
    }

    #[test]
    fn test_user_image_is_tagged() {
        let msg = Message::user_image("/tmp/generated_1.jpg");
        assert!(msg.is_image);
        assert!(msg.is_user_message);
        assert_eq!(msg.content, "");
        assert_eq!(msg.image_url.as_deref(), Some("/tmp/generated_1.jpg"));
    }

    #[test]
    fn test_generated_image_caption() {
        let msg = Message::generated_image("/tmp/generated_2.jpg");
        assert_eq!(msg.content, "Generated Image");
        assert!(!msg.is_user_message);
    }
}
