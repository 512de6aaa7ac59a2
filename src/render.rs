//! Projection of the conversation into renderable rows
//!
//! Each message maps to exactly one row kind. Precedence, highest first:
//! typing, own image, received image, own text, received text.

use crate::message::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowKind {
    SentText,
    ReceivedText,
    Typing,
    SentImage,
    ReceivedImage,
}

impl RowKind {
    pub fn of(message: &Message) -> Self {
        if message.is_typing {
            RowKind::Typing
        } else if message.is_image && message.is_user_message {
            RowKind::SentImage
        } else if message.is_image {
            RowKind::ReceivedImage
        } else if message.is_user_message {
            RowKind::SentText
        } else {
            RowKind::ReceivedText
        }
    }
}

/// A message paired with the row kind it renders as
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row<'a> {
    /// Plain text, as typed
    SentText(&'a str),
    /// Markdown reply (or inline error)
    ReceivedText(&'a str),
    /// User photo; may be a URL or a local path
    SentImage(Option<&'a str>),
    /// Generated image in the local cache
    ReceivedImage { path: Option<&'a str>, caption: &'a str },
    Typing,
}

impl<'a> Row<'a> {
    pub fn kind(&self) -> RowKind {
        match self {
            Row::SentText(_) => RowKind::SentText,
            Row::ReceivedText(_) => RowKind::ReceivedText,
            Row::SentImage(_) => RowKind::SentImage,
            Row::ReceivedImage { .. } => RowKind::ReceivedImage,
            Row::Typing => RowKind::Typing,
        }
    }
}

impl<'a> From<&'a Message> for Row<'a> {
    fn from(message: &'a Message) -> Self {
        let image_url = message.image_url.as_deref().filter(|url| !url.is_empty());
        match RowKind::of(message) {
            RowKind::Typing => Row::Typing,
            RowKind::SentImage => Row::SentImage(image_url),
            RowKind::ReceivedImage => Row::ReceivedImage {
                path: image_url,
                caption: &message.content,
            },
            RowKind::SentText => Row::SentText(&message.content),
            RowKind::ReceivedText => Row::ReceivedText(&message.content),
        }
    }
}

/// Full projection of a snapshot. Recomputed on every redraw.
pub fn rows(messages: &[Message]) -> Vec<Row<'_>> {
    messages.iter().map(Row::from).collect()
}
