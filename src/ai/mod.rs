//! Clients for the hosted AI services
//!
//! Each service sits behind a trait so the conversation controller can run
//! against in-process fakes. Implementations never return errors to the
//! caller: every outcome is folded into a reply value.

pub mod chat;
pub mod classifier;
pub mod image;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;

pub use self::chat::ChatClient;
pub use self::classifier::{HfImageClassifier, Label};
pub use self::image::ImageClient;

/// Outcome of one chat turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatReply {
    Content(String),
    Error(String),
}

impl ChatReply {
    pub fn text(&self) -> &str {
        match self {
            ChatReply::Content(text) | ChatReply::Error(text) => text,
        }
    }
}

/// Outcome of one image generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageReply {
    Saved(PathBuf),
    Error(String),
}

#[async_trait]
pub trait ChatService: Send + Sync {
    async fn send_chat_turn(&self, text: &str) -> ChatReply;
}

#[async_trait]
pub trait ImageService: Send + Sync {
    async fn generate_image(&self, prompt: &str) -> ImageReply;
}

/// Classifies an encoded photo. Labels come back in descending confidence.
#[async_trait]
pub trait ImageClassifier: Send + Sync {
    async fn classify(&self, photo: &[u8]) -> Result<Vec<Label>>;
}

/// Shared HTTP client: `timeout` bounds both connect and the whole exchange.
// TODO: use a per-read timeout once on reqwest 0.12 (`read_timeout`), so long image downloads aren't cut off.
pub fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()
        .context("failed building HTTP client")
}
