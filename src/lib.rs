pub mod ai;
pub mod app;
pub mod cache;
pub mod config;
pub mod controller;
pub mod handler;
pub mod logging;
pub mod message;
pub mod postprocess;
pub mod render;
pub mod tui;
pub mod ui;

// Re-export main types for convenience
pub use ai::{ChatClient, ChatReply, HfImageClassifier, ImageClient, ImageReply, Label};
pub use cache::ImageCache;
pub use config::Config;
pub use controller::{Completion, ConversationController, Services};
pub use message::{Conversation, Message};
pub use render::{Row, RowKind};
