//! Conversation controller
//!
//! Owns the ordered message list and is only ever touched from the UI loop.
//! Each submission spawns one background task that reports back with exactly
//! one [`Completion`] over the completion channel; the UI loop hands it to
//! [`ConversationController::apply`].

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use anyhow::{Context, Result};
use tokio::sync::mpsc::UnboundedSender;

use crate::ai::{
    http_client, ChatClient, ChatReply, ChatService, HfImageClassifier, ImageClassifier,
    ImageClient, ImageReply, ImageService,
};
use crate::cache::ImageCache;
use crate::config::Config;
use crate::message::{Conversation, Message};
use crate::postprocess::process_reply;

/// Leading token that routes a message to image generation
pub const IMAGINE_PREFIX: &str = "@imagine";

pub const NO_LABELS_NOTICE: &str = "No labels detected.";
pub const CAPTURE_FAILED_NOTICE: &str = "Unable to capture Image";

/// Result of a dispatched background call, delivered back to the UI loop
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Chat(ChatReply),
    Image(ImageReply),
    /// Photo classified and cached; the top label seeds a chat turn
    Labelled { label: String, image_path: PathBuf },
    /// Transient notice, never added to the conversation
    Notice(String),
}

/// Where a submitted line of text goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Chat(String),
    Image(String),
}

/// Picks the outbound path for already-trimmed user text.
pub fn route(text: &str) -> Route {
    match text.strip_prefix(IMAGINE_PREFIX) {
        Some(prompt) => Route::Image(prompt.trim().to_string()),
        None => Route::Chat(text.to_string()),
    }
}

/// Prompt sent to the chat endpoint for a labelled photo
pub fn label_prompt(label: &str) -> String {
    format!(
        "Print this line and give one line description about {}: This is a {}.",
        label, label
    )
}

/// Backends the controller dispatches to
#[derive(Clone)]
pub struct Services {
    pub chat: Arc<dyn ChatService>,
    pub images: Arc<dyn ImageService>,
    pub classifier: Arc<dyn ImageClassifier>,
    pub cache: ImageCache,
}

impl Services {
    /// Real HTTP backends built from configuration, sharing one client.
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = http_client(config.timeout())?;
        let cache = ImageCache::new(config.cache_dir()?);
        let hf_key = config.image_api_key();

        Ok(Self {
            chat: Arc::new(ChatClient::new(
                http.clone(),
                config.chat_base_url(),
                &config.chat_api_key(),
                config.chat_model(),
            )),
            images: Arc::new(ImageClient::new(
                http.clone(),
                config.image_base_url(),
                &hf_key,
                config.image_model(),
                cache.clone(),
            )),
            classifier: Arc::new(HfImageClassifier::new(
                http,
                config.image_base_url(),
                &hf_key,
                config.classifier_model(),
            ).with_min_score(config.classifier_min_score())),
            cache,
        })
    }
}

pub struct ConversationController {
    messages: Vec<Message>,
    notices: VecDeque<String>,
    services: Services,
    completions: UnboundedSender<Completion>,
}

impl ConversationController {
    pub fn new(services: Services, completions: UnboundedSender<Completion>) -> Self {
        Self {
            messages: Vec::new(),
            notices: VecDeque::new(),
            services,
            completions,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Copy of the current list for the renderer
    pub fn snapshot(&self) -> Conversation {
        self.messages.clone()
    }

    pub fn pending(&self) -> usize {
        self.messages.iter().filter(|m| m.is_typing).count()
    }

    pub fn take_notice(&mut self) -> Option<String> {
        self.notices.pop_front()
    }

    /// Replaces the conversation with an empty list. In-flight calls still
    /// complete and append their result.
    pub fn clear(&mut self) {
        self.messages = Vec::new();
    }

    /// Appends the user's text and a typing row, then dispatches exactly one
    /// call. Returns false (and does nothing) for blank input.
    pub fn submit_user_text(&mut self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }

        self.messages.push(Message::user_text(text));
        self.show_typing();

        match route(text) {
            Route::Chat(prompt) => self.dispatch_chat(prompt),
            Route::Image(prompt) => self.dispatch_image(prompt),
        }
        true
    }

    /// Classifies the photo at `photo` in the background. The conversation is
    /// only touched once a label comes back.
    pub fn submit_user_image(&mut self, photo: PathBuf) {
        let classifier = Arc::clone(&self.services.classifier);
        let cache = self.services.cache.clone();
        let completions = self.completions.clone();

        tracing::debug!(photo = %photo.display(), "dispatching photo classification");
        tokio::spawn(async move {
            let completion = label_photo(&*classifier, &cache, photo).await;
            deliver(&completions, completion);
        });
    }

    /// Folds a finished call into the conversation.
    pub fn apply(&mut self, completion: Completion) {
        match completion {
            Completion::Chat(reply) => {
                self.remove_typing();
                let content = match reply {
                    ChatReply::Content(text) => process_reply(&text),
                    ChatReply::Error(err) => err,
                };
                self.messages.push(Message::reply_text(content));
            }
            Completion::Image(reply) => {
                self.remove_typing();
                let message = match reply {
                    ImageReply::Saved(path) => Message::generated_image(path.display().to_string()),
                    ImageReply::Error(err) => Message::reply_text(err),
                };
                self.messages.push(message);
            }
            Completion::Labelled { label, image_path } => {
                self.messages.push(Message::user_image(image_path.display().to_string()));
                self.show_typing();
                self.dispatch_chat(label_prompt(&label));
            }
            Completion::Notice(notice) => {
                tracing::debug!(%notice, "notice");
                self.notices.push_back(notice);
            }
        }
    }

    fn show_typing(&mut self) {
        self.messages.push(Message::typing());
    }

    // Matches on the flag, so overlapping turns clear each other's placeholder.
    fn remove_typing(&mut self) {
        self.messages.retain(|m| !m.is_typing);
    }

    fn dispatch_chat(&self, prompt: String) {
        let chat = Arc::clone(&self.services.chat);
        let completions = self.completions.clone();

        tracing::debug!(prompt_len = prompt.len(), "dispatching chat turn");
        tokio::spawn(async move {
            let reply = chat.send_chat_turn(&prompt).await;
            deliver(&completions, Completion::Chat(reply));
        });
    }

    fn dispatch_image(&self, prompt: String) {
        let images = Arc::clone(&self.services.images);
        let completions = self.completions.clone();

        tracing::debug!(prompt_len = prompt.len(), "dispatching image generation");
        tokio::spawn(async move {
            let reply = images.generate_image(&prompt).await;
            deliver(&completions, Completion::Image(reply));
        });
    }
}

fn deliver(completions: &UnboundedSender<Completion>, completion: Completion) {
    if completions.send(completion).is_err() {
        tracing::debug!("completion dropped: UI loop has shut down");
    }
}

async fn label_photo(
    classifier: &dyn ImageClassifier,
    cache: &ImageCache,
    photo: PathBuf,
) -> Completion {
    let bytes = match tokio::fs::read(&photo).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(photo = %photo.display(), "failed reading photo: {}", e);
            return Completion::Notice(CAPTURE_FAILED_NOTICE.to_string());
        }
    };

    let decode_input = bytes.clone();
    let decoded = tokio::task::spawn_blocking(move || image::load_from_memory(&decode_input)).await;
    let decoded = match decoded {
        Ok(Ok(img)) => img,
        Ok(Err(e)) => {
            tracing::warn!(photo = %photo.display(), "photo is not a decodable image: {}", e);
            return Completion::Notice(CAPTURE_FAILED_NOTICE.to_string());
        }
        Err(e) => {
            tracing::error!("photo decode task failed: {}", e);
            return Completion::Notice(CAPTURE_FAILED_NOTICE.to_string());
        }
    };

    let labels = match classifier.classify(&bytes).await {
        Ok(labels) => labels,
        Err(e) => {
            tracing::warn!("classifier failed: {:#}", e);
            return Completion::Notice(format!("Error: {}", e));
        }
    };

    let Some(top) = labels.into_iter().next() else {
        return Completion::Notice(NO_LABELS_NOTICE.to_string());
    };
    tracing::info!(label = %top.label, score = top.score, "photo labelled");

    match cache_photo(cache.clone(), decoded).await {
        Ok(image_path) => Completion::Labelled { label: top.label, image_path },
        Err(e) => {
            tracing::error!("failed caching photo: {:#}", e);
            Completion::Notice(format!("Error: {}", e))
        }
    }
}

async fn cache_photo(cache: ImageCache, photo: image::DynamicImage) -> Result<PathBuf> {
    tokio::task::spawn_blocking(move || cache.store(&photo))
        .await
        .context("photo cache task failed")?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::Label;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    struct FakeChat {
        reply: ChatReply,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatService for FakeChat {
        async fn send_chat_turn(&self, text: &str) -> ChatReply {
            self.prompts.lock().unwrap().push(text.to_string());
            self.reply.clone()
        }
    }

    struct FakeImages {
        reply: ImageReply,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ImageService for FakeImages {
        async fn generate_image(&self, prompt: &str) -> ImageReply {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone()
        }
    }

    struct FakeClassifier {
        result: std::result::Result<Vec<Label>, String>,
    }

    #[async_trait]
    impl ImageClassifier for FakeClassifier {
        async fn classify(&self, _photo: &[u8]) -> Result<Vec<Label>> {
            self.result.clone().map_err(|e| anyhow::anyhow!(e))
        }
    }

    struct Harness {
        controller: ConversationController,
        rx: UnboundedReceiver<Completion>,
        chat: Arc<FakeChat>,
        images: Arc<FakeImages>,
        _cache_dir: tempfile::TempDir,
    }

    impl Harness {
        fn new(reply: ChatReply, labels: std::result::Result<Vec<Label>, String>) -> Self {
            Self::build(
                reply,
                ImageReply::Saved(PathBuf::from("/cache/generated_1.jpg")),
                Arc::new(FakeClassifier { result: labels }),
                None,
            )
        }

        fn build(
            reply: ChatReply,
            image_reply: ImageReply,
            classifier: Arc<dyn ImageClassifier>,
            cache_path: Option<PathBuf>,
        ) -> Self {
            let cache_dir = tempfile::tempdir().unwrap();
            let cache_path = cache_path.unwrap_or_else(|| cache_dir.path().to_path_buf());
            let chat = Arc::new(FakeChat { reply, prompts: Mutex::new(Vec::new()) });
            let images = Arc::new(FakeImages { reply: image_reply, prompts: Mutex::new(Vec::new()) });
            let services = Services {
                chat: chat.clone(),
                images: images.clone(),
                classifier,
                cache: ImageCache::new(cache_path),
            };
            let (tx, rx) = mpsc::unbounded_channel();
            Self {
                controller: ConversationController::new(services, tx),
                rx,
                chat,
                images,
                _cache_dir: cache_dir,
            }
        }

        fn chatting(reply: &str) -> Self {
            Self::new(ChatReply::Content(reply.to_string()), Ok(Vec::new()))
        }

        async fn settle_one(&mut self) {
            let completion = self.rx.recv().await.unwrap();
            self.controller.apply(completion);
        }
    }

    fn write_photo(dir: &std::path::Path) -> PathBuf {
        let path = dir.join("photo.png");
        image::RgbImage::from_pixel(6, 6, image::Rgb([10, 200, 30]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_route_directive_strips_prefix() {
        assert_eq!(route("@imagine   a castle "), Route::Image("a castle".to_string()));
        assert_eq!(route("imagine a castle"), Route::Chat("imagine a castle".to_string()));
    }

    #[test]
    fn test_label_prompt() {
        assert_eq!(
            label_prompt("banana"),
            "Print this line and give one line description about banana: This is a banana."
        );
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let mut h = Harness::chatting("unused");
        assert!(!h.controller.submit_user_text("   \n\t"));
        assert!(h.controller.messages().is_empty());
        assert!(h.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_submit_appends_user_then_typing() {
        let mut h = Harness::chatting("hello back");
        assert!(h.controller.submit_user_text("  hello  "));

        let messages = h.controller.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], Message::user_text("hello"));
        assert!(messages[1].is_typing);
    }

    #[tokio::test]
    async fn test_chat_completion_replaces_typing_and_postprocesses() {
        let mut h = Harness::chatting("I'm DeepSeek-R1, created by DeepSeek. DeepSeek is great.");
        h.controller.submit_user_text("who are you?");
        h.settle_one().await;

        let messages = h.controller.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(h.controller.pending(), 0);
        assert_eq!(
            messages[1],
            Message::reply_text("I'm Nector AI, created by Jawad Hameed. Nector is great.")
        );
        assert_eq!(*h.chat.prompts.lock().unwrap(), vec!["who are you?".to_string()]);
        assert!(h.images.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chat_error_is_inlined_verbatim() {
        let mut h = Harness::new(
            ChatReply::Error("Error: 429 - {\"error\":\"rate limited\"}".to_string()),
            Ok(Vec::new()),
        );
        h.controller.submit_user_text("hi");
        h.settle_one().await;

        let last = h.controller.messages().last().unwrap();
        assert_eq!(last.content, "Error: 429 - {\"error\":\"rate limited\"}");
        assert!(!last.is_user_message);
        assert_eq!(h.controller.pending(), 0);
    }

    #[tokio::test]
    async fn test_directive_goes_to_image_path_only() {
        let mut h = Harness::chatting("unused");
        h.controller.submit_user_text("@imagine a lighthouse at dusk");
        h.settle_one().await;

        assert_eq!(*h.images.prompts.lock().unwrap(), vec!["a lighthouse at dusk".to_string()]);
        assert!(h.chat.prompts.lock().unwrap().is_empty());

        let messages = h.controller.messages();
        assert_eq!(messages[0].content, "@imagine a lighthouse at dusk");
        assert_eq!(messages[1], Message::generated_image("/cache/generated_1.jpg"));
        assert_eq!(h.controller.pending(), 0);
    }

    #[tokio::test]
    async fn test_image_error_replaces_typing() {
        let mut h = Harness::build(
            ChatReply::Content("unused".to_string()),
            ImageReply::Error("Image Generation failed!".to_string()),
            Arc::new(FakeClassifier { result: Ok(Vec::new()) }),
            None,
        );
        h.controller.submit_user_text("@imagine a broken dream");
        assert_eq!(h.controller.pending(), 1);
        h.settle_one().await;

        assert_eq!(h.controller.pending(), 0);
        let last = h.controller.messages().last().unwrap();
        assert_eq!(*last, Message::reply_text("Image Generation failed!"));
        assert!(!last.is_image);
        assert_eq!(h.controller.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_overlapping_turns_clear_all_placeholders() {
        let mut h = Harness::chatting("ok");
        h.controller.submit_user_text("first");
        h.controller.submit_user_text("second");
        assert_eq!(h.controller.pending(), 2);

        h.settle_one().await;
        assert_eq!(h.controller.pending(), 0);
        let contents: Vec<&str> = h.controller.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "ok"]);

        h.settle_one().await;
        assert_eq!(h.controller.messages().len(), 4);
        assert_eq!(h.controller.pending(), 0);
    }

    #[tokio::test]
    async fn test_labelled_photo_seeds_chat_turn() {
        let labels = vec![
            Label { label: "Dog".into(), score: 0.9 },
            Label { label: "Pet".into(), score: 0.6 },
        ];
        let mut h = Harness::new(ChatReply::Content("A loyal animal.".to_string()), Ok(labels));
        let photo_dir = tempfile::tempdir().unwrap();
        h.controller.submit_user_image(write_photo(photo_dir.path()));
        assert!(h.controller.messages().is_empty());

        // classification
        h.settle_one().await;
        let messages = h.controller.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].is_image && messages[0].is_user_message);
        let cached = PathBuf::from(messages[0].image_url.clone().unwrap());
        assert!(cached.exists());
        assert!(messages[1].is_typing);

        // chat reply
        h.settle_one().await;
        assert_eq!(h.controller.pending(), 0);
        assert_eq!(h.controller.messages().last().unwrap().content, "A loyal animal.");
        assert_eq!(*h.chat.prompts.lock().unwrap(), vec![label_prompt("Dog")]);
    }

    #[tokio::test]
    async fn test_no_labels_leaves_conversation_untouched() {
        let mut h = Harness::new(ChatReply::Content("unused".to_string()), Ok(Vec::new()));
        let photo_dir = tempfile::tempdir().unwrap();
        h.controller.submit_user_image(write_photo(photo_dir.path()));
        h.settle_one().await;

        assert!(h.controller.messages().is_empty());
        assert_eq!(h.controller.take_notice().as_deref(), Some(NO_LABELS_NOTICE));
        assert!(h.controller.take_notice().is_none());
    }

    #[tokio::test]
    async fn test_low_confidence_photo_is_no_labels_notice() {
        use crate::ai::{http_client, test_server::serve_once};

        let body = br#"[{"label":"window screen","score":0.03},{"label":"envelope","score":0.02}]"#;
        let (url, _captured) = serve_once("200 OK", "application/json", body.to_vec()).await;
        let http = http_client(std::time::Duration::from_secs(5)).unwrap();
        let classifier = HfImageClassifier::new(http, &url, "hf-token", "google/vit-base-patch16-224");

        let mut h = Harness::build(
            ChatReply::Content("unused".to_string()),
            ImageReply::Error("unused".to_string()),
            Arc::new(classifier),
            None,
        );
        let photo_dir = tempfile::tempdir().unwrap();
        h.controller.submit_user_image(write_photo(photo_dir.path()));
        h.settle_one().await;

        assert!(h.controller.messages().is_empty());
        assert_eq!(h.controller.take_notice().as_deref(), Some(NO_LABELS_NOTICE));
        assert!(h.chat.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_photo_cache_failure_is_a_notice() {
        let photo_dir = tempfile::tempdir().unwrap();
        // A plain file where the cache dir should be
        let blocked = photo_dir.path().join("cache");
        std::fs::write(&blocked, b"not a dir").unwrap();

        let mut h = Harness::build(
            ChatReply::Content("unused".to_string()),
            ImageReply::Error("unused".to_string()),
            Arc::new(FakeClassifier { result: Ok(vec![Label { label: "Dog".into(), score: 0.9 }]) }),
            Some(blocked),
        );
        h.controller.submit_user_image(write_photo(photo_dir.path()));
        h.settle_one().await;

        assert!(h.controller.messages().is_empty());
        let notice = h.controller.take_notice().unwrap();
        assert!(notice.starts_with("Error: "), "{}", notice);
        assert!(h.chat.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_classifier_failure_is_a_notice() {
        let mut h = Harness::new(ChatReply::Content("unused".to_string()), Err("model offline".to_string()));
        let photo_dir = tempfile::tempdir().unwrap();
        h.controller.submit_user_image(write_photo(photo_dir.path()));
        h.settle_one().await;

        assert!(h.controller.messages().is_empty());
        assert_eq!(h.controller.take_notice().as_deref(), Some("Error: model offline"));
    }

    #[tokio::test]
    async fn test_unreadable_photo_is_a_notice() {
        let mut h = Harness::chatting("unused");
        let photo_dir = tempfile::tempdir().unwrap();
        let bogus = photo_dir.path().join("not-an-image.jpg");
        std::fs::write(&bogus, b"plain text").unwrap();

        h.controller.submit_user_image(bogus);
        h.settle_one().await;
        assert_eq!(h.controller.take_notice().as_deref(), Some(CAPTURE_FAILED_NOTICE));
        assert!(h.controller.messages().is_empty());
    }

    #[tokio::test]
    async fn test_clear_then_late_completion_appends() {
        let mut h = Harness::chatting("late");
        h.controller.submit_user_text("hi");
        h.controller.clear();
        assert!(h.controller.snapshot().is_empty());

        h.settle_one().await;
        assert_eq!(h.controller.snapshot(), vec![Message::reply_text("late")]);
    }
}
