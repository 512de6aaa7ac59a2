use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use anyhow::{Result, anyhow};

pub const DEFAULT_CHAT_BASE_URL: &str = "https://openrouter.ai/api/v1/";
pub const DEFAULT_CHAT_MODEL: &str = "deepseek/deepseek-r1-distill-llama-70b:free";
pub const DEFAULT_IMAGE_BASE_URL: &str = "https://router.huggingface.co/";
pub const DEFAULT_IMAGE_MODEL: &str = "black-forest-labs/FLUX.1-dev";
pub const DEFAULT_CLASSIFIER_MODEL: &str = "google/vit-base-patch16-224";
pub const DEFAULT_CLASSIFIER_MIN_SCORE: f32 = 0.5;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    pub chat_base_url: Option<String>,
    pub chat_model: Option<String>,
    pub chat_api_key: Option<String>,
    pub image_base_url: Option<String>,
    pub image_model: Option<String>,
    pub image_api_key: Option<String>,
    pub classifier_model: Option<String>,
    pub classifier_min_score: Option<f32>,
    pub cache_dir: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &std::path::Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, config_path: &std::path::Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    pub fn chat_base_url(&self) -> &str {
        self.chat_base_url.as_deref().unwrap_or(DEFAULT_CHAT_BASE_URL)
    }

    pub fn chat_model(&self) -> &str {
        self.chat_model.as_deref().unwrap_or(DEFAULT_CHAT_MODEL)
    }

    pub fn image_base_url(&self) -> &str {
        self.image_base_url.as_deref().unwrap_or(DEFAULT_IMAGE_BASE_URL)
    }

    pub fn image_model(&self) -> &str {
        self.image_model.as_deref().unwrap_or(DEFAULT_IMAGE_MODEL)
    }

    pub fn classifier_model(&self) -> &str {
        self.classifier_model.as_deref().unwrap_or(DEFAULT_CLASSIFIER_MODEL)
    }

    /// Labels scoring below this are dropped by the classifier
    pub fn classifier_min_score(&self) -> f32 {
        self.classifier_min_score.unwrap_or(DEFAULT_CLASSIFIER_MIN_SCORE)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    /// Chat key: env var first, then config. Missing keys send an empty token.
    pub fn chat_api_key(&self) -> String {
        std::env::var("OPENROUTER_API_KEY").ok()
            .or_else(|| self.chat_api_key.clone())
            .unwrap_or_default()
    }

    /// Hugging Face key, shared by image generation and classification.
    pub fn image_api_key(&self) -> String {
        std::env::var("HF_API_KEY").ok()
            .or_else(|| std::env::var("HUGGINGFACE_API_KEY").ok())
            .or_else(|| self.image_api_key.clone())
            .unwrap_or_default()
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow!("Could not determine cache directory"))?;

        Ok(cache_dir.join("nector"))
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("nector").join("config.json"))
    }
}
