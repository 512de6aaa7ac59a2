use reqwest::Client;
use serde::Deserialize;
use anyhow::{Result, anyhow};
use async_trait::async_trait;

use super::ImageClassifier;
use crate::config::DEFAULT_CLASSIFIER_MIN_SCORE;

/// One classifier label with its confidence score
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Label {
    pub label: String,
    pub score: f32,
}

/// Sorts labels by descending confidence; ties keep their original order.
pub fn rank_labels(mut labels: Vec<Label>) -> Vec<Label> {
    labels.sort_by(|a, b| b.score.total_cmp(&a.score));
    labels
}

/// Drops labels scoring below `min_score`, then ranks what is left.
pub fn confident_labels(labels: Vec<Label>, min_score: f32) -> Vec<Label> {
    rank_labels(labels.into_iter().filter(|l| l.score >= min_score).collect())
}

/// Image classification through the Hugging Face inference router
#[derive(Clone)]
pub struct HfImageClassifier {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    min_score: f32,
}

impl HfImageClassifier {
    pub fn new(client: Client, base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            min_score: DEFAULT_CLASSIFIER_MIN_SCORE,
        }
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/hf-inference/models/{}", self.base_url.trim_end_matches('/'), self.model)
    }
}

#[async_trait]
impl ImageClassifier for HfImageClassifier {
    async fn classify(&self, photo: &[u8]) -> Result<Vec<Label>> {
        let url = self.endpoint();
        tracing::info!(url = %url, bytes = photo.len(), "classifying photo");

        let response = self.client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/octet-stream")
            .body(photo.to_vec())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Classifier error {}: {}", status.as_u16(), text));
        }

        let labels: Vec<Label> = response.json().await?;
        let returned = labels.len();
        let labels = confident_labels(labels, self.min_score);
        tracing::debug!(returned, kept = labels.len(), min_score = self.min_score, "classifier labels");
        Ok(labels)
    }
}
