use reqwest::Client;
use serde::Serialize;
use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;

use super::{ImageReply, ImageService};
use crate::cache::ImageCache;

pub const IMAGE_DECODE_FAILED: &str = "Image Generation failed!";
pub const IMAGE_EMPTY_BODY: &str = "Image Generation failed: empty response";

#[derive(Serialize, Debug)]
pub struct TextToImageRequest {
    pub inputs: String,
}

/// Hugging Face text-to-image client. Successful images land in the image cache.
#[derive(Clone)]
pub struct ImageClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    cache: ImageCache,
}

impl ImageClient {
    pub fn new(client: Client, base_url: &str, api_key: &str, model: &str, cache: ImageCache) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            cache,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/hf-inference/models/{}/", self.base_url.trim_end_matches('/'), self.model)
    }

    pub async fn generate(&self, prompt: &str) -> ImageReply {
        match self.try_generate(prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("image generation failed: {:#}", e);
                ImageReply::Error(format!("Exception: {}", e))
            }
        }
    }

    async fn try_generate(&self, prompt: &str) -> Result<ImageReply> {
        let url = self.endpoint();
        tracing::info!(url = %url, prompt_len = prompt.len(), "requesting image");

        let response = self.client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&TextToImageRequest { inputs: prompt.to_string() })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = if body.is_empty() { "Unknown error".to_string() } else { body };
            tracing::warn!(status = status.as_u16(), "image endpoint rejected request: {}", body);
            return Ok(ImageReply::Error(format!("Error: {}", body)));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            tracing::warn!("image response body is empty");
            return Ok(ImageReply::Error(IMAGE_EMPTY_BODY.to_string()));
        }
        tracing::debug!(bytes = bytes.len(), "image response received");

        // Decoding and JPEG encoding are CPU-bound
        let cache = self.cache.clone();
        let stored: Option<PathBuf> = tokio::task::spawn_blocking(move || -> Result<Option<PathBuf>> {
            match ::image::load_from_memory(&bytes) {
                Ok(decoded) => cache.store(&decoded).map(Some),
                Err(e) => {
                    tracing::warn!("image decoding failed: {}", e);
                    Ok(None)
                }
            }
        })
        .await??;

        Ok(match stored {
            Some(path) => {
                tracing::info!(path = %path.display(), "saved generated image");
                ImageReply::Saved(path)
            }
            None => ImageReply::Error(IMAGE_DECODE_FAILED.to_string()),
        })
    }
}

#[async_trait]
impl ImageService for ImageClient {
    async fn generate_image(&self, prompt: &str) -> ImageReply {
        self.generate(prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{http_client, test_server::serve_once};
    use std::io::Cursor;
    use std::time::Duration;

    fn client_for(base_url: &str, cache_dir: &std::path::Path) -> ImageClient {
        let http = http_client(Duration::from_secs(5)).unwrap();
        ImageClient::new(http, base_url, "hf-token", "black-forest-labs/FLUX.1-dev", ImageCache::new(cache_dir))
    }

    fn png_bytes() -> Vec<u8> {
        let img = ::image::RgbImage::from_pixel(4, 4, ::image::Rgb([0, 128, 255]));
        let mut out = Cursor::new(Vec::new());
        ::image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ::image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_endpoint_includes_model() {
        let dir = tempfile::tempdir().unwrap();
        let client = client_for("https://router.huggingface.co/", dir.path());
        assert_eq!(
            client.endpoint(),
            "https://router.huggingface.co/hf-inference/models/black-forest-labs/FLUX.1-dev/"
        );
    }

    #[tokio::test]
    async fn test_success_caches_image() {
        let dir = tempfile::tempdir().unwrap();
        let (url, captured) = serve_once("200 OK", "image/png", png_bytes()).await;

        let reply = client_for(&url, dir.path()).generate_image("a red fox").await;
        let path = match reply {
            ImageReply::Saved(path) => path,
            other => panic!("expected saved image, got {:?}", other),
        };
        assert!(path.starts_with(dir.path()));
        assert!(path.exists());

        let request = captured.await.unwrap().request;
        assert!(request.starts_with("POST /hf-inference/models/black-forest-labs/FLUX.1-dev/"));
        assert!(request.contains(r#"{"inputs":"a red fox"}"#));
    }

    #[tokio::test]
    async fn test_undecodable_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let (url, _captured) = serve_once("200 OK", "image/jpeg", b"garbage".to_vec()).await;
        let reply = client_for(&url, dir.path()).generate_image("x").await;
        assert_eq!(reply, ImageReply::Error(IMAGE_DECODE_FAILED.to_string()));
    }

    #[tokio::test]
    async fn test_empty_body() {
        let dir = tempfile::tempdir().unwrap();
        let (url, _captured) = serve_once("200 OK", "image/jpeg", Vec::new()).await;
        let reply = client_for(&url, dir.path()).generate_image("x").await;
        assert_eq!(reply, ImageReply::Error(IMAGE_EMPTY_BODY.to_string()));
    }

    #[tokio::test]
    async fn test_rejection_carries_body() {
        let dir = tempfile::tempdir().unwrap();
        let (url, _captured) = serve_once(
            "503 Service Unavailable",
            "application/json",
            br#"{"error":"Model is loading"}"#.to_vec(),
        )
        .await;
        let reply = client_for(&url, dir.path()).generate_image("x").await;
        assert_eq!(reply, ImageReply::Error(r#"Error: {"error":"Model is loading"}"#.to_string()));
    }

    #[tokio::test]
    async fn test_rejection_without_body() {
        let dir = tempfile::tempdir().unwrap();
        let (url, _captured) = serve_once("500 Internal Server Error", "text/plain", Vec::new()).await;
        let reply = client_for(&url, dir.path()).generate_image("x").await;
        assert_eq!(reply, ImageReply::Error("Error: Unknown error".to_string()));
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let dir = tempfile::tempdir().unwrap();
        let reply = client_for(&format!("http://{}/", addr), dir.path()).generate_image("x").await;
        match reply {
            ImageReply::Error(msg) => assert!(msg.starts_with("Exception: ")),
            other => panic!("expected error, got {:?}", other),
        }
    }
}
