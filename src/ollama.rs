// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Ollama API client for local AI inference

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::classify::VisionModel;
use crate::imaging::EncodedImage;
use crate::{Result, VistaError};

/// Ollama API client
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<&'a str>>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Deserialize)]
struct ModelInfo {
    name: String,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: normalize_base_url(base_url),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.base_url);

        self.client
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| {
                VistaError::OllamaUnavailable(format!(
                    "Cannot connect to Ollama at {}: {}",
                    self.base_url, e
                ))
            })?;

        Ok(())
    }

    /// List available models
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.client.get(&url).send().await?;

        let tags: TagsResponse = response.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Check if a specific model is available
    pub async fn model_available(&self, model: &str) -> Result<bool> {
        let models = self.list_models().await?;
        Ok(models.iter().any(|m| model_matches(m, model)))
    }

    /// Generate with image (for vision models)
    pub async fn generate_with_image(
        &self,
        model: &str,
        prompt: &str,
        image: &EncodedImage,
    ) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
            images: Some(vec![image.base64()]),
        };

        debug!("Sending vision request to Ollama: model={}", model);

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(VistaError::OllamaUnavailable(format!(
                "Ollama returned status {}",
                response.status()
            )));
        }

        let result: GenerateResponse = response.json().await?;
        Ok(result.response)
    }
}

#[async_trait]
impl VisionModel for OllamaClient {
    async fn describe(&self, model: &str, prompt: &str, image: &EncodedImage) -> Result<String> {
        self.generate_with_image(model, prompt, image).await
    }
}

/// Strip trailing slashes and endpoint paths so `/api/...` can be appended
fn normalize_base_url(url: &str) -> String {
    url.trim_end_matches('/')
        .replace("/api/generate", "")
        .replace("/api/chat", "")
}

/// Installed tag `llava:latest` satisfies a request for `llava`
fn model_matches(installed: &str, wanted: &str) -> bool {
    installed == wanted
        || installed == format!("{}:latest", wanted)
        || (!wanted.contains(':') && installed.starts_with(&format!("{}:", wanted)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("http://localhost:11434/"), "http://localhost:11434");
        assert_eq!(
            normalize_base_url("http://localhost:11434/api/generate"),
            "http://localhost:11434"
        );
        assert_eq!(normalize_base_url("http://gpu:11434/api/chat"), "http://gpu:11434");
    }

    #[test]
    fn test_model_matches() {
        assert!(model_matches("llava:latest", "llava"));
        assert!(model_matches("llava:13b", "llava"));
        assert!(model_matches("llava:13b", "llava:13b"));
        assert!(!model_matches("llava:7b", "llava:13b"));
        assert!(!model_matches("llava-phi3:latest", "llava"));
    }

    #[test]
    fn test_generate_request_shape() {
        let request = GenerateRequest {
            model: "moondream",
            prompt: "what is this?",
            stream: false,
            images: Some(vec!["aGVsbG8="]),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "moondream");
        assert_eq!(json["stream"], false);
        assert_eq!(json["images"][0], "aGVsbG8=");

        let text_only = GenerateRequest { images: None, ..request };
        let json = serde_json::to_value(&text_only).unwrap();
        assert!(json.get("images").is_none());
    }

    #[test]
    fn test_client_keeps_normalized_url() {
        let client = OllamaClient::new("http://localhost:11434/api/generate", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434");
    }
}
