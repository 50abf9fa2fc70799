// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Image classification against a caller-supplied label set

pub mod prompt;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::imaging::{encode_for_vision, EncodedImage};
use crate::{AppConfig, Result};

/// A backend that can look at an image and answer a prompt in free text
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn describe(&self, model: &str, prompt: &str, image: &EncodedImage) -> Result<String>;
}

/// Ordered, duplicate-free labels that always include the fallback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySet {
    labels: Vec<String>,
    fallback: String,
}

impl CategorySet {
    /// Build a set, dropping blanks and duplicates. A missing fallback is appended.
    pub fn new<I, S>(labels: I, fallback: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fallback = fallback.trim().to_string();
        let mut set: Vec<String> = Vec::new();

        for label in labels {
            let label = label.as_ref().trim();
            if !label.is_empty() && !set.iter().any(|l| l == label) {
                set.push(label.to_string());
            }
        }

        if !set.contains(&fallback) {
            warn!("Fallback category '{}' not selected, adding it", fallback);
            set.push(fallback.clone());
        }

        Self { labels: set, fallback }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.sorting.categories, &config.sorting.fallback_category)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Lowercase, trim and turn underscores into spaces
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase().replace('_', " ")
}

/// First label (in set order) that contains, or is contained in, the response
///
/// An empty response matches nothing.
pub fn match_label<'a>(response: &str, categories: &'a CategorySet) -> Option<&'a str> {
    let answer = normalize(response);
    if answer.is_empty() {
        return None;
    }

    categories
        .labels()
        .iter()
        .find(|label| {
            let label = normalize(label);
            answer.contains(&label) || label.contains(&answer)
        })
        .map(String::as_str)
}

/// Picks exactly one label per image using a vision model
pub struct Classifier {
    backend: Arc<dyn VisionModel>,
    model: String,
    descriptions: BTreeMap<String, String>,
    max_dimension: Option<u32>,
}

impl Classifier {
    pub fn new(backend: Arc<dyn VisionModel>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            descriptions: BTreeMap::new(),
            max_dimension: None,
        }
    }

    pub fn from_config(backend: Arc<dyn VisionModel>, config: &AppConfig) -> Self {
        Self::new(backend, config.ai_engine.models.vision.clone())
            .with_descriptions(config.prompts.category_descriptions.clone())
            .with_max_dimension(config.sorting.max_dimension)
    }

    pub fn with_descriptions(mut self, descriptions: BTreeMap<String, String>) -> Self {
        self.descriptions = descriptions;
        self
    }

    pub fn with_max_dimension(mut self, max_dimension: Option<u32>) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Classify one image. Never fails: every problem resolves to the fallback label.
    pub async fn classify(&self, path: &Path, categories: &CategorySet) -> String {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if !path.exists() {
            warn!("File not found, skipping classification: {:?}", path);
            return categories.fallback().to_string();
        }

        let image = match encode_for_vision(path, self.max_dimension) {
            Ok(image) => image,
            Err(e) => {
                error!("Encoding failed for {:?}: {}", path, e);
                return categories.fallback().to_string();
            }
        };

        let prompt = prompt::build_prompt(categories, &self.descriptions);

        let response = match self.backend.describe(&self.model, &prompt, &image).await {
            Ok(text) => text,
            Err(e) => {
                error!("Classification failed for {:?}: {}", path, e);
                return categories.fallback().to_string();
            }
        };

        match match_label(&response, categories) {
            Some(label) => {
                debug!("{} → '{}' matched to '{}'", name, normalize(&response), label);
                label.to_string()
            }
            None => {
                debug!(
                    "{} → '{}' no match, using '{}'",
                    name,
                    normalize(&response),
                    categories.fallback()
                );
                categories.fallback().to_string()
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedModel;
    use super::*;
    use crate::imaging::fixtures::write_rgb;
    use tempfile::tempdir;

    fn defaults() -> CategorySet {
        CategorySet::new(
            ["birthdays", "vacations", "family_photos", "child_photos", "other", "nudity"],
            "other",
        )
    }

    #[test]
    fn test_category_set_dedups_and_adds_fallback() {
        let set = CategorySet::new(["pets", " pets ", "", "food"], "other");
        assert_eq!(set.labels(), ["pets", "food", "other"]);
        assert_eq!(set.fallback(), "other");
        assert!(set.contains("food"));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_match_exact_and_decorated() {
        let set = defaults();
        assert_eq!(match_label("birthdays", &set), Some("birthdays"));
        assert_eq!(match_label("  Vacations.\n", &set), Some("vacations"));
        assert_eq!(match_label("family_photos", &set), Some("family_photos"));
        assert_eq!(match_label("Category: child photos", &set), Some("child_photos"));
    }

    #[test]
    fn test_match_response_inside_label() {
        let set = defaults();
        // "family" is a substring of "family photos"
        assert_eq!(match_label("Family", &set), Some("family_photos"));
    }

    #[test]
    fn test_match_is_order_preserving() {
        let a_first = CategorySet::new(["family_photos", "child_photos", "other"], "other");
        let b_first = CategorySet::new(["child_photos", "family_photos", "other"], "other");
        let answer = "family photos or maybe child photos";

        assert_eq!(match_label(answer, &a_first), Some("family_photos"));
        assert_eq!(match_label(answer, &b_first), Some("child_photos"));
    }

    #[test]
    fn test_match_nothing() {
        let set = defaults();
        assert_eq!(match_label("a landscape with mountains", &set), None);
        assert_eq!(match_label("   ", &set), None);
    }

    #[tokio::test]
    async fn test_classify_matches_response() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cake.jpg");
        write_rgb(&path, 32, 32);

        let model = ScriptedModel::answering("Birthdays");
        let classifier = Classifier::new(model.clone(), "llava");
        assert_eq!(classifier.classify(&path, &defaults()).await, "birthdays");
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_classify_unmatched_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tree.png");
        write_rgb(&path, 32, 32);

        let classifier = Classifier::new(ScriptedModel::answering("a tree"), "llava");
        assert_eq!(classifier.classify(&path, &defaults()).await, "other");
    }

    #[tokio::test]
    async fn test_classify_missing_file_skips_inference() {
        let dir = tempdir().unwrap();
        let model = ScriptedModel::answering("birthdays");
        let classifier = Classifier::new(model.clone(), "llava");

        let label = classifier.classify(&dir.path().join("gone.jpg"), &defaults()).await;
        assert_eq!(label, "other");
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_classify_undecodable_skips_inference() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"\xFF\xD8\xFF not really").unwrap();

        let model = ScriptedModel::answering("birthdays");
        let classifier = Classifier::new(model.clone(), "llava");
        assert_eq!(classifier.classify(&path, &defaults()).await, "other");
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_classify_backend_error_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("beach.jpg");
        write_rgb(&path, 32, 32);

        let set = CategorySet::new(["vacations", "misc"], "misc");
        let model = ScriptedModel::failing();
        let classifier = Classifier::new(model.clone(), "llava");
        let label = classifier.classify(&path, &set).await;

        assert_eq!(label, "misc");
        assert!(set.contains(&label));
        assert_eq!(model.calls(), 1);
    }
}
