// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for Vista

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// AI engine configuration
    pub ai_engine: EngineConfig,

    /// Extraction and sorting rules
    #[serde(default)]
    pub sorting: SortingConfig,

    /// Prompt material
    #[serde(default)]
    pub prompts: PromptConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineConfig {
    pub url: String,
    pub models: ModelConfig,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelConfig {
    pub vision: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SortingConfig {
    /// Candidate labels, in matching priority order
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,
    /// Label used whenever classification cannot resolve a match
    #[serde(default = "default_fallback")]
    pub fallback_category: String,
    /// Minimum width and height in pixels
    #[serde(default = "default_min_size")]
    pub min_size: u32,
    /// Name of the flat staging folder created under the destination
    #[serde(default = "default_staging_dir")]
    pub staging_dir: String,
    /// Remove empty folders from the source tree after a run
    #[serde(default = "default_true")]
    pub cleanup_empty_dirs: bool,
    /// Downscale images whose longest side exceeds this before inference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_dimension: Option<u32>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PromptConfig {
    /// Short description per well-known label
    #[serde(default = "default_descriptions")]
    pub category_descriptions: BTreeMap<String, String>,
}

// Default value functions
fn default_timeout() -> u64 { 120 }
fn default_fallback() -> String { "other".to_string() }
fn default_min_size() -> u32 { 512 }
fn default_staging_dir() -> String { "images".to_string() }
fn default_true() -> bool { true }

fn default_categories() -> Vec<String> {
    ["birthdays", "vacations", "family_photos", "child_photos", "other", "nudity"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_descriptions() -> BTreeMap<String, String> {
    let entries = [
        (
            "birthdays",
            "Images depicting a special occasion with a festive theme like birthdays, \
             Christmas or New Year's Eve. Commonly contain dressed up people, presents, \
             dinner guests.",
        ),
        (
            "vacations",
            "Images depicting scenarios from vacation travels (hint: airport, suitcases). \
             Commonly contain sunbathing and swimming at the beach or by a pool, but also \
             people looking warm in a hot climate or having a fresh sunburn.",
        ),
        (
            "family_photos",
            "Images depicting at least 2 persons that look to be closely related \
             (hint: mom and dad, parent and child) in ordinary everyday scenarios.",
        ),
        (
            "child_photos",
            "Images depicting one or more children. Commonly composed with the parent \
             behind the camera capturing something the child is doing.",
        ),
        (
            "nudity",
            "Images depicting naked genitals or breasts. People wearing underwear or \
             swimwear are NOT classified as nudity.",
        ),
    ];

    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ai_engine: EngineConfig {
                url: "http://localhost:11434".to_string(),
                models: ModelConfig {
                    vision: "redule26/huihui_ai_qwen2.5-vl-7b-abliterated:latest".to_string(),
                },
                timeout_secs: default_timeout(),
            },
            sorting: SortingConfig::default(),
            prompts: PromptConfig::default(),
        }
    }
}

impl Default for SortingConfig {
    fn default() -> Self {
        Self {
            categories: default_categories(),
            fallback_category: default_fallback(),
            min_size: default_min_size(),
            staging_dir: default_staging_dir(),
            cleanup_empty_dirs: true,
            max_dimension: None,
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            category_descriptions: default_descriptions(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::VistaError::Config(format!("Failed to parse config: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> crate::Result<()> {
        if self.sorting.categories.is_empty() {
            return Err(crate::VistaError::Config("at least one category is required".to_string()));
        }
        if self.sorting.fallback_category.trim().is_empty() {
            return Err(crate::VistaError::Config("fallback category must not be empty".to_string()));
        }
        let staging = self.sorting.staging_dir.trim();
        if staging.is_empty() || staging.contains(['/', '\\']) {
            return Err(crate::VistaError::Config(format!(
                "staging_dir must be a plain folder name, got {:?}",
                self.sorting.staging_dir
            )));
        }
        if self.sorting.categories.iter().any(|c| c == staging) {
            return Err(crate::VistaError::Config(format!(
                "category {:?} collides with the staging folder",
                staging
            )));
        }
        if self.ai_engine.models.vision.trim().is_empty() {
            return Err(crate::VistaError::Config("vision model must be set".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.sorting.min_size, 512);
        assert_eq!(config.sorting.fallback_category, "other");
        assert!(config.sorting.categories.contains(&"other".to_string()));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config.sorting.staging_dir, "images");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = AppConfig::default();
        config.sorting.min_size = 300;
        config.sorting.categories = vec!["pets".to_string(), "other".to_string()];
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.sorting.min_size, 300);
        assert_eq!(loaded.sorting.categories, vec!["pets", "other"]);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"ai_engine": {"url": "http://gpu-box:11434", "models": {"vision": "llava"}}}"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.ai_engine.timeout_secs, 120);
        assert_eq!(config.sorting.categories.len(), 6);
        assert!(config.prompts.category_descriptions.contains_key("vacations"));
    }

    #[test]
    fn test_rejects_staging_collision() {
        let mut config = AppConfig::default();
        config.sorting.categories.push("images".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_categories() {
        let mut config = AppConfig::default();
        config.sorting.categories.clear();
        assert!(config.validate().is_err());
    }
}
