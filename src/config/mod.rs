//! Application Configuration
//!
//! User settings stored in TOML format.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::capture::CaptureConfig;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Capture device settings
    pub capture: CaptureConfig,
    /// Recognition engine settings
    pub recognition: RecognitionSettings,
    /// Catalog collaborator settings
    pub catalog: CatalogSettings,
}

/// Recognition engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionSettings {
    /// Tessdata language code (e.g. "eng", "fra")
    pub language: String,
    /// Optional tessdata directory override
    pub data_path: Option<String>,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            language: "fra".to_string(),
            data_path: None,
        }
    }
}

/// Catalog collaborator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSettings {
    /// Base URL of the catalog search service
    pub base_url: String,
    /// Maximum candidates to request per query
    pub limit: u32,
    /// Language for catalog results
    pub lang: String,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.tcgdex.net/v2".to_string(),
            limit: 20,
            lang: "fr".to_string(),
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Default config file location under the platform config directory
pub fn default_config_path() -> Option<std::path::PathBuf> {
    directories::ProjectDirs::from("", "", "cardlens")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CameraFacing;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        assert_eq!(config.capture.facing, CameraFacing::Environment);
        assert_eq!(config.capture.ideal_width, 1280);
        assert_eq!(config.capture.ideal_height, 720);

        assert_eq!(config.recognition.language, "fra");
        assert!(config.recognition.data_path.is_none());

        assert_eq!(config.catalog.base_url, "https://api.tcgdex.net/v2");
        assert_eq!(config.catalog.limit, 20);
        assert_eq!(config.catalog.lang, "fr");
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = AppConfig::default();

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.capture.ideal_width, parsed.capture.ideal_width);
        assert_eq!(config.recognition.language, parsed.recognition.language);
        assert_eq!(config.catalog.limit, parsed.catalog.limit);
    }

    #[test]
    fn test_save_and_load_config() {
        let mut config = AppConfig::default();
        config.catalog.lang = "en".to_string();
        config.recognition.language = "eng".to_string();

        let temp_file = NamedTempFile::new().unwrap();
        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert_eq!(loaded.catalog.lang, "en");
        assert_eq!(loaded.recognition.language, "eng");
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }
}
