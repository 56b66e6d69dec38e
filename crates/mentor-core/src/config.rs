//! Configuration loading and path resolution.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub mod paths {
    //! Path resolution for mentor configuration and data directories.
    //!
    //! `MENTOR_HOME` resolution order:
    //! 1. `MENTOR_HOME` environment variable (if set)
    //! 2. ~/.config/mentor (default)

    use std::path::PathBuf;

    /// Returns the mentor home directory.
    pub fn mentor_home() -> PathBuf {
        if let Ok(home) = std::env::var("MENTOR_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir()
            .map(|h| h.join(".config").join("mentor"))
            .expect("Could not determine home directory")
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        mentor_home().join("config.toml")
    }

    /// Returns the directory holding the persisted lesson/message documents.
    pub fn data_dir() -> PathBuf {
        mentor_home()
    }

    /// Returns the path to the persisted lesson list.
    pub fn lessons_path() -> PathBuf {
        data_dir().join(crate::store::LESSONS_FILE)
    }

    /// Returns the path to the persisted message map.
    pub fn messages_path() -> PathBuf {
        data_dir().join(crate::store::MESSAGES_FILE)
    }

    /// Returns the directory for rolling log files.
    pub fn logs_dir() -> PathBuf {
        mentor_home().join("logs")
    }
}

/// Gemini provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GeminiProviderConfig {
    /// API key (falls back to `GEMINI_API_KEY` when absent)
    pub api_key: Option<String>,
    /// Base URL override
    pub base_url: Option<String>,
}

/// Provider configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersConfig {
    pub gemini: GeminiProviderConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level when RUST_LOG is not set (e.g. "info", "mentor_core=debug")
    pub level: String,
    /// Output format: "text" (default) or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The Gemini model to use
    pub model: String,

    /// Maximum output tokens for responses (optional)
    pub max_output_tokens: Option<u32>,

    /// Provider configuration (API keys, base URLs).
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    const DEFAULT_MODEL: &str = "gemini-2.5-flash";

    /// Loads configuration from the default config path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Saves only the model field to the config file.
    pub fn save_model(model: &str) -> Result<()> {
        Self::save_model_to(&paths::config_path(), model)
    }

    /// Saves only the model field to a specific config file path.
    ///
    /// Creates the file with the default template if it doesn't exist.
    /// Preserves existing fields and comments using `toml_edit`.
    pub fn save_model_to(path: &Path, model: &str) -> Result<()> {
        use toml_edit::{DocumentMut, value};

        let contents = if path.exists() {
            fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?
        } else {
            default_config_template().to_string()
        };

        let mut doc: DocumentMut = contents
            .parse()
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        doc["model"] = value(model);

        Self::write_config(path, &doc.to_string())
    }

    /// Writes the commented default template to `path`.
    ///
    /// Fails if the file already exists.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }
        Self::write_config(path, default_config_template())
    }

    fn write_config(path: &Path, contents: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: Self::DEFAULT_MODEL.to_string(),
            max_output_tokens: None,
            providers: ProvidersConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Returns the commented default config template.
fn default_config_template() -> &'static str {
    r#"# mentor configuration

# Gemini model used for tutoring replies
model = "gemini-2.5-flash"

# Maximum output tokens per reply (unset = provider default)
# max_output_tokens = 4096

[providers.gemini]
# api_key = "..."          # falls back to GEMINI_API_KEY
# base_url = "https://generativelanguage.googleapis.com/v1beta"

[logging]
level = "info"
format = "text"            # or "json"
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.model, "gemini-2.5-flash");
        assert!(config.max_output_tokens.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_parses_partial_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "model = \"gemini-3-pro-preview\"\n\n[providers.gemini]\napi_key = \"k\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.model, "gemini-3-pro-preview");
        assert_eq!(config.providers.gemini.api_key.as_deref(), Some("k"));
        // Unspecified sections fall back to defaults
        assert_eq!(config.logging.format, "text");
    }

    #[test]
    fn test_save_model_creates_template_and_sets_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        Config::save_model_to(&path, "gemini-3-pro-preview").unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("model = \"gemini-3-pro-preview\""));
        // Template comments survive
        assert!(contents.contains("# mentor configuration"));

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.model, "gemini-3-pro-preview");
    }

    #[test]
    fn test_save_model_preserves_existing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "model = \"old\"\nmax_output_tokens = 2048\n").unwrap();

        Config::save_model_to(&path, "gemini-2.5-flash").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.model, "gemini-2.5-flash");
        assert_eq!(config.max_output_tokens, Some(2048));
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        Config::init(&path).unwrap();
        assert!(Config::init(&path).is_err());
    }

    #[test]
    fn test_default_template_parses() {
        let config: Config = toml::from_str(default_config_template()).unwrap();
        assert_eq!(config.model, "gemini-2.5-flash");
    }
}
