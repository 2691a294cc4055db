//! `repograph.yaml` configuration.
//!
//! Every field is optional. A file in the repository root is picked up
//! automatically; a user-wide file in the platform config directory is the
//! fallback.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::ai::{AiOptions, DEFAULT_MAX_TOKENS};
use crate::analysis::{AnalyzeOptions, Language};

/// Config file names looked up in the repository root, in order.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &["repograph.yaml", "repograph.yml", ".repograph.yaml"];

/// Environment variable that always wins for the model API key.
pub const API_KEY_ENV: &str = "REPOGRAPH_LLM_API_KEY";

/// Store directory used when none is configured, relative to the repository.
pub const DEFAULT_STORE_DIR: &str = ".repograph";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub base_url: Option<String>,
    pub branch: Option<String>,
    pub max_file_size: Option<u64>,
    pub excluded_dirs: Vec<String>,
    /// Glob patterns matched against repository-relative paths.
    pub excluded_paths: Vec<String>,
    /// Languages to analyze instead of detecting them.
    pub languages: Vec<String>,
    pub store_dir: Option<PathBuf>,
    pub ai: AiConfig,
}

/// Model-assisted extraction settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AiConfig {
    pub enabled: bool,
    /// Base URL of an OpenAI-compatible API.
    pub endpoint: String,
    pub model: String,
    /// Variable holding the API key when `REPOGRAPH_LLM_API_KEY` is unset.
    pub api_key_env: Option<String>,
    pub max_files: usize,
    pub batch_size: usize,
    pub max_file_chars: usize,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub concurrency: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        let options = AiOptions::default();
        Self {
            enabled: false,
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: Some("OPENAI_API_KEY".to_string()),
            max_files: options.max_files,
            batch_size: options.batch_size,
            max_file_chars: options.max_file_chars,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: options.call_timeout.as_secs(),
            concurrency: options.concurrency,
        }
    }
}

impl AiConfig {
    pub fn options(&self) -> AiOptions {
        AiOptions {
            max_files: self.max_files,
            batch_size: self.batch_size,
            max_file_chars: self.max_file_chars,
            max_tokens: self.max_tokens,
            call_timeout: Duration::from_secs(self.timeout_secs),
            concurrency: self.concurrency,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// API key from `REPOGRAPH_LLM_API_KEY`, else from `api_key_env`.
    pub fn api_key(&self) -> Option<String> {
        let from = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        from(API_KEY_ENV).or_else(|| self.api_key_env.as_deref().and_then(from))
    }
}

impl Config {
    /// Parse a config from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse YAML text. An empty document is the default config.
    pub fn parse_str(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Config file that applies to the repository at `root`, if any.
    pub fn discover(root: &Path) -> Option<PathBuf> {
        DEFAULT_CONFIG_NAMES
            .iter()
            .map(|name| root.join(name))
            .find(|p| p.is_file())
            .or_else(user_config_path)
    }

    /// Load `explicit` if given, otherwise the discovered file, otherwise defaults.
    ///
    /// Returns the config and the path it came from.
    pub fn load(explicit: Option<&Path>, root: &Path) -> Result<(Self, Option<PathBuf>), ConfigError> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => Self::discover(root),
        };
        match path {
            Some(p) => {
                debug!(path = %p.display(), "loading config");
                let config = Self::parse_file(&p)?;
                config.validate()?;
                Ok((config, Some(p)))
            }
            None => Ok((Self::default(), None)),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ai.batch_size == 0 {
            return Err(ConfigError::Invalid("ai.batch_size must be at least 1".into()));
        }
        if self.ai.concurrency == 0 {
            return Err(ConfigError::Invalid("ai.concurrency must be at least 1".into()));
        }
        if self.max_file_size == Some(0) {
            return Err(ConfigError::Invalid("max_file_size must be positive".into()));
        }
        self.parsed_languages().map(|_| ())
    }

    pub fn parsed_languages(&self) -> Result<Vec<Language>, ConfigError> {
        self.languages
            .iter()
            .map(|name| {
                name.parse::<Language>()
                    .map_err(|e| ConfigError::Invalid(e.to_string()))
            })
            .collect()
    }

    pub fn analyze_options(&self) -> Result<AnalyzeOptions, ConfigError> {
        Ok(AnalyzeOptions {
            base_url: self.base_url.clone(),
            branch: self.branch.clone(),
            languages: self.parsed_languages()?,
            max_file_size: self.max_file_size,
            excluded_dirs: self.excluded_dirs.clone(),
            excluded_paths: self.excluded_paths.clone(),
        })
    }

    /// Store directory, resolved against `root` when relative.
    pub fn store_dir(&self, root: &Path) -> PathBuf {
        let dir = self
            .store_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR));
        if dir.is_absolute() {
            dir
        } else {
            root.join(dir)
        }
    }
}

fn user_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "repograph")
        .map(|dirs| dirs.config_dir().join("config.yaml"))
        .filter(|p| p.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_for_empty_document() {
        let config = Config::parse_str("").unwrap();
        assert!(config.base_url.is_none());
        assert!(!config.ai.enabled);
        assert_eq!(config.ai.options(), AiOptions::default());
        assert_eq!(
            config.store_dir(Path::new("/repo")),
            PathBuf::from("/repo/.repograph")
        );
    }

    #[test]
    fn test_partial_document() {
        let yaml = r#"
base_url: https://github.com/acme/orders
branch: develop
languages: [go, ts]
excluded_paths:
  - "**/generated/**"
ai:
  enabled: true
  batch_size: 2
  timeout_secs: 30
"#;
        let config = Config::parse_str(yaml).unwrap();
        config.validate().unwrap();
        let options = config.analyze_options().unwrap();
        assert_eq!(options.branch.as_deref(), Some("develop"));
        assert_eq!(options.languages, vec![Language::Go, Language::TypeScript]);
        assert_eq!(options.excluded_paths, vec!["**/generated/**".to_string()]);

        let ai = config.ai.options();
        assert_eq!(ai.batch_size, 2);
        assert_eq!(ai.call_timeout, Duration::from_secs(30));
        assert_eq!(ai.max_files, AiOptions::default().max_files);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = Config::parse_str("languages: [cobol]").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = Config::parse_str("ai:\n  concurrency: 0\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_discovers_repo_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("repograph.yaml"), "store_dir: /var/graph\n").unwrap();

        let (config, path) = Config::load(None, tmp.path()).unwrap();
        assert_eq!(path, Some(tmp.path().join("repograph.yaml")));
        assert_eq!(config.store_dir(tmp.path()), PathBuf::from("/var/graph"));
    }

    #[test]
    fn test_load_reports_bad_yaml_with_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("custom.yaml");
        std::fs::write(&path, "languages: [go\n").unwrap();

        let err = Config::load(Some(&path), tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
        assert!(err.to_string().contains("custom.yaml"));
    }
}
