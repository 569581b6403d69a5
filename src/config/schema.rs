use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api";

/// Top-level docchat configuration, loaded from `config.toml`.
///
/// Resolution order: `DOCCHAT_CONFIG_DIR` env → `~/.docchat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// State directory (sessions, credentials) - computed, not serialized
    #[serde(skip)]
    pub state_dir: PathBuf,
    /// Path to config.toml - computed, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Base URL of the document Q&A backend (e.g. "https://docs.example.com/api").
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Per-request timeout in seconds. Default: `60`.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Index queried by default on the query surface.
    #[serde(default)]
    pub default_index: Option<String>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::new(),
            config_path: PathBuf::new(),
            api_url: default_api_url(),
            request_timeout_secs: default_timeout_secs(),
            default_index: None,
        }
    }
}

fn resolve_config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("DOCCHAT_CONFIG_DIR") {
        let trimmed = dir.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }

    let user_dirs = UserDirs::new().context("could not determine home directory")?;
    Ok(user_dirs.home_dir().join(".docchat"))
}

impl Config {
    pub async fn load_or_init() -> Result<Self> {
        let config_dir = resolve_config_dir()?;
        let config_path = config_dir.join("config.toml");
        let state_dir = config_dir.join("state");

        fs::create_dir_all(&config_dir)
            .await
            .with_context(|| format!("failed to create config directory {}", config_dir.display()))?;
        fs::create_dir_all(&state_dir)
            .await
            .context("failed to create state directory")?;

        let initialized = !config_path.exists();
        let mut config = if initialized {
            Config::default()
        } else {
            let contents = fs::read_to_string(&config_path)
                .await
                .context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config file")?
        };

        config.config_path = config_path;
        config.state_dir = state_dir;

        if initialized {
            config.save().await?;
        }

        config.apply_env_overrides();
        config.validate()?;
        tracing::info!(
            path = %config.config_path.display(),
            state = %config.state_dir.display(),
            initialized,
            "Config loaded"
        );
        Ok(config)
    }

    pub async fn save(&self) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(&self.config_path, contents)
            .await
            .with_context(|| format!("failed to write {}", self.config_path.display()))
    }

    /// Catch obviously invalid values early instead of failing at arbitrary
    /// runtime points.
    pub fn validate(&self) -> Result<()> {
        if self.api_url.trim().is_empty() {
            anyhow::bail!("api_url must not be empty");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }
        if let Some(index) = &self.default_index {
            if index.trim().is_empty() {
                anyhow::bail!("default_index must not be blank when set");
            }
        }
        Ok(())
    }

    /// Apply environment variable overrides to config.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DOCCHAT_API_URL") {
            if !url.trim().is_empty() {
                self.api_url = url;
            }
        }

        if let Ok(index) = std::env::var("DOCCHAT_INDEX") {
            if !index.trim().is_empty() {
                self.default_index = Some(index);
            }
        }

        if let Ok(timeout) = std::env::var("DOCCHAT_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.trim().parse::<u64>() {
                if secs > 0 {
                    self.request_timeout_secs = secs;
                }
            }
        }
    }
}
