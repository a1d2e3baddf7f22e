use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Global Mole configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Emit a scan progress label every N visited entries
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,

    /// Minimum wall-clock duration of a clean, in milliseconds
    #[serde(default = "default_min_clean_millis")]
    pub min_clean_millis: u64,

    /// Pause between trashed items during an uninstall, in milliseconds
    #[serde(default = "default_removal_pacing_millis")]
    pub removal_pacing_millis: u64,

    /// Pause after each maintenance step, in milliseconds
    #[serde(default = "default_step_pacing_millis")]
    pub step_pacing_millis: u64,

    /// Directory enumerated for application bundles
    #[serde(default = "default_applications_dir")]
    pub applications_dir: PathBuf,

    /// Persist the admin credential to disk between runs
    #[serde(default = "default_true")]
    pub persist_credential: bool,

    /// Fall back to the native consent dialog when no credential is cached
    #[serde(default)]
    pub native_prompt_fallback: bool,

    /// Write a rolling log file under ~/.mole/logs
    #[serde(default)]
    pub log_to_file: bool,

    /// Additional user-owned directories whose contents may be reclaimed
    #[serde(default)]
    pub extra_user_paths: Vec<PathBuf>,
}

fn default_progress_every() -> usize {
    200
}
fn default_min_clean_millis() -> u64 {
    1000
}
fn default_removal_pacing_millis() -> u64 {
    100
}
fn default_step_pacing_millis() -> u64 {
    500
}
fn default_applications_dir() -> PathBuf {
    PathBuf::from("/Applications")
}
fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            progress_every: default_progress_every(),
            min_clean_millis: default_min_clean_millis(),
            removal_pacing_millis: default_removal_pacing_millis(),
            step_pacing_millis: default_step_pacing_millis(),
            applications_dir: default_applications_dir(),
            persist_credential: true,
            native_prompt_fallback: false,
            log_to_file: false,
            extra_user_paths: Vec::new(),
        }
    }
}

impl Config {
    /// Get the Mole data directory (~/.mole)
    pub fn data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".mole")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        Self::data_dir().join("config.toml")
    }

    /// Get the persisted credential path
    pub fn credential_path() -> PathBuf {
        Self::data_dir().join(".key")
    }

    /// Get the logs directory
    pub fn logs_dir() -> PathBuf {
        Self::data_dir().join("logs")
    }

    /// Load config from file, or fall back to defaults if not present
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            Self::parse(&contents)
                .with_context(|| format!("Failed to parse config: {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Parse a TOML document; missing keys take their defaults
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();
        let dir = Self::data_dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config dir: {}", dir.display()))?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Initialize all Mole directories
    pub fn init_dirs() -> Result<()> {
        for dir in [Self::data_dir(), Self::logs_dir()] {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn min_clean_duration(&self) -> Duration {
        Duration::from_millis(self.min_clean_millis)
    }

    pub fn removal_pacing(&self) -> Duration {
        Duration::from_millis(self.removal_pacing_millis)
    }

    pub fn step_pacing(&self) -> Duration {
        Duration::from_millis(self.step_pacing_millis)
    }
}
