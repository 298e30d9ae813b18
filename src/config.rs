//! YAML configuration for the `catchup` binary.
//!
//! User-facing settings (check time, notification toggles) live in the
//! synced store; this file only holds machine-local wiring.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fetch::{FetchConfig, DEFAULT_ACCEPT_LANGUAGE, DEFAULT_USER_AGENT};
use crate::render::HeadlessBrowser;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration, mirroring the YAML layout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    pub app: App,
    #[serde(default)]
    pub browser: Browser,
}

/// Storage and HTTP settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    /// Directory holding `sync.json` and `local.json`.
    pub data_dir: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_accept_language")]
    pub accept_language: String,
}

/// Headless browser used for the rendered-tab fallback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Browser {
    pub command: String,
    #[serde(default = "default_browser_args")]
    pub args: Vec<String>,
}

impl Default for Browser {
    fn default() -> Self {
        Self { command: "chromium".to_string(), args: default_browser_args() }
    }
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_accept_language() -> String {
    DEFAULT_ACCEPT_LANGUAGE.to_string()
}

fn default_browser_args() -> Vec<String> {
    HeadlessBrowser::DEFAULT_ARGS.iter().map(ToString::to_string).collect()
}

impl AppConfig {
    /// Create `app.data_dir` if missing.
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        fs::create_dir_all(&self.app.data_dir)
    }

    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.app.data_dir)
    }

    /// HTTP client settings.
    #[must_use]
    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            user_agent: self.app.user_agent.clone(),
            accept_language: self.app.accept_language.clone(),
        }
    }

    /// Browser driver for the rendered-tab path.
    #[must_use]
    pub fn browser(&self) -> HeadlessBrowser {
        HeadlessBrowser::new(self.browser.command.clone(), self.browser.args.clone())
    }
}

/// Load and validate a YAML file; `None` reads `catchup.yaml` in the working directory.
pub fn load(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("catchup.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: AppConfig = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

fn validate(cfg: &AppConfig) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.user_agent.trim().is_empty() {
        return Err(ConfigError::Invalid("app.user_agent must be non-empty"));
    }
    if !cfg.app.accept_language.is_ascii() {
        return Err(ConfigError::Invalid("app.accept_language must be ASCII"));
    }
    if cfg.browser.command.trim().is_empty() {
        return Err(ConfigError::Invalid("browser.command must be non-empty"));
    }
    Ok(())
}

/// Example configuration.
#[must_use]
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  user_agent: "Mozilla/5.0 (X11; Linux x86_64) catchup"
  accept_language: "ko-KR,ko;q=0.9,en;q=0.8"

browser:
  command: "chromium"
  args:
    - "--headless"
    - "--disable-gpu"
    - "--dump-dom"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: AppConfig = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.browser.args.len(), 3);
    }

    #[test]
    fn defaults_fill_optional_fields() {
        let cfg: AppConfig = serde_yaml::from_str("app:\n  data_dir: ./d\n").unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.app.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(cfg.browser, Browser::default());
    }

    #[test]
    fn empty_data_dir_rejected() {
        let mut cfg: AppConfig = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = "  ".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn load_and_ensure_dirs() {
        let dir = tempdir().unwrap();
        let data = dir.path().join("store");
        let path = dir.path().join("catchup.yaml");
        let mut f = fs::File::create(&path).unwrap();
        writeln!(f, "app:\n  data_dir: \"{}\"", data.display()).unwrap();

        let cfg = load(Some(&path)).unwrap();
        cfg.ensure_dirs().unwrap();
        assert!(data.is_dir());
        assert_eq!(cfg.data_dir(), data);
    }
}
