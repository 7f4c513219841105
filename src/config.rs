use std::fs;
use std::path::{Path, PathBuf};

use console::style;
use serde::{Deserialize, Serialize};

use crate::error::{Result, UpdateError};
use crate::updater::DEFAULT_BASE_URL;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub product: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            product: "pro".to_string(),
            install_path: None,
            download_dir: None,
        }
    }
}

impl Config {
    /// Install location from the config file, if one is set.
    pub fn install_path(&self) -> Option<PathBuf> {
        self.install_path.as_deref().map(expand_tilde)
    }

    /// Where installers are saved; the working directory unless configured.
    pub fn download_dir(&self) -> Result<PathBuf> {
        match self.download_dir.as_deref() {
            Some(dir) => Ok(expand_tilde(dir)),
            None => Ok(std::env::current_dir()?),
        }
    }
}

fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("~"))
        .join(".config/burp-update/config.toml")
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(home) = dirs::home_dir() {
        if path == "~" {
            return home;
        }
        if let Some(rest) = path.strip_prefix("~/") {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

pub fn save_to(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config).map_err(|e| UpdateError::Config(e.to_string()))?;
    fs::write(path, content)?;
    Ok(())
}

pub fn load() -> Result<Config> {
    load_from(&config_path())
}

pub fn load_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        let config = Config::default();
        if let Err(e) = save_to(&config, path) {
            eprintln!(
                "{} failed to write {}: {e}",
                style("warning:").yellow().bold(),
                path.display()
            );
        }
        return Ok(config);
    }

    let content = fs::read_to_string(path)?;
    match toml::from_str(&content) {
        Ok(config) => Ok(config),
        Err(e) => {
            eprintln!(
                "{} failed to parse {}: {e}",
                style("warning:").yellow().bold(),
                path.display()
            );
            Ok(Config::default())
        }
    }
}
