//! Service configuration.
//!
//! Values come from, in increasing precedence: built-in defaults, the JSON
//! config file in the user's config directory, then environment variables:
//! - `DPROMPT_DATA_DIR` - root directory for discussion audio
//! - `DPROMPT_DB_PATH` - SQLite database file
//! - `DPROMPT_BIND` - address the HTTP server binds to
//! - `DPROMPT_PORT` - HTTP port

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};

const APP_NAME: &str = "discussion-prompts";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the student-work tree where discussion audio is stored.
    pub data_dir: PathBuf,
    /// Database file. `None` uses the platform data directory.
    pub db_path: Option<PathBuf>,
    pub bind: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = directories::ProjectDirs::from("", "", APP_NAME)
            .map(|d| d.data_dir().join("student-work"))
            .unwrap_or_else(|| PathBuf::from("student-work"));

        Self {
            data_dir,
            db_path: None,
            bind: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl Config {
    /// Load the config file and apply environment overrides.
    ///
    /// A missing or unreadable file falls back to defaults.
    pub fn load() -> Self {
        let config = match Self::try_load() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config, using defaults: {:#}", e);
                Self::default()
            }
        };
        config.with_env_overrides(|key| std::env::var(key).ok())
    }

    fn try_load() -> Result<Self> {
        let config_path = get_config_path()?;
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config = serde_json::from_str(&content).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Apply overrides looked up through `var`.
    ///
    /// Unparseable port values are ignored.
    pub fn with_env_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = var("DPROMPT_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(path) = var("DPROMPT_DB_PATH") {
            self.db_path = Some(PathBuf::from(path));
        }
        if let Some(bind) = var("DPROMPT_BIND") {
            self.bind = bind;
        }
        if let Some(port) = var("DPROMPT_PORT").and_then(|p| p.parse().ok()) {
            self.port = port;
        }
        self
    }

    /// Save the current configuration to disk.
    pub fn save(&self) -> Result<()> {
        let config_path = get_config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

fn get_config_path() -> Result<PathBuf> {
    let mut path =
        config_dir().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    path.push(APP_NAME);
    path.push(CONFIG_FILE);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let config = Config::default().with_env_overrides(env(&[
            ("DPROMPT_DATA_DIR", "/srv/work"),
            ("DPROMPT_PORT", "8080"),
            ("DPROMPT_BIND", "0.0.0.0"),
        ]));

        assert_eq!(config.data_dir, PathBuf::from("/srv/work"));
        assert_eq!(config.listen_addr(), "0.0.0.0:8080");
        assert!(config.db_path.is_none());
    }

    #[test]
    fn bad_port_is_ignored() {
        let config = Config::default().with_env_overrides(env(&[("DPROMPT_PORT", "eighty")]));
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let config: Config = serde_json::from_str(r#"{ "port": 4100 }"#).unwrap();
        assert_eq!(config.port, 4100);
        assert_eq!(config.bind, "127.0.0.1");
    }
}
