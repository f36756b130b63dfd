use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8040";
pub const DEFAULT_FIRST_BYTE_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct Config {
    pub base_url: Option<String>,
    /// Opaque token forwarded in the stream request body. There is no auth
    /// handshake; the backend decides what, if anything, it means.
    pub access_token: Option<String>,
    pub default_model: Option<String>,
    /// Collection name forwarded as `collection_name` when set.
    pub collection: Option<String>,
    pub with_gpt: Option<bool>,
    pub first_byte_timeout_secs: Option<u64>,
}

impl Config {
    pub fn load() -> Result<Config, Box<dyn std::error::Error>> {
        let config_path = Self::get_config_path();
        Self::load_from_path(&config_path)
    }

    pub fn load_from_path(config_path: &PathBuf) -> Result<Config, Box<dyn std::error::Error>> {
        if config_path.exists() {
            let contents = fs::read_to_string(config_path)?;
            let config: Config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let config_path = Self::get_config_path();
        self.save_to_path(&config_path)
    }

    pub fn save_to_path(&self, config_path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    fn get_config_path() -> PathBuf {
        let proj_dirs = ProjectDirs::from("org", "permacommons", "ragline")
            .expect("Failed to determine config directory");
        proj_dirs.config_dir().join("config.toml")
    }

    pub fn endpoint_base(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    pub fn first_byte_timeout(&self) -> Duration {
        Duration::from_secs(
            self.first_byte_timeout_secs
                .unwrap_or(DEFAULT_FIRST_BYTE_TIMEOUT_SECS),
        )
    }

    pub fn print_all(&self) {
        println!("Current configuration:");
        match &self.base_url {
            Some(url) => println!("  base-url: {url}"),
            None => println!("  base-url: (unset, using {DEFAULT_BASE_URL})"),
        }
        match &self.access_token {
            Some(_) => println!("  token: (set)"),
            None => println!("  token: (unset)"),
        }
        match &self.default_model {
            Some(model) => println!("  default-model: {model}"),
            None => println!("  default-model: (unset)"),
        }
        match &self.collection {
            Some(collection) => println!("  collection: {collection}"),
            None => println!("  collection: (unset)"),
        }
        match self.with_gpt {
            Some(true) => println!("  with-gpt: on"),
            Some(false) => println!("  with-gpt: off"),
            None => println!("  with-gpt: (unset)"),
        }
        match self.first_byte_timeout_secs {
            Some(secs) => println!("  first-byte-timeout: {secs}s"),
            None => println!(
                "  first-byte-timeout: (unset, using {DEFAULT_FIRST_BYTE_TIMEOUT_SECS}s)"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_nonexistent_config() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config_path = temp_dir.path().join("nonexistent_config.toml");

        let config = Config::load_from_path(&config_path).expect("Failed to load config");

        assert_eq!(config.base_url, None);
        assert_eq!(config.endpoint_base(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config_path = temp_dir.path().join("test_config.toml");

        let config = Config {
            base_url: Some("http://rag.internal:8040".to_string()),
            default_model: Some("saiga".to_string()),
            with_gpt: Some(true),
            ..Default::default()
        };

        config
            .save_to_path(&config_path)
            .expect("Failed to save config");

        let loaded = Config::load_from_path(&config_path).expect("Failed to load config");

        assert_eq!(loaded.base_url.as_deref(), Some("http://rag.internal:8040"));
        assert_eq!(loaded.default_model.as_deref(), Some("saiga"));
        assert_eq!(loaded.with_gpt, Some(true));
        assert_eq!(loaded.access_token, None);
    }

    #[test]
    fn test_unset_field_round_trips_as_none() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config_path = temp_dir.path().join("test_config.toml");

        let config = Config {
            access_token: Some("secret".to_string()),
            ..Default::default()
        };
        config
            .save_to_path(&config_path)
            .expect("Failed to save config");

        let mut config = Config::load_from_path(&config_path).expect("Failed to load config");
        config.access_token = None;
        config
            .save_to_path(&config_path)
            .expect("Failed to save config");

        let loaded = Config::load_from_path(&config_path).expect("Failed to load config");
        assert_eq!(loaded.access_token, None);
    }

    #[test]
    fn test_timeout_defaults_and_override() {
        let config = Config::default();
        assert_eq!(
            config.first_byte_timeout(),
            Duration::from_secs(DEFAULT_FIRST_BYTE_TIMEOUT_SECS)
        );

        let config = Config {
            first_byte_timeout_secs: Some(5),
            ..Default::default()
        };
        assert_eq!(config.first_byte_timeout(), Duration::from_secs(5));
    }
}
