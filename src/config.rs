use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data_file: String,
    pub mirror_file: String,
    /// Catalog source groups. Each group is a list of fallback locations
    /// (URLs or file paths) tried in order until one is reachable.
    pub catalog_sources: Vec<Vec<String>>,
    pub base_origin: String,
    pub link_domain: String,
    pub host: String,
    pub port: u16,
    pub default_width: u32,
    pub default_height: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_file: "data/banners.json".to_string(),
            mirror_file: "public/backend/data/banners.json".to_string(),
            catalog_sources: vec![
                vec![
                    "public/backend/data/banners.json".to_string(),
                    "public/backend/banners.json".to_string(),
                ],
                vec![
                    "public/backend/data/cyber-banner.json".to_string(),
                    "public/backend/cyber-banner.json".to_string(),
                ],
            ],
            base_origin: "https://www.sodimac.cl".to_string(),
            link_domain: "sodimac.cl".to_string(),
            host: "127.0.0.1".to_string(),
            port: 5177,
            default_width: 600,
            default_height: 200,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = if path.as_ref().exists() {
            let content = fs::read_to_string(path)
                .context("Failed to read config file")?;
            let config: Config = serde_json::from_str(&content)
                .context("Failed to parse config file")?;
            config
        } else {
            // Create default config
            let config = Config::default();
            let content = serde_json::to_string_pretty(&config)
                .context("Failed to serialize default config")?;
            fs::write(path, content)
                .context("Failed to write default config")?;
            config
        };

        // PORT environment variable takes precedence over the config file
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(port) = port.parse() {
                config.port = port;
            }
        }

        Ok(config)
    }

    /// Link rewriting rules derived from the configured host settings.
    pub fn link_rules(&self) -> LinkRules {
        LinkRules {
            base_origin: self.base_origin.trim_end_matches('/').to_string(),
            link_domain: self.link_domain.to_lowercase(),
        }
    }
}

/// Which origin the redirect macro targets and which domain qualifies for it.
#[derive(Debug, Clone)]
pub struct LinkRules {
    pub base_origin: String,
    pub link_domain: String,
}

impl Default for LinkRules {
    fn default() -> Self {
        Config::default().link_rules()
    }
}
