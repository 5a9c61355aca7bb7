//! Configuration file handling for audi-cli

use anyhow::{Context, Result};
use audi_client::{ClientConfig, EndpointsConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the CLI tool
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Default market country (e.g. `DE`)
    pub country: Option<String>,
    /// Default market language (e.g. `de`)
    pub language: Option<String>,
    /// Token cache location
    pub token_file: Option<PathBuf>,
    /// Proxy URL for all requests
    pub proxy: Option<String>,
    /// Default output format
    pub output: Option<String>,
    /// Disable colored output
    pub no_color: Option<bool>,
    /// Endpoint overrides (e.g. for a staging environment)
    pub endpoints: Option<EndpointsConfig>,
}

/// Values given on the command line (or through `AUDI_*` variables)
#[derive(Debug, Default)]
pub struct Args<'a> {
    pub country: Option<&'a str>,
    pub language: Option<&'a str>,
    pub token_file: Option<&'a Path>,
    pub proxy: Option<&'a str>,
    pub output: Option<&'a str>,
    pub no_color: bool,
}

impl Config {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Get the default config directory
    pub fn config_dir() -> Result<PathBuf> {
        Ok(dirs::config_dir()
            .context("Could not determine config directory")?
            .join("audi-cli"))
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Merge CLI arguments over config file values
    pub fn merge_with_args(&self, args: &Args<'_>) -> Result<MergedConfig> {
        let country = args
            .country
            .map(String::from)
            .or_else(|| self.country.clone())
            .unwrap_or_else(|| "DE".to_string());
        let language = args
            .language
            .map(String::from)
            .or_else(|| self.language.clone())
            .unwrap_or_else(|| "de".to_string());
        let token_file = match args.token_file.map(Path::to_path_buf) {
            Some(path) => path,
            None => match &self.token_file {
                Some(path) => path.clone(),
                None => Self::config_dir()?.join("tokens.json"),
            },
        };

        let mut builder = ClientConfig::builder()
            .market(country, language)
            .token_file(token_file);
        if let Some(proxy) = args.proxy.map(String::from).or_else(|| self.proxy.clone()) {
            builder = builder.proxy(proxy);
        }
        if let Some(endpoints) = &self.endpoints {
            builder = builder.endpoints(endpoints.clone());
        }

        Ok(MergedConfig {
            client: builder.build(),
            output: args
                .output
                .map(String::from)
                .or_else(|| self.output.clone())
                .unwrap_or_else(|| "table".to_string()),
            no_color: args.no_color || self.no_color.unwrap_or(false),
        })
    }
}

/// Fully resolved configuration after merging CLI args
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub client: ClientConfig,
    pub output: String,
    pub no_color: bool,
}

/// Credentials file contents
#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub user: String,
    pub pass: String,
}

impl Credentials {
    /// Read a `{"user": "...", "pass": "..."}` JSON file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse credentials file: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_override_file() {
        let config: Config = toml::from_str(
            r#"
country = "AT"
language = "de"
token_file = "/var/lib/audi/tokens.json"
output = "json"

[endpoints]
msg = "http://localhost:8080"
"#,
        )
        .unwrap();

        let merged = config
            .merge_with_args(&Args {
                country: Some("CH"),
                no_color: true,
                ..Default::default()
            })
            .unwrap();

        let market = merged.client.market.unwrap();
        assert_eq!(market.header_value(), "de_CH");
        assert_eq!(
            merged.client.token_file,
            PathBuf::from("/var/lib/audi/tokens.json")
        );
        assert_eq!(merged.client.endpoints.msg, "http://localhost:8080");
        assert_eq!(merged.output, "json");
        assert!(merged.no_color);
    }

    #[test]
    fn test_defaults() {
        let merged = Config::default()
            .merge_with_args(&Args {
                token_file: Some(Path::new("t.json")),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(merged.client.market.unwrap().header_value(), "de_DE");
        assert_eq!(merged.client.token_file, PathBuf::from("t.json"));
        assert_eq!(merged.output, "table");
        assert!(merged.client.proxy.is_none());
    }

    #[test]
    fn test_credentials_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, r#"{"user": "me@example.com", "pass": "pw"}"#).unwrap();

        let credentials = Credentials::load_from(&path).unwrap();
        assert_eq!(credentials.user, "me@example.com");
        assert_eq!(credentials.pass, "pw");
    }
}
