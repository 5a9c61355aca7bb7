//! Client configuration with YAML/TOML support

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AudiClientError, Result};

/// Audi Connect client configuration
///
/// Can be loaded from YAML, TOML, or constructed programmatically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Market the account is registered in
    #[serde(default)]
    pub market: Option<MarketConfig>,

    /// Brand segment used in MBB URLs
    #[serde(default = "default_brand")]
    pub brand: String,

    /// Country segment used in MBB URLs
    #[serde(default = "default_mbb_country")]
    pub mbb_country: String,

    /// Remote hosts (overridable per environment)
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    /// Proxy URL applied to every scheme (e.g. `http://proxy:8080`)
    #[serde(default)]
    pub proxy: Option<String>,

    /// Location of the persisted token cache
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,
}

/// Market area (country + language)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Country code (e.g. `DE`)
    pub country: String,
    /// Language code (e.g. `de`)
    pub language: String,
}

impl MarketConfig {
    pub fn new(country: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            language: language.into(),
        }
    }

    /// Value of the `X-Market` header, `<language>_<country>`
    pub fn header_value(&self) -> String {
        format!("{}_{}", self.language, self.country)
    }
}

fn default_brand() -> String {
    "Audi".to_string()
}

fn default_mbb_country() -> String {
    "DE".to_string()
}

fn default_token_file() -> PathBuf {
    PathBuf::from("tokens.json")
}

/// Remote host configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    /// myAudi message host
    #[serde(default = "default_msg")]
    pub msg: String,

    /// MBB `fs-car` base
    #[serde(default = "default_fs_car")]
    pub fs_car: String,

    /// MAL (roles and rights) base
    #[serde(default = "default_mal")]
    pub mal: String,

    /// Audi ID identity provider
    #[serde(default = "default_identity")]
    pub identity: String,

    /// Token endpoint exchanging the Audi ID authorization code
    #[serde(default = "default_azs_token")]
    pub azs_token: String,

    /// MBB OAuth base (client registration + token exchange)
    #[serde(default = "default_mbb_oauth")]
    pub mbb_oauth: String,

    /// Markets listing
    #[serde(default = "default_markets")]
    pub markets: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            msg: default_msg(),
            fs_car: default_fs_car(),
            mal: default_mal(),
            identity: default_identity(),
            azs_token: default_azs_token(),
            mbb_oauth: default_mbb_oauth(),
            markets: default_markets(),
        }
    }
}

impl EndpointsConfig {
    /// Route every endpoint to a single host, keeping the vendor path layout
    pub fn single_host(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            msg: base.to_string(),
            fs_car: format!("{}/fs-car", base),
            mal: format!("{}/api", base),
            identity: format!("{}/identity", base),
            azs_token: format!("{}/login/v1/audi/token", base),
            mbb_oauth: format!("{}/mbbcoaauth", base),
            markets: format!("{}/onetouch/configs/markets.json", base),
        }
    }
}

fn default_msg() -> String {
    "https://msg.audi.de".to_string()
}

fn default_fs_car() -> String {
    "https://msg.volkswagen.de/fs-car".to_string()
}

fn default_mal() -> String {
    "https://mal-1a.prd.ece.vwg-connect.com/api".to_string()
}

fn default_identity() -> String {
    "https://id.audi.com".to_string()
}

fn default_azs_token() -> String {
    "https://emea.bff.cariad.digital/login/v1/audi/token".to_string()
}

fn default_mbb_oauth() -> String {
    "https://mbboauth-1d.prd.ece.vwg-connect.com/mbbcoaauth".to_string()
}

fn default_markets() -> String {
    "https://apps.audi.com/onetouch/configs/markets.json".to_string()
}

/// Timeout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    /// General request timeout in milliseconds (default: 30s)
    #[serde(default = "default_request_timeout")]
    pub request_ms: u64,

    /// Connect timeout in milliseconds (default: 10s)
    #[serde(default = "default_connect_timeout")]
    pub connect_ms: u64,

    /// Interval between request status polls (default: 1s)
    #[serde(default = "default_poll_interval")]
    pub poll_ms: u64,

    /// Upper bound for a single poll loop (default: 2 minutes)
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            request_ms: default_request_timeout(),
            connect_ms: default_connect_timeout(),
            poll_ms: default_poll_interval(),
            poll_timeout_ms: default_poll_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    30_000 // 30 seconds
}

fn default_connect_timeout() -> u64 {
    10_000 // 10 seconds
}

fn default_poll_interval() -> u64 {
    1_000
}

fn default_poll_timeout() -> u64 {
    120_000 // 2 minutes
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            market: None,
            brand: default_brand(),
            mbb_country: default_mbb_country(),
            endpoints: EndpointsConfig::default(),
            timeouts: TimeoutsConfig::default(),
            proxy: None,
            token_file: default_token_file(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| AudiClientError::ConfigError(e.to_string()))
    }

    /// Parse configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| AudiClientError::ConfigError(e.to_string()))
    }

    /// Serialize configuration to YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| AudiClientError::ConfigError(e.to_string()))
    }

    /// Create a builder for programmatic configuration
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Build an MBB service URL:
    /// `{fs_car}/{service_path}/{brand}/{country}{part}`
    pub fn mbb_url(&self, service_path: &str, part: &str) -> String {
        format!(
            "{}/{}/{}/{}{}",
            self.endpoints.fs_car.trim_end_matches('/'),
            service_path.trim_matches('/'),
            self.brand,
            self.mbb_country,
            part
        )
    }

    /// Build a myAudi service URL: `{msg}/{service_path}{part}`
    pub fn msg_url(&self, service_path: &str, part: &str) -> String {
        format!(
            "{}/{}{}",
            self.endpoints.msg.trim_end_matches('/'),
            service_path.trim_matches('/'),
            part
        )
    }

    /// Build a MAL service URL: `{mal}/{service_path}{part}`
    pub fn mal_url(&self, service_path: &str, part: &str) -> String {
        format!(
            "{}/{}{}",
            self.endpoints.mal.trim_end_matches('/'),
            service_path.trim_matches('/'),
            part
        )
    }

    /// Build an MBB OAuth URL: `{mbb_oauth}{part}`
    pub fn mbb_oauth_url(&self, part: &str) -> String {
        format!("{}{}", self.endpoints.mbb_oauth.trim_end_matches('/'), part)
    }

    /// Build an identity provider URL: `{identity}{part}`
    pub fn identity_url(&self, part: &str) -> String {
        format!("{}{}", self.endpoints.identity.trim_end_matches('/'), part)
    }
}

/// Builder for ClientConfig
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new builder with vendor defaults
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    /// Set the market area (country, e.g. `DE`; language, e.g. `de`)
    pub fn market(mut self, country: impl Into<String>, language: impl Into<String>) -> Self {
        self.config.market = Some(MarketConfig::new(country, language));
        self
    }

    /// Set the brand segment of MBB URLs
    pub fn brand(mut self, brand: impl Into<String>) -> Self {
        self.config.brand = brand.into();
        self
    }

    /// Set the country segment of MBB URLs
    pub fn mbb_country(mut self, country: impl Into<String>) -> Self {
        self.config.mbb_country = country.into();
        self
    }

    /// Replace every endpoint
    pub fn endpoints(mut self, endpoints: EndpointsConfig) -> Self {
        self.config.endpoints = endpoints;
        self
    }

    /// Route every endpoint to a single host
    pub fn single_host(mut self, base_url: &str) -> Self {
        self.config.endpoints = EndpointsConfig::single_host(base_url);
        self
    }

    /// Use a proxy for all requests
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.config.proxy = Some(proxy.into());
        self
    }

    /// Set the token cache location
    pub fn token_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.token_file = path.into();
        self
    }

    /// Set request timeout in milliseconds
    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.request_ms = ms;
        self
    }

    /// Set connect timeout in milliseconds
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.connect_ms = ms;
        self
    }

    /// Set status poll interval in milliseconds
    pub fn poll_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.poll_ms = ms;
        self
    }

    /// Set the overall poll timeout in milliseconds
    pub fn poll_timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.poll_timeout_ms = ms;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
market:
  country: "DE"
  language: "de"

endpoints:
  msg: "http://localhost:8080"

timeouts:
  poll_ms: 250
"#;

        let config = ClientConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.market, Some(MarketConfig::new("DE", "de")));
        assert_eq!(config.endpoints.msg, "http://localhost:8080");
        // Unspecified endpoints keep vendor defaults
        assert_eq!(config.endpoints.identity, "https://id.audi.com");
        assert_eq!(config.timeouts.poll_ms, 250);
        assert_eq!(config.timeouts.request_ms, 30_000);
        assert_eq!(config.brand, "Audi");
        assert_eq!(config.token_file, PathBuf::from("tokens.json"));
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
brand = "Audi"
mbb_country = "AT"
proxy = "http://proxy:8080"

[market]
country = "AT"
language = "de"
"#;

        let config = ClientConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.mbb_country, "AT");
        assert_eq!(config.proxy.as_deref(), Some("http://proxy:8080"));
        assert_eq!(config.market.unwrap().header_value(), "de_AT");
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::builder()
            .market("DE", "de")
            .token_file("/tmp/audi/tokens.json")
            .poll_ms(10)
            .build();

        assert_eq!(config.market.unwrap().header_value(), "de_DE");
        assert_eq!(config.token_file, PathBuf::from("/tmp/audi/tokens.json"));
        assert_eq!(config.timeouts.poll_ms, 10);
    }

    #[test]
    fn test_url_templates() {
        let config = ClientConfig::default();

        assert_eq!(
            config.mbb_url("bs/vsr/v1", "/vehicles/WAUZZZ/status"),
            "https://msg.volkswagen.de/fs-car/bs/vsr/v1/Audi/DE/vehicles/WAUZZZ/status"
        );
        assert_eq!(
            config.msg_url("myaudi/vehicle-management/v1", "/vehicles"),
            "https://msg.audi.de/myaudi/vehicle-management/v1/vehicles"
        );
        assert_eq!(
            config.mal_url("rolesrights/operationlist/v3", "/vehicles/WAUZZZ/operations"),
            "https://mal-1a.prd.ece.vwg-connect.com/api/rolesrights/operationlist/v3/vehicles/WAUZZZ/operations"
        );
    }

    #[test]
    fn test_single_host() {
        let config = ClientConfig::builder()
            .single_host("http://127.0.0.1:9000/")
            .build();

        assert_eq!(config.endpoints.fs_car, "http://127.0.0.1:9000/fs-car");
        assert_eq!(
            config.identity_url("/v1/userinfo"),
            "http://127.0.0.1:9000/identity/v1/userinfo"
        );
        assert_eq!(
            config.mbb_oauth_url("/mobile/register/v1"),
            "http://127.0.0.1:9000/mbbcoaauth/mobile/register/v1"
        );
    }

    #[test]
    fn test_to_yaml() {
        let config = ClientConfig::builder().market("DE", "de").build();

        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("fs_car"));
        assert!(yaml.contains("https://msg.audi.de"));
    }
}
