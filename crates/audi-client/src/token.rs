//! Access tokens and scope-based token routing
//!
//! Every remote service declares the scope it needs. The [`TokenProvider`]
//! answers with the token registered for that scope, falling back to the
//! default (scope-less) token. A token whose `scope` lists several
//! space-separated scopes is registered under each of them.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;

/// Scopes services request tokens for
pub mod scope {
    /// MBB vehicle services
    pub const VEHICLE: &str = "vehicle";
    /// MAL roles and rights
    pub const FAL: &str = "fal";
    /// myAudi services
    pub const MYAUDI: &str = "myaudi";
    /// Identity provider
    pub const OPENID: &str = "openid";
    /// Public endpoints
    pub const NONE: &str = "";
}

/// Current unix time in seconds
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Token endpoint response (relative expiry)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    /// Seconds until expiry, relative to the response time
    #[serde(default)]
    pub expires_in: i64,
}

/// An access token with an absolute expiry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    /// Space-separated scopes, `None` for the default token
    #[serde(default)]
    pub scope: Option<String>,
    /// Absolute expiry in unix seconds
    #[serde(alias = "expires_in")]
    pub expires_at: i64,
    /// Client ID, only used by certain endpoints
    #[serde(default)]
    pub client_id: Option<String>,
}

impl Token {
    /// Convert a token endpoint response, anchoring `expires_in` at `now`
    pub fn from_response(response: TokenResponse, now: i64) -> Self {
        Self {
            access_token: response.access_token,
            token_type: response.token_type,
            refresh_token: response.refresh_token,
            id_token: response.id_token,
            scope: response.scope.filter(|s| !s.trim().is_empty()),
            expires_at: now + response.expires_in,
            client_id: None,
        }
    }

    /// Whether the token is still valid at `now`
    pub fn is_valid_at(&self, now: i64) -> bool {
        self.expires_at > now
    }

    /// Whether the token is still valid
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(unix_now())
    }

    /// Individual scopes of this token
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scope.as_deref().unwrap_or("").split_whitespace()
    }

    /// Replace the scope string
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Attach a client ID
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }
}

/// Provides the right access token for the scope of a request
#[derive(Debug, Clone, Default)]
pub struct TokenProvider {
    tokens: Vec<Token>,
    scopes: HashMap<String, usize>,
    default: Option<usize>,
}

impl TokenProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token under each of its scopes, or as the default token
    /// when it has none. Later tokens take over scopes from earlier ones.
    pub fn add_token(&mut self, token: Token) {
        let index = self.tokens.len();
        let scopes: Vec<String> = token.scopes().map(String::from).collect();
        self.tokens.push(token);

        if scopes.is_empty() {
            self.default = Some(index);
        } else {
            for scope in scopes {
                self.scopes.insert(scope, index);
            }
        }

        self.compact();
    }

    /// Token for `scope`, falling back to the default token
    pub fn get_token(&self, scope: &str) -> Option<&Token> {
        self.scopes
            .get(scope)
            .or(self.default.as_ref())
            .and_then(|&index| self.tokens.get(index))
    }

    /// The default (scope-less) token
    pub fn default_token(&self) -> Option<&Token> {
        self.default.and_then(|index| self.tokens.get(index))
    }

    /// Distinct tokens currently reachable through a scope or as default
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// True if no token is installed
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Whether every installed token is valid at `now`
    pub fn is_valid_at(&self, now: i64) -> bool {
        !self.tokens.is_empty() && self.tokens.iter().all(|t| t.is_valid_at(now))
    }

    /// Whether every installed token is still valid
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(unix_now())
    }

    /// Drop tokens that no scope points to anymore
    fn compact(&mut self) {
        let reachable: BTreeSet<usize> = self
            .scopes
            .values()
            .copied()
            .chain(self.default)
            .collect();

        if reachable.len() == self.tokens.len() {
            return;
        }

        let mut remap = HashMap::new();
        let mut kept = Vec::with_capacity(reachable.len());
        for (old, token) in std::mem::take(&mut self.tokens).into_iter().enumerate() {
            if reachable.contains(&old) {
                remap.insert(old, kept.len());
                kept.push(token);
            }
        }

        for index in self.scopes.values_mut() {
            *index = remap[&*index];
        }
        self.default = self.default.map(|index| remap[&index]);
        self.tokens = kept;
    }

    /// Write all distinct tokens to `path` as a JSON array
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let data = serde_json::to_string_pretty(&self.tokens)?;
        std::fs::write(path, data)?;
        info!("Persisted {} token(s) to {}", self.tokens.len(), path.display());
        Ok(())
    }

    /// Load tokens persisted by [`persist`](Self::persist).
    ///
    /// Returns `Ok(None)` if the file does not exist. Expiry timestamps
    /// are already absolute and are taken as-is.
    pub fn load(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.is_file() {
            debug!("No token cache at {}", path.display());
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)?;
        let tokens: Vec<Token> = serde_json::from_str(&content)?;

        let mut provider = Self::new();
        for token in tokens {
            provider.add_token(token);
        }
        Ok(Some(provider))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(access: &str, scope: Option<&str>, expires_at: i64) -> Token {
        Token {
            access_token: access.to_string(),
            token_type: Some("bearer".to_string()),
            refresh_token: None,
            id_token: None,
            scope: scope.map(String::from),
            expires_at,
            client_id: None,
        }
    }

    #[test]
    fn test_from_response_makes_expiry_absolute() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token":"abc","token_type":"bearer","expires_in":3600,"scope":"openid myaudi"}"#,
        )
        .unwrap();

        let token = Token::from_response(response, 1_000);
        assert_eq!(token.expires_at, 4_600);
        assert!(token.is_valid_at(4_599));
        assert!(!token.is_valid_at(4_600));
        assert_eq!(token.scopes().collect::<Vec<_>>(), vec!["openid", "myaudi"]);
    }

    #[test]
    fn test_empty_scope_becomes_default() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"abc","scope":"  "}"#).unwrap();
        let token = Token::from_response(response, 0);
        assert_eq!(token.scope, None);
    }

    #[test]
    fn test_scope_routing() {
        let mut provider = TokenProvider::new();
        provider.add_token(token("identity", Some("openid profile myaudi"), 100));
        provider.add_token(token("mbb", Some("vehicle fal"), 100));

        assert_eq!(provider.get_token("myaudi").unwrap().access_token, "identity");
        assert_eq!(provider.get_token("openid").unwrap().access_token, "identity");
        assert_eq!(provider.get_token("vehicle").unwrap().access_token, "mbb");
        assert_eq!(provider.get_token("fal").unwrap().access_token, "mbb");
        assert!(provider.get_token("unknown").is_none());
    }

    #[test]
    fn test_default_token_fallback() {
        let mut provider = TokenProvider::new();
        provider.add_token(token("fallback", None, 100));
        provider.add_token(token("mbb", Some("vehicle"), 100));

        assert_eq!(provider.get_token("vehicle").unwrap().access_token, "mbb");
        assert_eq!(provider.get_token("myaudi").unwrap().access_token, "fallback");
        assert_eq!(provider.default_token().unwrap().access_token, "fallback");
    }

    #[test]
    fn test_later_token_overrides_scope() {
        let mut provider = TokenProvider::new();
        provider.add_token(token("old", Some("vehicle fal"), 100));
        provider.add_token(token("new", Some("vehicle fal"), 200));

        assert_eq!(provider.get_token("vehicle").unwrap().access_token, "new");
        // The replaced token is no longer reachable and is dropped
        assert_eq!(provider.tokens().len(), 1);
    }

    #[test]
    fn test_partial_override_keeps_old_token() {
        let mut provider = TokenProvider::new();
        provider.add_token(token("old", Some("vehicle fal"), 100));
        provider.add_token(token("new", Some("vehicle"), 200));

        assert_eq!(provider.get_token("vehicle").unwrap().access_token, "new");
        assert_eq!(provider.get_token("fal").unwrap().access_token, "old");
        assert_eq!(provider.tokens().len(), 2);
    }

    #[test]
    fn test_validity() {
        let mut provider = TokenProvider::new();
        assert!(!provider.is_valid_at(0));

        provider.add_token(token("a", Some("myaudi"), 100));
        provider.add_token(token("b", Some("vehicle"), 50));
        assert!(provider.is_valid_at(49));
        assert!(!provider.is_valid_at(50));
    }

    #[test]
    fn test_persist_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tokens.json");

        let mut provider = TokenProvider::new();
        provider.add_token(token("identity", Some("openid myaudi"), 1_700_000_000));
        provider.add_token(
            token("mbb", Some("vehicle fal"), 1_700_000_500).with_client_id("client-1"),
        );
        provider.persist(&path).unwrap();

        let loaded = TokenProvider::load(&path).unwrap().unwrap();
        assert_eq!(loaded.tokens().len(), 2);

        let mbb = loaded.get_token("fal").unwrap();
        assert_eq!(mbb.access_token, "mbb");
        // Timestamps are stored absolute and must not be shifted again
        assert_eq!(mbb.expires_at, 1_700_000_500);
        assert_eq!(mbb.client_id.as_deref(), Some("client-1"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = TokenProvider::load(dir.path().join("missing.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_legacy_expires_in_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(
            &path,
            r#"[{"access_token":"x","token_type":"bearer","refresh_token":"r","id_token":null,"scope":null,"expires_in":1234,"client_id":null}]"#,
        )
        .unwrap();

        let loaded = TokenProvider::load(&path).unwrap().unwrap();
        assert_eq!(loaded.default_token().unwrap().expires_at, 1234);
    }
}
