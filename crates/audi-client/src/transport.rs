//! HTTP transport: vendor headers, scoped bearer auth and response decoding

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{redirect, Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{AudiClientError, Result};
use crate::token::{Token, TokenProvider};

/// Headers the vendor's Android app sends with every request
const BASE_HEADERS: &[(&str, &str)] = &[
    ("Accept", "application/json"),
    ("X-App-ID", "de.audi.mmiapp"),
    ("X-App-Name", "MMIconnect"),
    ("X-App-Version", "2.8.3"),
    ("X-Brand", "audi"),
    ("X-Platform", "google"),
    ("User-Agent", "okhttp/2.7.4"),
    ("ADRUM_1", "isModule:true"),
    ("ADRUM", "isAray:true"),
];

/// Authorization value sent when no token is available for a scope
const ANONYMOUS_AUTH: &str = "AudiAuth 1";

/// Build a `reqwest` client honoring the configured timeouts and proxy
pub(crate) fn build_http_client(
    config: &ClientConfig,
    redirect_policy: redirect::Policy,
) -> Result<Client> {
    let mut builder = Client::builder()
        .timeout(Duration::from_millis(config.timeouts.request_ms))
        .connect_timeout(Duration::from_millis(config.timeouts.connect_ms))
        .cookie_store(true)
        .redirect(redirect_policy);

    if let Some(proxy) = &config.proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy)?);
    }

    Ok(builder.build()?)
}

/// Parse `name: value` pairs into a header map
pub(crate) fn header_map(pairs: &[(&str, &str)]) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| AudiClientError::ParseError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| AudiClientError::ParseError(format!("Invalid header value: {}", e)))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

/// Low-level API access shared by all endpoint wrappers
#[derive(Debug, Clone)]
pub struct Api {
    client: Client,
    config: ClientConfig,
    tokens: Arc<RwLock<TokenProvider>>,
}

impl Api {
    /// Create a transport from configuration
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = build_http_client(&config, redirect::Policy::default())?;
        Ok(Self {
            client,
            config,
            tokens: Arc::new(RwLock::new(TokenProvider::new())),
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get a reference to the underlying HTTP client
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    /// Shared token provider
    pub fn token_provider(&self) -> Arc<RwLock<TokenProvider>> {
        Arc::clone(&self.tokens)
    }

    /// Replace every installed token
    pub fn set_token_provider(&self, provider: TokenProvider) {
        *self.tokens.write() = provider;
    }

    /// Install a single token (routed by its scopes)
    pub fn use_token(&self, token: Token) {
        self.tokens.write().add_token(token);
    }

    /// Token currently routed for `scope`
    pub fn token_for(&self, scope: &str) -> Option<Token> {
        self.tokens.read().get_token(scope).cloned()
    }

    /// Headers common to every request, including auth for `scope`
    fn headers_for(&self, scope: &str) -> Result<HeaderMap> {
        let mut headers = header_map(BASE_HEADERS)?;

        let (country, language) = match &self.config.market {
            Some(market) => (market.country.as_str(), market.language.as_str()),
            None => ("DE", "de"),
        };
        headers.extend(header_map(&[
            ("X-Country-Id", country),
            ("X-Language-Id", language),
        ])?);

        if let Some(market) = &self.config.market {
            let value = market.header_value();
            headers.extend(header_map(&[("X-Market", value.as_str())])?);
        }

        let auth = match self.tokens.read().get_token(scope) {
            Some(token) => format!("Bearer {}", token.access_token),
            None => {
                debug!("No token for scope '{}', sending anonymous auth", scope);
                ANONYMOUS_AUTH.to_string()
            }
        };
        let auth = HeaderValue::from_str(&auth)
            .map_err(|e| AudiClientError::ParseError(format!("Invalid auth token: {}", e)))?;
        headers.insert(AUTHORIZATION, auth);

        Ok(headers)
    }

    fn request(&self, method: Method, url: &str, scope: &str) -> Result<RequestBuilder> {
        debug!("{} {} (scope: {})", method, url, scope);
        Ok(self
            .client
            .request(method, url)
            .headers(self.headers_for(scope)?))
    }

    /// GET and decode the JSON response
    pub async fn get<T: DeserializeOwned>(&self, url: &str, scope: &str) -> Result<T> {
        let response = self.request(Method::GET, url, scope)?.send().await?;
        handle_response(response).await
    }

    /// GET with extra headers
    pub async fn get_with_headers<T: DeserializeOwned>(
        &self,
        url: &str,
        scope: &str,
        headers: HeaderMap,
    ) -> Result<T> {
        let response = self
            .request(Method::GET, url, scope)?
            .headers(headers)
            .send()
            .await?;
        handle_response(response).await
    }

    /// POST a JSON body
    pub async fn post_json<B, T>(&self, url: &str, scope: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::POST, url, scope)?
            .json(body)
            .send()
            .await?;
        handle_response(response).await
    }

    /// POST without a body
    pub async fn post_empty<T: DeserializeOwned>(&self, url: &str, scope: &str) -> Result<T> {
        let response = self
            .request(Method::POST, url, scope)?
            .header(reqwest::header::CONTENT_LENGTH, "0")
            .send()
            .await?;
        handle_response(response).await
    }

    /// POST a raw body with an explicit content type and extra headers
    pub async fn post_body<T: DeserializeOwned>(
        &self,
        url: &str,
        scope: &str,
        body: String,
        content_type: &str,
        headers: HeaderMap,
    ) -> Result<T> {
        let response = self
            .request(Method::POST, url, scope)?
            .headers(headers)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;
        handle_response(response).await
    }

    /// PUT a JSON body with extra headers
    pub async fn put_json<B, T>(
        &self,
        url: &str,
        scope: &str,
        body: &B,
        headers: HeaderMap,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::PUT, url, scope)?
            .headers(headers)
            .json(body)
            .send()
            .await?;
        handle_response(response).await
    }
}

/// Decode a vendor response.
///
/// 404 maps to [`AudiClientError::NotFound`]. An empty body decodes as JSON
/// `null`. A body carrying an `error` member becomes
/// [`AudiClientError::ApiError`] regardless of status.
pub(crate) async fn handle_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T> {
    let status = response.status();
    let url = response.url().to_string();

    if status == StatusCode::NOT_FOUND {
        return Err(AudiClientError::NotFound(url));
    }

    let text = response.text().await?;
    let value: serde_json::Value = if text.trim().is_empty() {
        serde_json::Value::Null
    } else {
        match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) if status.is_success() => {
                debug!("Undecodable response from {}: {}", url, text);
                return Err(AudiClientError::ParseError(format!(
                    "Error while decoding response: {}",
                    e
                )));
            }
            Err(_) => return Err(AudiClientError::server_error(status.as_u16(), text)),
        }
    };

    if let Some(err) = api_error(&value) {
        return Err(err);
    }

    if !status.is_success() {
        return Err(AudiClientError::server_error(
            status.as_u16(),
            format!("HTTP {}", status),
        ));
    }

    serde_json::from_value(value).map_err(|e| AudiClientError::ParseError(e.to_string()))
}

/// Extract an `error` member in either the MBB or the OAuth shape
fn api_error(value: &serde_json::Value) -> Option<AudiClientError> {
    let error = value.get("error")?;

    let (code, description) = match error {
        serde_json::Value::Null => return None,
        serde_json::Value::String(code) => (
            code.clone(),
            value
                .get("error_description")
                .and_then(|d| d.as_str())
                .unwrap_or_default()
                .to_string(),
        ),
        serde_json::Value::Object(map) => (
            map.get("errorCode")
                .and_then(|c| c.as_str())
                .map(String::from)
                .unwrap_or_else(|| error.to_string()),
            map.get("description")
                .and_then(|d| d.as_str())
                .unwrap_or_default()
                .to_string(),
        ),
        other => (other.to_string(), String::new()),
    };

    Some(AudiClientError::ApiError { code, description })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_api_error_mbb_shape() {
        let body = json!({
            "error": {"errorCode": "gw.error.authentication", "description": "Token expired"}
        });
        match api_error(&body) {
            Some(AudiClientError::ApiError { code, description }) => {
                assert_eq!(code, "gw.error.authentication");
                assert_eq!(description, "Token expired");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_api_error_oauth_shape() {
        let body = json!({"error": "invalid_grant", "error_description": "bad code"});
        match api_error(&body) {
            Some(AudiClientError::ApiError { code, description }) => {
                assert_eq!(code, "invalid_grant");
                assert_eq!(description, "bad code");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_no_api_error() {
        assert!(api_error(&json!({"vehicles": []})).is_none());
        assert!(api_error(&json!({"error": null})).is_none());
        assert!(api_error(&json!(null)).is_none());
    }

    #[test]
    fn test_headers_anonymous_and_bearer() {
        let config = ClientConfig::builder().market("DE", "de").build();
        let api = Api::new(config).unwrap();

        let headers = api.headers_for("vehicle").unwrap();
        assert_eq!(headers[AUTHORIZATION], "AudiAuth 1");
        assert_eq!(headers["X-Market"], "de_DE");
        assert_eq!(headers["X-App-Name"], "MMIconnect");

        api.use_token(Token {
            access_token: "abc".to_string(),
            token_type: None,
            refresh_token: None,
            id_token: None,
            scope: Some("vehicle fal".to_string()),
            expires_at: i64::MAX,
            client_id: None,
        });
        let headers = api.headers_for("fal").unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer abc");
        // Scope without token and no default token
        let headers = api.headers_for("myaudi").unwrap();
        assert_eq!(headers[AUTHORIZATION], "AudiAuth 1");
    }

    #[test]
    fn test_headers_without_market() {
        let api = Api::new(ClientConfig::default()).unwrap();
        let headers = api.headers_for("vehicle").unwrap();
        assert!(headers.get("X-Market").is_none());
        assert_eq!(headers["X-Country-Id"], "DE");
    }
}
