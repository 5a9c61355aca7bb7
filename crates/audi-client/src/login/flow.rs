//! Browser-emulated login sequence
//!
//! A fixed, linear chain of requests against the identity provider and the
//! MBB OAuth service. Any unexpected redirect, missing form or missing code
//! aborts with [`AudiClientError::LoginFailed`].

use reqwest::header::{HeaderMap, LOCATION};
use reqwest::{redirect, Client, Response};
use tracing::{debug, info, instrument};
use url::Url;
use uuid::Uuid;

use super::form::LoginForm;
use super::pkce::Pkce;
use super::types::{ClientRegistration, ClientRegistrationResponse, LoginTokens, OpenIdConfig};
use crate::error::{AudiClientError, Result};
use crate::token::{unix_now, Token, TokenResponse};
use crate::transport::{build_http_client, handle_response, header_map, Api};

/// OAuth client ID of the myAudi app at the identity provider
pub const IDENTITY_CLIENT_ID: &str = "09b6cbec-cd19-4589-82fd-363dfa8c24da@apps_vw-dilab_com";

/// Redirect URI registered for the myAudi app
pub const REDIRECT_URI: &str = "myaudi:///";

/// Scopes requested for the Audi ID token
pub const IDENTITY_SCOPES: &str =
    "openid profile email mbb offline_access mbbuserid myaudi selfservice:read selfservice:write";

/// Scope requested from the MBB token exchange
pub const MBB_REQUESTED_SCOPE: &str = "sc2:fal";

/// Service scopes the MBB token is routed under
pub const VEHICLE_SCOPES: &str = "vehicle fal";

/// Maximum redirects followed between two form pages
const MAX_REDIRECTS: usize = 10;

const APP_HEADERS: &[(&str, &str)] = &[
    ("User-Agent", "okhttp/3.7.0"),
    ("X-App-Version", "4.13.0"),
    ("X-App-Name", "myAudi"),
];

/// Where a redirect chain ended
#[derive(Debug)]
enum Landing {
    /// A regular page
    Page { url: Url, body: String },
    /// A redirect to [`REDIRECT_URI`]
    Callback(Url),
}

impl Landing {
    fn into_page(self, stage: &str) -> Result<(Url, String)> {
        match self {
            Landing::Page { url, body } => Ok((url, body)),
            Landing::Callback(url) => Err(AudiClientError::login(format!(
                "Unexpected redirect to {} after {}",
                url, stage
            ))),
        }
    }

    fn into_callback(self, stage: &str) -> Result<Url> {
        match self {
            Landing::Callback(url) => Ok(url),
            Landing::Page { url, .. } => Err(AudiClientError::login(format!(
                "Expected redirect to {} after {}, landed on {}",
                REDIRECT_URI, stage, url
            ))),
        }
    }
}

/// Drives the login sequence for one set of credentials
pub struct LoginFlow<'a> {
    api: &'a Api,
    http: Client,
    app_headers: HeaderMap,
}

impl<'a> LoginFlow<'a> {
    /// Create a flow sharing configuration with `api`.
    ///
    /// Uses its own cookie-keeping client that does not follow redirects,
    /// so each hop can be inspected.
    pub fn new(api: &'a Api) -> Result<Self> {
        Ok(Self {
            api,
            http: build_http_client(api.config(), redirect::Policy::none())?,
            app_headers: header_map(APP_HEADERS)?,
        })
    }

    /// Run the full sequence and return the identity and vehicle tokens
    #[instrument(skip(self, password))]
    pub async fn run(&self, user: &str, password: &str) -> Result<LoginTokens> {
        let openid = self.fetch_openid_config().await?;
        let pkce = Pkce::generate();
        let state = Uuid::new_v4().to_string();
        let nonce = Uuid::new_v4().to_string();

        info!("Requesting login page");
        let auth_url = self.authorization_url(&openid, &pkce, &state, &nonce)?;
        let response = self.http.get(auth_url).send().await?;
        let (page_url, body) = self.follow_redirects(response).await?.into_page("authorization")?;

        info!("Submitting identifier");
        let mut form = LoginForm::scrape(&body, &page_url, &["email"])?;
        form.set("email", user);
        let response = self.submit(&form).await?;
        let (page_url, body) = self
            .follow_redirects(response)
            .await?
            .into_page("identifier submission")?;

        info!("Submitting password");
        let mut form = LoginForm::scrape(&body, &page_url, &["password", "hmac"])?;
        form.replace("email", user);
        form.set("password", password);
        let response = self.submit(&form).await?;
        let callback = self
            .follow_redirects(response)
            .await?
            .into_callback("password submission")?;

        let code = authorization_code(&callback, &state)?;

        info!("Exchanging authorization code");
        let identity = self.exchange_code(&code, &pkce).await?;
        let id_token = identity
            .id_token
            .clone()
            .ok_or_else(|| AudiClientError::login("Token response carried no id_token"))?;

        info!("Registering MBB client");
        let client_id = self.register_client().await?;

        info!("Exchanging id_token for vehicle token");
        let vehicle = self.exchange_id_token(&id_token, &client_id).await?;

        Ok(LoginTokens { identity, vehicle })
    }

    /// Step 1: OpenID Connect discovery
    async fn fetch_openid_config(&self) -> Result<OpenIdConfig> {
        let url = self
            .api
            .config()
            .identity_url("/.well-known/openid-configuration");
        debug!("Fetching OpenID configuration from {}", url);
        let response = self.http.get(&url).send().await?;
        handle_response(response)
            .await
            .map_err(|e| AudiClientError::login(format!("OpenID discovery failed: {}", e)))
    }

    /// Step 2: authorization request with PKCE
    fn authorization_url(
        &self,
        openid: &OpenIdConfig,
        pkce: &Pkce,
        state: &str,
        nonce: &str,
    ) -> Result<Url> {
        let locale = match &self.api.config().market {
            Some(market) => format!("{}-{}", market.language, market.country),
            None => "de-DE".to_string(),
        };

        let mut url = Url::parse(&openid.authorization_endpoint)?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", IDENTITY_CLIENT_ID)
            .append_pair("redirect_uri", REDIRECT_URI)
            .append_pair("scope", IDENTITY_SCOPES)
            .append_pair("state", state)
            .append_pair("nonce", nonce)
            .append_pair("prompt", "login")
            .append_pair("code_challenge", &pkce.challenge)
            .append_pair("code_challenge_method", Pkce::METHOD)
            .append_pair("ui_locales", &format!("{} {}", locale, locale));
        Ok(url)
    }

    async fn submit(&self, form: &LoginForm) -> Result<Response> {
        debug!("Submitting form to {}", form.action);
        Ok(self
            .http
            .post(form.action.clone())
            .form(&form.fields)
            .send()
            .await?)
    }

    /// Follow `Location` headers until a page or the app callback
    async fn follow_redirects(&self, mut response: Response) -> Result<Landing> {
        let mut hops = 0;
        loop {
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| {
                        AudiClientError::login(format!(
                            "Redirect without Location from {}",
                            response.url()
                        ))
                    })?
                    .to_string();

                if location.starts_with(REDIRECT_URI) {
                    debug!("Reached app callback");
                    return Ok(Landing::Callback(Url::parse(&location)?));
                }

                if hops == MAX_REDIRECTS {
                    return Err(AudiClientError::login(format!(
                        "More than {} redirects",
                        MAX_REDIRECTS
                    )));
                }
                hops += 1;

                let next = response.url().join(&location)?;
                debug!("Following redirect {} to {}", hops, next);
                response = self.http.get(next).send().await?;
                continue;
            }

            if status.is_success() {
                let url = response.url().clone();
                let body = response.text().await?;
                return Ok(Landing::Page { url, body });
            }

            return Err(AudiClientError::login(format!(
                "Unexpected status {} from {}",
                status,
                response.url()
            )));
        }
    }

    /// Step 6: authorization code → Audi ID token
    async fn exchange_code(&self, code: &str, pkce: &Pkce) -> Result<Token> {
        let body = serde_json::json!({
            "client_id": IDENTITY_CLIENT_ID,
            "grant_type": "authorization_code",
            "code": code,
            "redirect_uri": REDIRECT_URI,
            "response_type": "token id_token",
            "code_verifier": pkce.verifier,
        });

        let response = self
            .http
            .post(&self.api.config().endpoints.azs_token)
            .headers(self.app_headers.clone())
            .json(&body)
            .send()
            .await?;
        let token: TokenResponse = handle_response(response).await?;

        let mut token = Token::from_response(token, unix_now());
        if token.scope.is_none() {
            token.scope = Some(IDENTITY_SCOPES.to_string());
        }
        Ok(token)
    }

    /// Step 7: register an MBB client and obtain its client ID
    async fn register_client(&self) -> Result<String> {
        let registration = ClientRegistration {
            client_name: "SM-A405FN",
            platform: "google",
            client_brand: "Audi",
            app_name: "myAudi",
            app_version: "4.13.0",
            app_id: "de.myaudi.mobile.assistant",
        };

        let url = self.api.config().mbb_oauth_url("/mobile/register/v1");
        let response = self
            .http
            .post(&url)
            .headers(self.app_headers.clone())
            .json(&registration)
            .send()
            .await?;
        let registered: ClientRegistrationResponse = handle_response(response).await?;
        Ok(registered.client_id)
    }

    /// Step 8: Audi ID token → MBB token
    async fn exchange_id_token(&self, id_token: &str, client_id: &str) -> Result<Token> {
        let url = self.api.config().mbb_oauth_url("/mobile/oauth2/v1/token");
        let response = self
            .http
            .post(&url)
            .headers(self.app_headers.clone())
            .header("X-Client-ID", client_id)
            .form(&[
                ("grant_type", "id_token"),
                ("token", id_token),
                ("scope", MBB_REQUESTED_SCOPE),
            ])
            .send()
            .await?;
        let token: TokenResponse = handle_response(response).await?;

        Ok(Token::from_response(token, unix_now())
            .with_scope(VEHICLE_SCOPES)
            .with_client_id(client_id))
    }

    /// Refresh the MBB token
    pub async fn refresh_vehicle_token(&self, token: &Token) -> Result<Token> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or_else(|| AudiClientError::MissingToken("refresh_token".to_string()))?;
        let client_id = token.client_id.clone().unwrap_or_default();

        let url = self.api.config().mbb_oauth_url("/mobile/oauth2/v1/token");
        let response = self
            .http
            .post(&url)
            .headers(self.app_headers.clone())
            .header("X-Client-ID", &client_id)
            .form(&[
                ("grant_type", "refresh_token"),
                ("token", refresh_token),
                ("scope", MBB_REQUESTED_SCOPE),
            ])
            .send()
            .await?;
        let response: TokenResponse = handle_response(response).await?;

        Ok(refreshed(token, response))
    }

    /// Refresh the Audi ID token
    pub async fn refresh_identity_token(&self, token: &Token) -> Result<Token> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or_else(|| AudiClientError::MissingToken("refresh_token".to_string()))?;

        let body = serde_json::json!({
            "client_id": IDENTITY_CLIENT_ID,
            "grant_type": "refresh_token",
            "refresh_token": refresh_token,
            "response_type": "token id_token",
        });

        let response = self
            .http
            .post(&self.api.config().endpoints.azs_token)
            .headers(self.app_headers.clone())
            .json(&body)
            .send()
            .await?;
        let response: TokenResponse = handle_response(response).await?;

        Ok(refreshed(token, response))
    }
}

/// Merge a refresh response into the token it replaces.
///
/// Scope and client ID always come from the previous token; a missing
/// refresh or id token in the response keeps the previous one.
fn refreshed(previous: &Token, response: TokenResponse) -> Token {
    let mut token = Token::from_response(response, unix_now());
    token.scope = previous.scope.clone();
    token.client_id = previous.client_id.clone();
    if token.refresh_token.is_none() {
        token.refresh_token = previous.refresh_token.clone();
    }
    if token.id_token.is_none() {
        token.id_token = previous.id_token.clone();
    }
    token
}

/// Extract `code` from the app callback and check `state`
fn authorization_code(callback: &Url, expected_state: &str) -> Result<String> {
    let mut code = None;
    let mut state = None;
    for (key, value) in callback.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(state) = state {
        if state != expected_state {
            return Err(AudiClientError::login("State mismatch in callback"));
        }
    }

    code.filter(|c| !c.is_empty())
        .ok_or_else(|| AudiClientError::login("Callback carried no authorization code"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_code() {
        let url = Url::parse("myaudi:///?code=abc123&state=s1").unwrap();
        assert_eq!(authorization_code(&url, "s1").unwrap(), "abc123");
    }

    #[test]
    fn test_authorization_code_state_mismatch() {
        let url = Url::parse("myaudi:///?code=abc123&state=other").unwrap();
        assert!(matches!(
            authorization_code(&url, "s1"),
            Err(AudiClientError::LoginFailed(_))
        ));
    }

    #[test]
    fn test_authorization_code_missing() {
        let url = Url::parse("myaudi:///?error=access_denied").unwrap();
        assert!(authorization_code(&url, "s1").is_err());
    }

    #[test]
    fn test_refreshed_keeps_routing_fields() {
        let previous = Token {
            access_token: "old".to_string(),
            token_type: None,
            refresh_token: Some("r1".to_string()),
            id_token: Some("id1".to_string()),
            scope: Some(VEHICLE_SCOPES.to_string()),
            expires_at: 0,
            client_id: Some("c1".to_string()),
        };
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"new","expires_in":3600}"#).unwrap();

        let token = refreshed(&previous, response);
        assert_eq!(token.access_token, "new");
        assert_eq!(token.scope.as_deref(), Some(VEHICLE_SCOPES));
        assert_eq!(token.client_id.as_deref(), Some("c1"));
        assert_eq!(token.refresh_token.as_deref(), Some("r1"));
        assert!(token.is_valid());
    }

    #[test]
    fn test_authorization_url() {
        let api = Api::new(crate::ClientConfig::builder().market("DE", "de").build()).unwrap();
        let flow = LoginFlow::new(&api).unwrap();
        let openid = OpenIdConfig {
            authorization_endpoint: "https://identity.vwgroup.io/oidc/v1/authorize".to_string(),
            ..Default::default()
        };
        let pkce = Pkce::from_verifier("verifier".to_string());

        let url = flow.authorization_url(&openid, &pkce, "st", "no").unwrap();
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["redirect_uri"], REDIRECT_URI);
        assert_eq!(pairs["scope"], IDENTITY_SCOPES);
        assert_eq!(pairs["state"], "st");
        assert_eq!(pairs["code_challenge"], pkce.challenge);
        assert_eq!(pairs["code_challenge_method"], "S256");
        assert_eq!(pairs["ui_locales"], "de-DE de-DE");
    }
}
