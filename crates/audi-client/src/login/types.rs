//! Identity provider payloads

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::token::Token;

/// OpenID Connect discovery document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenIdConfig {
    pub authorization_endpoint: String,
    #[serde(default)]
    pub token_endpoint: String,
    #[serde(default)]
    pub revocation_endpoint: Option<String>,
    #[serde(default)]
    pub end_session_endpoint: Option<String>,
    #[serde(default)]
    pub jwks_uri: Option<String>,
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
    #[serde(default)]
    pub response_types_supported: Vec<String>,
    #[serde(default)]
    pub subject_types_supported: Vec<String>,
    #[serde(default)]
    pub id_token_signing_alg_values_supported: Vec<String>,
    #[serde(default)]
    pub code_challenge_methods_supported: Vec<String>,
    #[serde(default)]
    pub scopes_supported: Vec<String>,
    #[serde(default)]
    pub claims_supported: Vec<String>,
    #[serde(default)]
    pub grant_types_supported: Vec<String>,
    #[serde(default)]
    pub ui_locales_supported: Vec<String>,
    #[serde(default)]
    pub token_endpoint_auth_methods_supported: Vec<String>,
}

/// Current user as reported by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// MBB client registration request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClientRegistration<'a> {
    #[serde(rename = "client_name")]
    pub client_name: &'a str,
    pub platform: &'a str,
    #[serde(rename = "client_brand")]
    pub client_brand: &'a str,
    pub app_name: &'a str,
    pub app_version: &'a str,
    pub app_id: &'a str,
}

/// MBB client registration response
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ClientRegistrationResponse {
    pub client_id: String,
}

/// Per-country market description
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountrySpecification {
    #[serde(default)]
    pub default_language: Option<String>,
    #[serde(default)]
    pub languages: BTreeMap<String, serde_json::Value>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MarketsCountries {
    pub country_specifications: BTreeMap<String, CountrySpecification>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct MarketsResponse {
    pub countries: MarketsCountries,
}

/// Tokens obtained by a completed login
#[derive(Debug, Clone)]
pub struct LoginTokens {
    /// Audi ID token (identity and myAudi services)
    pub identity: Token,
    /// MBB token (vehicle services)
    pub vehicle: Token,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_field_names() {
        let body = serde_json::to_value(ClientRegistration {
            client_name: "SM-A405FN",
            platform: "google",
            client_brand: "Audi",
            app_name: "myAudi",
            app_version: "4.13.0",
            app_id: "de.myaudi.mobile.assistant",
        })
        .unwrap();

        assert_eq!(body["client_name"], "SM-A405FN");
        assert_eq!(body["client_brand"], "Audi");
        assert_eq!(body["appName"], "myAudi");
        assert_eq!(body["appId"], "de.myaudi.mobile.assistant");
    }

    #[test]
    fn test_markets_parsing() {
        let json = r#"{
            "countries": {
                "countrySpecifications": {
                    "DE": {"defaultLanguage": "de", "languages": {"de": {}, "en": {}}, "region": "EU"}
                }
            }
        }"#;

        let markets: MarketsResponse = serde_json::from_str(json).unwrap();
        let de = &markets.countries.country_specifications["DE"];
        assert_eq!(de.default_language.as_deref(), Some("de"));
        assert_eq!(de.languages.len(), 2);
        assert_eq!(de.extra["region"], "EU");
    }
}
