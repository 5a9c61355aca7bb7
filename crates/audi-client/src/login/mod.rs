//! Audi ID login
//!
//! The vendor exposes no password grant for third parties, so the login
//! emulates the myAudi app's embedded browser:
//!
//! 1. Fetch the identity provider's OpenID configuration
//! 2. Open the authorization endpoint (PKCE, `state`, `nonce`)
//! 3. Scrape and submit the e-mail form
//! 4. Scrape and submit the password form
//! 5. Follow redirects until the `myaudi:///` callback carries a code
//! 6. Exchange the code for the Audi ID token
//! 7. Register an MBB client
//! 8. Exchange the ID token for the MBB (vehicle) token
//!
//! # Example
//!
//! ```rust,no_run
//! use audi_client::{AudiClient, ClientConfig};
//!
//! # async fn example() -> audi_client::Result<()> {
//! let client = AudiClient::new(ClientConfig::builder().market("DE", "de").build())?;
//! if !client.restore_token()? {
//!     client.login("user@example.com", "secret", true).await?;
//! }
//! # Ok(())
//! # }
//! ```

mod flow;
mod form;
mod pkce;
mod types;

pub use flow::{
    LoginFlow, IDENTITY_CLIENT_ID, IDENTITY_SCOPES, MBB_REQUESTED_SCOPE, REDIRECT_URI,
    VEHICLE_SCOPES,
};
pub use form::LoginForm;
pub use pkce::Pkce;
pub use types::{CountrySpecification, LoginTokens, OpenIdConfig, UserInfo};

pub(crate) use types::MarketsResponse;
