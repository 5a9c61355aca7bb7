//! Audi Connect Client Library
//!
//! Provides a typed HTTP client for the Audi Connect (myAudi / MBB) vehicle
//! services: browser-emulated Audi ID login, scoped token routing with a
//! persisted cache, and one wrapper per remote endpoint.
//!
//! # Example
//!
//! ```rust,no_run
//! use audi_client::{AudiClient, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClientConfig::builder()
//!         .market("DE", "de")
//!         .token_file("tokens.json")
//!         .build();
//!     let client = AudiClient::new(config)?;
//!
//!     if !client.restore_token()? {
//!         client.login("user@example.com", "secret", true).await?;
//!     }
//!
//!     for vehicle in client.get_vehicles().await? {
//!         let report = client.get_stored_vehicle_data(&vehicle.vin).await?;
//!         if let Some(mileage) = report.field("0x0101010002") {
//!             println!("{}: {:?} km", vehicle.vin, mileage.value);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Testing
//!
//! The `testing` module runs an axum router on a local port and points a
//! client at it:
//!
//! ```rust,ignore
//! use audi_client::testing::TestServer;
//!
//! let server = TestServer::start(mock_router()).await?;
//! let vehicles = server.client.get_vehicles().await?;
//! ```

mod client;
pub mod config;
mod error;
pub mod login;
pub mod security;
pub mod testing;
pub mod token;
mod transport;
mod types;

pub use client::AudiClient;
pub use config::{ClientConfig, ClientConfigBuilder, EndpointsConfig, MarketConfig, TimeoutsConfig};
pub use error::{AudiClientError, Result};
pub use login::{CountrySpecification, LoginTokens, UserInfo};
pub use token::{Token, TokenProvider};
pub use transport::Api;
pub use types::*;
