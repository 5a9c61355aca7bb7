//! Audi Connect HTTP client implementation

use std::collections::BTreeMap;
use std::future::Future;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use url::form_urlencoded;

use crate::config::ClientConfig;
use crate::error::{AudiClientError, Result};
use crate::login::{CountrySpecification, LoginFlow, LoginTokens, MarketsResponse, UserInfo};
use crate::security::{PinAuthCompleteRequest, PinAuthCompleteResponse, PinAuthInfoResponse};
use crate::token::{scope, TokenProvider};
use crate::transport::{header_map, Api};
use crate::types::*;

/// URL-encode an ID for use in a single path segment.
fn encode_path_segment(id: &str) -> String {
    // Form encoding writes spaces as '+' and a literal '+' as %2B
    form_urlencoded::byte_serialize(id.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

// Service paths below the `fs-car` base
const VSR_PATH: &str = "bs/vsr/v1";
const RLU_PATH: &str = "bs/rlu/v1";
const CLIMATE_PATH: &str = "bs/climatisation/v1";
const HONK_FLASH_PATH: &str = "bs/rhf/v1";
const TRIP_PATH: &str = "bs/tripstatistics/v1";
const BATTERY_PATH: &str = "bs/batterycharge/v1";
const CAR_FINDER_PATH: &str = "bs/cf/v1";
const SPEED_ALERT_PATH: &str = "bs/speedalert/v1";
const VALET_ALERT_PATH: &str = "bs/valetalert/v1";
const PUSH_PATH: &str = "fns/subscription/v1";
const USER_MANAGEMENT_PATH: &str = "usermanagement/users/v1";
const VEHICLE_DATA_PATH: &str = "vehicleMgmt/vehicledata/v2";
const POI_PATH: &str = "audi/b2c/poinav/v1";

// Service paths below the myAudi base
const VEHICLE_MANAGEMENT_PATH: &str = "myaudi/vehicle-management/v1";
const CAR_SERVICE_PATH: &str = "myaudi/carservice/v3";

// Service paths below the MAL base
const OPERATION_LIST_PATH: &str = "rolesrights/operationlist/v3";
const AUTHORIZATION_PATH: &str = "rolesrights/authorization/v2";

/// S-PIN service name of remote lock/unlock
const RLU_SERVICE: &str = "rlu_v1";
const RLU_CONTENT_TYPE: &str = "application/vnd.vwg.mbb.RemoteLockUnlock_v1_0_0+xml";

/// Audi Connect REST API client
///
/// Provides one method per remote endpoint. Tokens are routed by the
/// scope each service requires.
#[derive(Debug, Clone)]
pub struct AudiClient {
    api: Api,
}

impl AudiClient {
    /// Create a new client
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            api: Api::new(config)?,
        })
    }

    /// Create a client with default configuration for a market
    pub fn for_market(country: &str, language: &str) -> Result<Self> {
        Self::new(ClientConfig::builder().market(country, language).build())
    }

    /// Get the configuration
    pub fn config(&self) -> &ClientConfig {
        self.api.config()
    }

    /// Low-level transport, for endpoints without a wrapper
    pub fn api(&self) -> &Api {
        &self.api
    }

    fn mbb_url(&self, service_path: &str, vin: &str, part: &str) -> String {
        self.config().mbb_url(
            service_path,
            &format!("/vehicles/{}{}", encode_path_segment(vin), part),
        )
    }

    // =========================================================================
    // Logon
    // =========================================================================

    /// Log in with Audi ID credentials and install the resulting tokens
    ///
    /// When `persist` is set, the tokens are written to the configured
    /// token file.
    #[instrument(skip(self, password))]
    pub async fn login(&self, user: &str, password: &str, persist: bool) -> Result<LoginTokens> {
        let tokens = LoginFlow::new(&self.api)?.run(user, password).await?;

        self.api.use_token(tokens.identity.clone());
        self.api.use_token(tokens.vehicle.clone());
        info!("Login successful");

        if persist {
            self.persist_tokens()?;
        }
        Ok(tokens)
    }

    /// Restore the persisted tokens
    ///
    /// Returns `false` if there is no cache, it cannot be read, or any
    /// token in it has expired.
    pub fn restore_token(&self) -> Result<bool> {
        let path = &self.config().token_file;
        let provider = match TokenProvider::load(path) {
            Ok(Some(provider)) => provider,
            Ok(None) => return Ok(false),
            Err(e) => {
                warn!("Ignoring unreadable token cache {}: {}", path.display(), e);
                return Ok(false);
            }
        };

        if !provider.is_valid() {
            debug!("Token cache expired");
            return Ok(false);
        }

        self.api.set_token_provider(provider);
        Ok(true)
    }

    /// Write the installed tokens to the configured token file
    pub fn persist_tokens(&self) -> Result<()> {
        let provider = self.api.token_provider();
        let provider = provider.read();
        provider.persist(&self.config().token_file)
    }

    /// Refresh the installed tokens using their refresh tokens
    #[instrument(skip(self))]
    pub async fn refresh_tokens(&self, persist: bool) -> Result<()> {
        let flow = LoginFlow::new(&self.api)?;
        let mut refreshed = 0;

        if let Some(token) = self.api.token_for(scope::VEHICLE) {
            if token.refresh_token.is_some() {
                self.api.use_token(flow.refresh_vehicle_token(&token).await?);
                refreshed += 1;
            }
        }

        if let Some(token) = self.api.token_for(scope::MYAUDI) {
            if token.refresh_token.is_some() {
                self.api.use_token(flow.refresh_identity_token(&token).await?);
                refreshed += 1;
            }
        }

        if refreshed == 0 {
            return Err(AudiClientError::MissingToken(scope::VEHICLE.to_string()));
        }
        info!("Refreshed {} token(s)", refreshed);

        if persist {
            self.persist_tokens()?;
        }
        Ok(())
    }

    /// Information about the current user
    #[instrument(skip(self))]
    pub async fn get_user_info(&self) -> Result<UserInfo> {
        let url = self.config().identity_url("/v1/userinfo");
        self.api.get(&url, scope::OPENID).await
    }

    /// All available countries and their languages
    #[instrument(skip(self))]
    pub async fn get_markets(&self) -> Result<BTreeMap<String, CountrySpecification>> {
        let url = self.config().endpoints.markets.clone();
        let markets: MarketsResponse = self.api.get(&url, scope::NONE).await?;
        Ok(markets.countries.country_specifications)
    }

    // =========================================================================
    // Vehicle Management
    // =========================================================================

    /// List all vehicles of the current account
    #[instrument(skip(self))]
    pub async fn get_vehicles(&self) -> Result<Vec<Vehicle>> {
        let url = self.config().msg_url(VEHICLE_MANAGEMENT_PATH, "/vehicles");
        debug!("Listing vehicles from {}", url);

        self.api
            .get::<VehiclesResponse>(&url, scope::MYAUDI)
            .await
            .map(|r| r.vehicles)
    }

    /// Car service details of a vehicle
    #[instrument(skip(self))]
    pub async fn get_vehicle(&self, vin: &str) -> Result<Value> {
        let url = self.config().msg_url(
            CAR_SERVICE_PATH,
            &format!("/vehicles/{}", encode_path_segment(vin)),
        );
        self.api.get(&url, scope::MYAUDI).await
    }

    /// Connectivity information (e.g. embedded SIM) of a vehicle
    #[instrument(skip(self))]
    pub async fn get_vehicle_information(&self, vin: &str) -> Result<Value> {
        let url = self.mbb_url(VEHICLE_DATA_PATH, vin, "");
        self.api.get(&url, scope::VEHICLE).await
    }

    // =========================================================================
    // Vehicle Status Report
    // =========================================================================

    /// Ask the vehicle to send fresh status data
    #[instrument(skip(self))]
    pub async fn request_current_vehicle_data(
        &self,
        vin: &str,
    ) -> Result<CurrentVehicleDataResponse> {
        let url = self.mbb_url(VSR_PATH, vin, "/requests");
        self.api.post_empty(&url, scope::VEHICLE).await
    }

    /// Status of a data request
    #[instrument(skip(self))]
    pub async fn get_request_status(&self, vin: &str, request_id: &str) -> Result<RequestStatus> {
        let url = self.mbb_url(
            VSR_PATH,
            vin,
            &format!("/requests/{}/jobstatus", encode_path_segment(request_id)),
        );
        self.api
            .get::<RequestStatusResponse>(&url, scope::VEHICLE)
            .await
            .map(|r| r.request_status_response)
    }

    /// Vehicle report produced by a data request
    #[instrument(skip(self))]
    pub async fn get_requested_current_vehicle_data(
        &self,
        vin: &str,
        request_id: &str,
    ) -> Result<VehicleDataResponse> {
        let url = self.mbb_url(
            VSR_PATH,
            vin,
            &format!("/requests/{}/status", encode_path_segment(request_id)),
        );
        self.api.get(&url, scope::VEHICLE).await
    }

    /// Last vehicle report received by the backend
    #[instrument(skip(self))]
    pub async fn get_stored_vehicle_data(&self, vin: &str) -> Result<VehicleDataResponse> {
        let url = self.mbb_url(VSR_PATH, vin, "/status");
        self.api.get(&url, scope::VEHICLE).await
    }

    /// Poll a data request until it leaves the in-progress state
    pub async fn poll_request_complete(&self, vin: &str, request_id: &str) -> Result<RequestStatus> {
        self.poll_until_done("vehicle data request", || {
            self.get_request_status(vin, request_id)
        })
        .await
    }

    /// Request fresh data, wait for the vehicle and return the report
    #[instrument(skip(self))]
    pub async fn refresh_vehicle_data(&self, vin: &str) -> Result<VehicleDataResponse> {
        let request = self.request_current_vehicle_data(vin).await?;
        let request_id = request.request_id().to_string();
        info!("Vehicle data requested ({})", request_id);

        let status = self.poll_request_complete(vin, &request_id).await?;
        if status.status == RequestState::Failed {
            return Err(AudiClientError::RequestFailed(format!(
                "vehicle data request {}",
                request_id
            )));
        }

        self.get_requested_current_vehicle_data(vin, &request_id)
            .await
    }

    // =========================================================================
    // Remote Lock/Unlock
    // =========================================================================

    /// Available lock/unlock actions
    #[instrument(skip(self))]
    pub async fn get_lock_actions(&self, vin: &str) -> Result<Value> {
        let url = self.mbb_url(RLU_PATH, vin, "/actions");
        self.api.get(&url, scope::VEHICLE).await
    }

    /// Lock the vehicle (requires the S-PIN)
    #[instrument(skip(self, pin))]
    pub async fn lock(&self, vin: &str, pin: &str) -> Result<RluActionResponse> {
        self.set_lock(vin, LockAction::Lock, pin).await
    }

    /// Unlock the vehicle (requires the S-PIN)
    #[instrument(skip(self, pin))]
    pub async fn unlock(&self, vin: &str, pin: &str) -> Result<RluActionResponse> {
        self.set_lock(vin, LockAction::Unlock, pin).await
    }

    async fn set_lock(&self, vin: &str, action: LockAction, pin: &str) -> Result<RluActionResponse> {
        let security_token = self
            .request_security_token(vin, RLU_SERVICE, action.as_str(), pin)
            .await?;

        let url = self.mbb_url(RLU_PATH, vin, "/actions");
        let headers = header_map(&[("X-mbbSecToken", security_token.as_str())])?;
        self.api
            .post_body(&url, scope::VEHICLE, action.to_xml(), RLU_CONTENT_TYPE, headers)
            .await
    }

    /// Status of a lock/unlock request
    #[instrument(skip(self))]
    pub async fn get_lock_request_status(
        &self,
        vin: &str,
        request_id: &str,
    ) -> Result<RequestStatus> {
        let url = self.mbb_url(
            RLU_PATH,
            vin,
            &format!("/requests/{}/status", encode_path_segment(request_id)),
        );
        self.api
            .get::<RequestStatusResponse>(&url, scope::VEHICLE)
            .await
            .map(|r| r.request_status_response)
    }

    /// Poll a lock/unlock request until it leaves the in-progress state
    pub async fn poll_lock_complete(&self, vin: &str, request_id: &str) -> Result<RequestStatus> {
        self.poll_until_done("lock/unlock request", || {
            self.get_lock_request_status(vin, request_id)
        })
        .await
    }

    /// Obtain a security token for a privileged operation by answering
    /// the S-PIN challenge
    #[instrument(skip(self, pin))]
    pub async fn request_security_token(
        &self,
        vin: &str,
        service: &str,
        operation: &str,
        pin: &str,
    ) -> Result<String> {
        let url = self.config().mal_url(
            AUTHORIZATION_PATH,
            &format!(
                "/vehicles/{}/services/{}/operations/{}/security-pin-auth-requested",
                encode_path_segment(vin),
                service,
                operation
            ),
        );
        let info: PinAuthInfoResponse = self.api.get(&url, scope::VEHICLE).await?;

        let request = PinAuthCompleteRequest::answer(&info.security_pin_auth_info, pin)?;
        let url = self
            .config()
            .mal_url(AUTHORIZATION_PATH, "/security-pin-auth-completed");
        let response: PinAuthCompleteResponse =
            self.api.post_json(&url, scope::VEHICLE, &request).await?;

        Ok(response.security_token)
    }

    // =========================================================================
    // Pre-trip Climatisation
    // =========================================================================

    /// Climatisation status
    #[instrument(skip(self))]
    pub async fn get_climate_status(&self, vin: &str) -> Result<Value> {
        let url = self.mbb_url(CLIMATE_PATH, vin, "/climater");
        self.api.get(&url, scope::VEHICLE).await
    }

    /// Start climatisation
    #[instrument(skip(self))]
    pub async fn start_climate(&self, vin: &str, source: HeaterSource) -> Result<Value> {
        self.perform_climate_action(vin, &ClimaRequest::start(source))
            .await
    }

    /// Stop climatisation
    #[instrument(skip(self))]
    pub async fn stop_climate(&self, vin: &str) -> Result<Value> {
        self.perform_climate_action(vin, &ClimaRequest::stop()).await
    }

    /// Send a climatisation action
    #[instrument(skip(self, request))]
    pub async fn perform_climate_action(&self, vin: &str, request: &ClimaRequest) -> Result<Value> {
        let url = self.mbb_url(CLIMATE_PATH, vin, "/climater/actions");
        self.api.post_json(&url, scope::VEHICLE, request).await
    }

    /// Status of a climatisation action
    #[instrument(skip(self))]
    pub async fn get_climate_action_status(&self, vin: &str, action_id: &str) -> Result<Value> {
        let url = self.mbb_url(
            CLIMATE_PATH,
            vin,
            &format!("/climater/actions/{}", encode_path_segment(action_id)),
        );
        self.api.get(&url, scope::VEHICLE).await
    }

    // =========================================================================
    // Honk & Flash
    // =========================================================================

    /// Flash the lights for `seconds`
    pub async fn flash(&self, vin: &str, seconds: u32) -> Result<HonkFlashAction> {
        self.honk_flash(vin, HonkFlashMode::FlashOnly, seconds).await
    }

    /// Honk and flash for `seconds`
    pub async fn honk_and_flash(&self, vin: &str, seconds: u32) -> Result<HonkFlashAction> {
        self.honk_flash(vin, HonkFlashMode::HonkAndFlash, seconds)
            .await
    }

    /// Send a honk/flash request
    #[instrument(skip(self))]
    pub async fn honk_flash(
        &self,
        vin: &str,
        mode: HonkFlashMode,
        seconds: u32,
    ) -> Result<HonkFlashAction> {
        let url = self.mbb_url(HONK_FLASH_PATH, vin, "/honkAndFlash");
        let request = HonkFlashRequest::new(mode, seconds);
        self.api
            .post_json::<_, HonkFlashRequest>(&url, scope::VEHICLE, &request)
            .await
            .map(|r| r.honk_and_flash_request)
    }

    /// Status of a honk/flash action
    #[instrument(skip(self))]
    pub async fn get_honk_flash_status(&self, vin: &str, action_id: &str) -> Result<HonkFlashStatus> {
        let url = self.mbb_url(
            HONK_FLASH_PATH,
            vin,
            &format!("/honkAndFlash/{}/status", encode_path_segment(action_id)),
        );
        self.api
            .get::<HonkFlashStatusResponse>(&url, scope::VEHICLE)
            .await
            .map(|r| r.status)
    }

    // =========================================================================
    // Trip Statistics
    // =========================================================================

    /// Latest trip statistic (range, consumption, ...)
    #[instrument(skip(self))]
    pub async fn get_latest_trip(&self, vin: &str, trip_type: TripType) -> Result<Value> {
        let url = self.mbb_url(
            TRIP_PATH,
            vin,
            &format!("/tripdata/{}?newest", trip_type.as_str()),
        );
        self.api.get(&url, scope::VEHICLE).await
    }

    // =========================================================================
    // Battery Charge (EV only)
    // =========================================================================

    /// Battery charge status
    #[instrument(skip(self))]
    pub async fn get_charger_status(&self, vin: &str) -> Result<BatteryChargeResponse> {
        let url = self.mbb_url(BATTERY_PATH, vin, "/charger");
        self.api.get(&url, scope::VEHICLE).await
    }

    // =========================================================================
    // Car Finder
    // =========================================================================

    /// Parking position of the vehicle
    #[instrument(skip(self))]
    pub async fn find_vehicle(&self, vin: &str) -> Result<Value> {
        let url = self.mbb_url(CAR_FINDER_PATH, vin, "/position");
        self.api.get(&url, scope::VEHICLE).await
    }

    // =========================================================================
    // Operation List
    // =========================================================================

    /// Services available for a vehicle and their license status
    #[instrument(skip(self))]
    pub async fn get_operations(&self, vin: &str) -> Result<Value> {
        let url = self.config().mal_url(
            OPERATION_LIST_PATH,
            &format!("/vehicles/{}/operations", encode_path_segment(vin)),
        );
        self.api.get(&url, scope::FAL).await
    }

    /// All API operations known to the roles and rights service
    #[instrument(skip(self))]
    pub async fn get_api_list(&self) -> Result<Value> {
        let url = self.config().mal_url(OPERATION_LIST_PATH, "");
        self.api.get(&url, scope::FAL).await
    }

    // =========================================================================
    // Push Notifications
    // =========================================================================

    /// Register a push notification subscription
    #[instrument(skip(self, token))]
    pub async fn register_push(&self, platform: &str, app_id: &str, token: &str) -> Result<Value> {
        let url = self.config().mbb_url(
            PUSH_PATH,
            &format!(
                "/subscriptions/{}/{}/{}",
                encode_path_segment(platform),
                encode_path_segment(app_id),
                encode_path_segment(token)
            ),
        );
        self.api
            .post_json(&url, scope::VEHICLE, &serde_json::json!({}))
            .await
    }

    // =========================================================================
    // Alerts
    // =========================================================================

    /// Speed alerts (USA only)
    #[instrument(skip(self))]
    pub async fn get_speed_alerts(&self, vin: &str) -> Result<Value> {
        let url = self.mbb_url(SPEED_ALERT_PATH, vin, "/speedAlerts");
        self.api.get(&url, scope::VEHICLE).await
    }

    /// Valet alerts (USA only)
    #[instrument(skip(self))]
    pub async fn get_valet_alerts(&self, vin: &str) -> Result<Value> {
        let url = self.mbb_url(VALET_ALERT_PATH, vin, "/valetAlerts");
        self.api.get(&url, scope::VEHICLE).await
    }

    /// Valet alert definition
    #[instrument(skip(self))]
    pub async fn get_valet_definition(&self, vin: &str) -> Result<Value> {
        let url = self.mbb_url(VALET_ALERT_PATH, vin, "/valetAlertDefinition");
        self.api.get(&url, scope::VEHICLE).await
    }

    /// Status of a valet alert definition request
    #[instrument(skip(self))]
    pub async fn get_valet_request_status(&self, vin: &str, request_id: &str) -> Result<Value> {
        let url = self.mbb_url(
            VALET_ALERT_PATH,
            vin,
            &format!(
                "/valetAlertDefinition/{}/status",
                encode_path_segment(request_id)
            ),
        );
        self.api.get(&url, scope::VEHICLE).await
    }

    // =========================================================================
    // User Management & Navigation
    // =========================================================================

    /// Pairing status between the account and the vehicle
    #[instrument(skip(self))]
    pub async fn get_pairing_status(&self, vin: &str) -> Result<Value> {
        let url = self.mbb_url(USER_MANAGEMENT_PATH, vin, "/pairing");
        self.api.get(&url, scope::VEHICLE).await
    }

    /// Points of interest sent to the vehicle
    #[instrument(skip(self))]
    pub async fn get_pois(&self, vin: &str) -> Result<Value> {
        let url = self.mbb_url(POI_PATH, vin, "/pois");
        self.api.get(&url, scope::VEHICLE).await
    }

    // =========================================================================
    // Helper Methods
    // =========================================================================

    /// Poll `status` until the request is no longer in progress
    async fn poll_until_done<F, Fut>(&self, operation: &str, status: F) -> Result<RequestStatus>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<RequestStatus>>,
    {
        let poll_interval = Duration::from_millis(self.config().timeouts.poll_ms);
        let timeout = Duration::from_millis(self.config().timeouts.poll_timeout_ms);
        let start = Instant::now();

        loop {
            let current = status().await?;
            if !current.status.is_in_progress() {
                debug!("{} finished: {}", operation, current.status);
                return Ok(current);
            }

            if start.elapsed() > timeout {
                return Err(AudiClientError::Timeout {
                    operation: operation.to_string(),
                });
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = AudiClient::for_market("DE", "de");
        assert!(client.is_ok());
    }

    #[test]
    fn test_mbb_url() {
        let client = AudiClient::new(ClientConfig::default()).unwrap();
        assert_eq!(
            client.mbb_url(VSR_PATH, "WAUZZZ4G7EN012345", "/requests/42/jobstatus"),
            "https://msg.volkswagen.de/fs-car/bs/vsr/v1/Audi/DE/vehicles/WAUZZZ4G7EN012345/requests/42/jobstatus"
        );
    }

    #[test]
    fn test_encode_path_segment() {
        assert_eq!(encode_path_segment("abc/def"), "abc%2Fdef");
        assert_eq!(encode_path_segment("WAUZZZ"), "WAUZZZ");
        assert_eq!(encode_path_segment("a?b#c%d"), "a%3Fb%23c%25d");
        assert_eq!(encode_path_segment("a b+c"), "a%20b%2Bc");
    }
}
